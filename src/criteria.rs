//! Translation of tool filters into IMAP search criteria
//!
//! [`translate`] is total: it only decides which constraints exist. Date
//! strings are validated when the criteria are rendered into a `UID SEARCH`
//! query, inside the session, so a bad date is reported like any other
//! session-level failure.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::errors::{AppError, AppResult};
use crate::models::FilterOptions;

/// Store-native predicate set
///
/// `None`/`false` fields impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    pub unseen: bool,
    pub since: Option<String>,
    pub before: Option<String>,
    pub from: Option<String>,
    pub subject: Option<String>,
}

/// Map filter options onto search criteria
///
/// Empty or blank strings count as absent.
pub fn translate(options: &FilterOptions) -> SearchCriteria {
    SearchCriteria {
        unseen: options.unread_only,
        since: present(options.date_from.as_deref()),
        before: present(options.date_to.as_deref()),
        from: present(options.from_address.as_deref()),
        subject: present(options.subject.as_deref()),
    }
}

fn present(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).map(str::to_owned)
}

impl SearchCriteria {
    /// Whether the criteria match every message in the mailbox
    pub fn is_unconstrained(&self) -> bool {
        *self == Self::default()
    }

    /// Render as an IMAP `SEARCH` query string
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if a date does not parse or a text value contains
    ///   control characters
    pub fn to_imap_query(&self) -> AppResult<String> {
        let mut parts = Vec::new();
        if self.unseen {
            parts.push("UNSEEN".to_owned());
        }
        if let Some(v) = &self.since {
            parts.push(format!("SINCE {}", imap_date(parse_date(v, "dateFrom")?)));
        }
        if let Some(v) = &self.before {
            parts.push(format!("BEFORE {}", imap_date(parse_date(v, "dateTo")?)));
        }
        if let Some(v) = &self.from {
            parts.push(format!("FROM \"{}\"", escape_imap_quoted(v, "from")?));
        }
        if let Some(v) = &self.subject {
            parts.push(format!("SUBJECT \"{}\"", escape_imap_quoted(v, "subject")?));
        }

        if parts.is_empty() {
            Ok("ALL".to_owned())
        } else {
            Ok(parts.join(" "))
        }
    }
}

/// Parse a filter date into its calendar day
///
/// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS[.fff]`, or `YYYY-MM-DD`.
fn parse_date(input: &str, field: &str) -> AppResult<NaiveDate> {
    let trimmed = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt.date());
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| {
        AppError::invalid(format!(
            "invalid {field} '{input}', expected an ISO-8601 date"
        ))
    })
}

/// Format date as IMAP SEARCH date (e.g., "1-Jan-2025")
fn imap_date(date: NaiveDate) -> String {
    date.format("%-d-%b-%Y").to_string()
}

/// Escape backslashes and quotes for IMAP quoted strings
fn escape_imap_quoted(input: &str, field: &str) -> AppResult<String> {
    if input.chars().any(|ch| ch.is_ascii_control()) {
        return Err(AppError::invalid(format!(
            "{field} must not contain control characters"
        )));
    }
    Ok(input.replace('\\', "\\\\").replace('"', "\\\""))
}
