//! Input/output DTOs and schema-bearing types
//!
//! `FilterOptions` is the tool input and carries the `JsonSchema` used for the
//! MCP tool declaration. `RawFetchedMessage` is the owned, transient form of
//! one `UID FETCH` response; `EmailMessage` is the stable output record.

use schemars::JsonSchema;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Text returned when the search matches nothing
pub const NO_MESSAGES_FOUND: &str = "No messages found matching the criteria";

/// Input: filters for `get-messages`
///
/// All fields are optional on the wire. Absent optional filters impose no
/// constraint on the search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    /// Maximum number of messages to fetch
    #[serde(default = "default_limit", deserialize_with = "deserialize_limit")]
    #[schemars(with = "f64")]
    pub limit: i64,
    /// Include full email body (default: preview only)
    #[serde(default)]
    pub include_full_content: bool,
    /// Filter messages from this date (ISO string)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    /// Filter messages until this date (ISO string)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
    /// Only fetch unread messages
    #[serde(default)]
    pub unread_only: bool,
    /// Filter by sender email address
    #[serde(default, rename = "from", skip_serializing_if = "Option::is_none")]
    pub from_address: Option<String>,
    /// Filter by subject (partial match)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            include_full_content: false,
            date_from: None,
            date_to: None,
            unread_only: false,
            from_address: None,
            subject: None,
        }
    }
}

/// Default value for `limit`
fn default_limit() -> i64 {
    10
}

/// Accept any finite JSON number for `limit`, dropping the fractional part
fn deserialize_limit<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() {
        return Err(D::Error::custom("limit must be a finite number"));
    }
    Ok(value.trunc() as i64)
}

/// Normalized message record returned to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EmailMessage {
    /// Message UID within the mailbox
    pub uid: u32,
    /// Decoded subject, or `(No Subject)`
    pub subject: String,
    /// Comma-joined sender addresses, or `Unknown`
    pub from: String,
    /// Comma-joined recipient addresses, or `Unknown`
    pub to: String,
    /// ISO-8601 UTC timestamp
    pub date: String,
    /// Plain-text body, truncated unless full content was requested
    pub body: String,
}

/// Address as carried in an IMAP envelope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawAddress {
    pub mailbox: Option<String>,
    pub host: Option<String>,
}

impl RawAddress {
    /// Render as `mailbox@host`
    ///
    /// Returns `None` for group markers and entries without a mailbox part.
    pub fn address(&self) -> Option<String> {
        let mailbox = self.mailbox.as_deref().filter(|m| !m.is_empty())?;
        match self.host.as_deref().filter(|h| !h.is_empty()) {
            Some(host) => Some(format!("{mailbox}@{host}")),
            None => Some(mailbox.to_owned()),
        }
    }
}

/// Envelope fields used by the normalizer, still in wire form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEnvelope {
    /// Subject bytes, possibly RFC 2047 encoded
    pub subject: Option<Vec<u8>>,
    pub from: Vec<RawAddress>,
    pub to: Vec<RawAddress>,
    /// RFC 2822 date bytes
    pub date: Option<Vec<u8>>,
}

/// One item of the fetch stream
///
/// Owns its data so it can outlive the borrowed IMAP response it was read
/// from. Only exists while the stream is being consumed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFetchedMessage {
    pub uid: Option<u32>,
    pub envelope: RawEnvelope,
    /// `BODY[HEADER]` bytes, used for MIME content type and encoding
    pub header: Option<Vec<u8>>,
    /// `BODY[TEXT]` bytes
    pub text: Option<Vec<u8>>,
}

/// Payload for a search that matched nothing
#[derive(Debug, Clone, Serialize)]
pub struct EmptyMessagesPayload {
    pub messages: Vec<EmailMessage>,
    pub count: usize,
    pub message: String,
}

impl Default for EmptyMessagesPayload {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            count: 0,
            message: NO_MESSAGES_FOUND.to_owned(),
        }
    }
}

/// Payload for a completed retrieval
#[derive(Debug, Clone, Serialize)]
pub struct MessagesPayload {
    pub messages: Vec<EmailMessage>,
    pub count: usize,
    /// Echo of the request filters
    pub filters: FilterOptions,
}
