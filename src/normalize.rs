//! Conversion of fetched messages into output records

use chrono::{DateTime, SecondsFormat, Utc};

use crate::mime;
use crate::models::{EmailMessage, RawAddress, RawFetchedMessage};

/// Characters kept in a body preview
pub const PREVIEW_MAX_CHARS: usize = 500;

const NO_SUBJECT: &str = "(No Subject)";
const UNKNOWN_ADDRESS: &str = "Unknown";
const ELLIPSIS: &str = "...";

/// Build the output record for one fetched message
///
/// `body` is the already-parsed plain text of the message's text part.
pub fn normalize(
    uid: u32,
    raw: &RawFetchedMessage,
    body: &str,
    include_full_content: bool,
) -> EmailMessage {
    let envelope = &raw.envelope;
    let subject = envelope
        .subject
        .as_deref()
        .map(mime::decode_header_value)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| NO_SUBJECT.to_owned());

    EmailMessage {
        uid,
        subject,
        from: join_addresses(&envelope.from),
        to: join_addresses(&envelope.to),
        date: envelope_date(envelope.date.as_deref()),
        body: preview_body(body, include_full_content),
    }
}

/// Join address strings with `,`, or `Unknown` when there are none
fn join_addresses(addresses: &[RawAddress]) -> String {
    let joined = addresses
        .iter()
        .filter_map(RawAddress::address)
        .collect::<Vec<_>>()
        .join(",");
    if joined.is_empty() {
        UNKNOWN_ADDRESS.to_owned()
    } else {
        joined
    }
}

/// Render the envelope date as ISO-8601 UTC, defaulting to now
fn envelope_date(raw: Option<&[u8]>) -> String {
    raw.and_then(|bytes| mailparse::dateparse(&String::from_utf8_lossy(bytes)).ok())
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .unwrap_or_else(Utc::now)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Apply the preview truncation policy
pub fn preview_body(body: &str, include_full_content: bool) -> String {
    if include_full_content || body.chars().count() <= PREVIEW_MAX_CHARS {
        return body.to_owned();
    }
    let mut preview = mime::truncate_chars(body, PREVIEW_MAX_CHARS);
    preview.push_str(ELLIPSIS);
    preview
}
