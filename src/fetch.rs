//! Message fetch pipeline
//!
//! Picks the most recent identifiers from a search result, streams them
//! through one `UID FETCH`, and turns every streamed item into an explicit
//! [`FetchOutcome`]. A body that fails to parse is skipped; a transport fault
//! on the stream aborts the batch.

use futures::StreamExt;
use tracing::{debug, warn};

use crate::errors::AppResult;
use crate::mime;
use crate::models::{EmailMessage, RawFetchedMessage};
use crate::normalize;
use crate::session::{MailTransport, MailboxSession};

/// Result of processing one streamed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Parsed(EmailMessage),
    Skipped { uid: Option<u32>, reason: String },
}

/// Select at most `limit` most recent identifiers
///
/// `uids` is in ascending store order; the tail is returned unchanged in that
/// order. A `limit` of zero or less selects nothing.
pub fn select_batch(uids: &[u32], limit: i64) -> &[u32] {
    if limit <= 0 {
        return &[];
    }
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    &uids[uids.len().saturating_sub(limit)..]
}

/// Fetch, parse and normalize `batch`
///
/// Output order follows stream delivery order. Skipped items are logged and
/// left out.
///
/// # Errors
///
/// - `Fetch` or `Timeout` if the fetch command or the stream fails
pub async fn fetch_messages<T: MailTransport>(
    session: &mut MailboxSession<T>,
    batch: &[u32],
    include_full_content: bool,
) -> AppResult<Vec<EmailMessage>> {
    let mut stream = session.fetch(batch).await?;
    let mut messages = Vec::with_capacity(batch.len());
    let mut skipped = 0usize;

    while let Some(item) = stream.next().await {
        let raw = item?;
        match process_item(&raw, include_full_content) {
            FetchOutcome::Parsed(message) => messages.push(message),
            FetchOutcome::Skipped { uid, reason } => {
                skipped += 1;
                warn!(uid = ?uid, reason = %reason, "skipping message");
            }
        }
    }

    debug!(
        requested = batch.len(),
        fetched = messages.len(),
        skipped,
        "fetch complete"
    );
    Ok(messages)
}

/// Parse and normalize one streamed message
pub fn process_item(raw: &RawFetchedMessage, include_full_content: bool) -> FetchOutcome {
    let Some(uid) = raw.uid else {
        return FetchOutcome::Skipped {
            uid: None,
            reason: "fetch response carried no UID".to_owned(),
        };
    };

    let body = match raw.text.as_deref() {
        Some(text) => match mime::parse_text_part(raw.header.as_deref(), text) {
            Ok(body) => body,
            Err(e) => {
                return FetchOutcome::Skipped {
                    uid: Some(uid),
                    reason: e.to_string(),
                };
            }
        },
        None => String::new(),
    };

    FetchOutcome::Parsed(normalize::normalize(
        uid,
        raw,
        &body,
        include_full_content,
    ))
}
