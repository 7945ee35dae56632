//! Tool result assembly
//!
//! Maps a retrieval outcome onto the single text content block returned by
//! `get-messages`: pretty-printed JSON on success, an error-flagged plain-text
//! message on failure.

use rmcp::model::{CallToolResult, Content};
use serde::Serialize;
use tracing::warn;

use crate::errors::{AppError, AppResult};
use crate::models::{EmptyMessagesPayload, FilterOptions, MessagesPayload};
use crate::retrieval::RetrievalOutcome;

/// Build the tool result for `get-messages`
///
/// # Errors
///
/// - `Internal` if the payload cannot be serialized
pub fn assemble(
    outcome: AppResult<RetrievalOutcome>,
    filters: FilterOptions,
) -> AppResult<CallToolResult> {
    match outcome {
        Ok(RetrievalOutcome::Empty) => json_result(&EmptyMessagesPayload::default()),
        Ok(RetrievalOutcome::Messages(messages)) => json_result(&MessagesPayload {
            count: messages.len(),
            messages,
            filters,
        }),
        Err(e) => {
            warn!(error = %e, "get-messages failed");
            Ok(CallToolResult::error(vec![Content::text(format!(
                "Error fetching messages: {e}"
            ))]))
        }
    }
}

fn json_result<T: Serialize>(payload: &T) -> AppResult<CallToolResult> {
    let text = serde_json::to_string_pretty(payload)
        .map_err(|e| AppError::Internal(format!("serialization failure: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}
