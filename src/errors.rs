//! Application error model with MCP error mapping
//!
//! Defines a typed error hierarchy using `thiserror`. Retrieval failures are
//! reported to the client as error-flagged tool results; only protocol-level
//! faults (e.g. a response that cannot be serialized) are mapped to MCP
//! `ErrorData`.

use rmcp::model::ErrorData;
use serde_json::json;
use thiserror::Error;

/// Application error type
///
/// Session-level variants (`AuthFailed`, `Connect`, `Lock`, `Search`,
/// `Fetch`, `Timeout`) abort an invocation after the session is closed.
/// `Parse` never escapes the fetch pipeline; it becomes a skipped item.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid user input (malformed date filter, control characters)
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Missing or malformed configuration (credentials, server settings)
    #[error("{0}")]
    Config(String),
    /// Authentication rejected by the mail store
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    /// Transport failure before a session was established
    #[error("connection failed: {0}")]
    Connect(String),
    /// Mailbox lock could not be acquired
    #[error("mailbox lock failed: {0}")]
    Lock(String),
    /// Search command failed
    #[error("search failed: {0}")]
    Search(String),
    /// Fetch command or fetch stream failed
    #[error("fetch failed: {0}")]
    Fetch(String),
    /// A single message body could not be parsed
    #[error("parse failed: {0}")]
    Parse(String),
    /// Operation timeout (TCP connect, TLS handshake, IMAP response)
    #[error("operation timed out: {0}")]
    Timeout(String),
    /// Internal error (unexpected failure, external crate error)
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Convenience constructor for `InvalidInput`
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Convert to MCP `ErrorData`
    ///
    /// Includes a structured `code` field for client error handling.
    pub fn to_error_data(&self) -> ErrorData {
        let msg = self.to_string();
        match self {
            Self::InvalidInput(_) => {
                ErrorData::invalid_params(msg, Some(json!({ "code": "invalid_input" })))
            }
            Self::Config(_) => {
                ErrorData::invalid_request(msg, Some(json!({ "code": "config" })))
            }
            Self::AuthFailed(_) => {
                ErrorData::invalid_request(msg, Some(json!({ "code": "auth_failed" })))
            }
            Self::Timeout(_) => ErrorData::internal_error(msg, Some(json!({ "code": "timeout" }))),
            Self::Connect(_)
            | Self::Lock(_)
            | Self::Search(_)
            | Self::Fetch(_)
            | Self::Parse(_)
            | Self::Internal(_) => {
                ErrorData::internal_error(msg, Some(json!({ "code": "internal" })))
            }
        }
    }
}

/// Type alias for fallible return values
pub type AppResult<T> = Result<T, AppError>;
