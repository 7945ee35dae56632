//! MCP server implementation with the `get-messages` tool
//!
//! Implements the `ServerHandler` trait and registers a single tool. Each call
//! reads credentials, runs one retrieval on a fresh session, and returns the
//! assembled text result.

use std::sync::Arc;
use std::time::Instant;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, ErrorData, ServerCapabilities, ServerInfo};
use rmcp::{ServerHandler, tool, tool_handler, tool_router};
use tracing::debug;

use crate::config::{Credentials, ServerConfig};
use crate::imap::ImapConnector;
use crate::models::FilterOptions;
use crate::response;
use crate::retrieval;

/// Mail reader MCP server
///
/// Holds only immutable configuration, so concurrent tool calls share no
/// mutable state.
#[derive(Clone)]
pub struct MailReaderServer {
    /// Server config (endpoint, mailbox, timeouts)
    config: Arc<ServerConfig>,
    /// Tool router for dispatching MCP tool calls
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl MailReaderServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            tool_router: Self::tool_router(),
        }
    }

    /// Tool: Get recent messages
    ///
    /// Retrieval failures are returned as error-flagged results; only a
    /// serialization fault becomes a protocol error.
    #[tool(
        name = "get-messages",
        title = "Get Messages",
        description = "Get the last messages from your inbox"
    )]
    async fn get_messages(
        &self,
        Parameters(input): Parameters<FilterOptions>,
    ) -> Result<CallToolResult, ErrorData> {
        let started = Instant::now();
        let connector = ImapConnector::new(Arc::clone(&self.config));
        let outcome = retrieval::get_messages(
            &connector,
            Credentials::from_env(),
            &self.config.mailbox,
            &input,
        )
        .await;
        let result = response::assemble(outcome, input).map_err(|e| e.to_error_data());
        debug!(duration_ms = duration_ms(started), "get-messages finished");
        result
    }
}

/// MCP server handler implementation
///
/// Provides server info and capabilities to MCP client.
#[tool_handler(router = self.tool_router)]
impl ServerHandler for MailReaderServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build()).with_instructions(
            "Read-only mail server. Use get-messages to read recent messages from the configured mailbox.",
        )
    }
}

/// Calculate elapsed milliseconds
fn duration_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}
