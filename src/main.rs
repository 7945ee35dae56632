//! mail-reader-mcp: read-only IMAP MCP server over stdio
//!
//! Exposes a single `get-messages` tool that returns recent messages from one
//! mailbox, filtered by date, sender, subject and unread state.
//!
//! # Architecture
//!
//! - [`main`]: Process entry point with env loading and stdio serving
//! - [`config`]: Endpoint settings and per-call credentials
//! - [`errors`]: Application error model with MCP error mapping
//! - [`criteria`]: Filter to IMAP search criteria translation
//! - [`session`]: Mailbox session lifecycle over a transport trait
//! - [`imap`]: IMAP transport with timeout wrappers
//! - [`fetch`]: Batch selection and the fetch stream pipeline
//! - [`mime`]: Body part parsing and text cleanup
//! - [`normalize`]: Output record construction
//! - [`retrieval`]: Per-call orchestration with guaranteed teardown
//! - [`response`]: Tool result assembly
//! - [`server`]: MCP tool handler
//! - [`models`]: Input/output DTOs and schema-bearing types

mod config;
mod criteria;
mod errors;
mod fetch;
mod imap;
mod mime;
mod models;
mod normalize;
mod response;
mod retrieval;
mod server;
mod session;
#[cfg(test)]
mod testing;

use config::ServerConfig;
use rmcp::ServiceExt;
use rmcp::transport::stdio;
use tracing_subscriber::EnvFilter;

/// Application entry point
///
/// Initializes tracing on stderr, loads config, and serves the MCP server over
/// stdio. Credentials are read per tool call, not here.
///
/// # Example
///
/// ```no_run
/// USER_EMAIL=user@gmail.com \
/// USER_PASS=app-password \
/// cargo run
/// ```
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = ServerConfig::load_from_env()?;
    tracing::info!(host = %config.host, mailbox = %config.mailbox, "mail reader MCP server starting on stdio");
    let service = server::MailReaderServer::new(config).serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}
