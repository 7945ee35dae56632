//! Configuration for the mail store endpoint and per-invocation credentials
//!
//! Server settings are loaded once at startup from `MAIL_IMAP_*` variables.
//! Credentials are read from `USER_EMAIL` / `USER_PASS` on every tool call so
//! that a missing value fails the call without touching the network.

use std::env;
use std::env::VarError;

use secrecy::SecretString;

use crate::errors::{AppError, AppResult};

/// Environment variable holding the login identity
pub const USER_EMAIL_VAR: &str = "USER_EMAIL";
/// Environment variable holding the login secret
pub const USER_PASS_VAR: &str = "USER_PASS";

/// Mail store login credentials
///
/// The secret is stored using `SecretString` to prevent accidental logging.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Username for authentication
    pub identity: String,
    /// Password stored in a type that prevents accidental logging
    pub secret: SecretString,
}

impl Credentials {
    /// Read credentials from the process environment
    ///
    /// # Errors
    ///
    /// Returns `Config` naming both variables if either is missing or blank.
    pub fn from_env() -> AppResult<Self> {
        Self::from_values(
            env::var(USER_EMAIL_VAR).ok(),
            env::var(USER_PASS_VAR).ok(),
        )
    }

    /// Build credentials from optional raw values
    pub fn from_values(identity: Option<String>, secret: Option<String>) -> AppResult<Self> {
        match (non_blank(identity), non_blank(secret)) {
            (Some(identity), Some(secret)) => Ok(Self {
                identity,
                secret: SecretString::new(secret.into()),
            }),
            _ => Err(AppError::Config(format!(
                "{USER_EMAIL_VAR} and {USER_PASS_VAR} environment variables are required"
            ))),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Server-wide configuration
///
/// Cloned into MCP tool handlers via `Arc` for thread-safe shared access.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// IMAP server hostname
    pub host: String,
    /// IMAP server port (typically 993 for TLS)
    pub port: u16,
    /// Whether to use TLS (currently enforced to `true`)
    pub secure: bool,
    /// Mailbox the tool reads from
    pub mailbox: String,
    /// TCP connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// IMAP greeting/TLS handshake timeout in milliseconds
    pub greeting_timeout_ms: u64,
    /// Socket I/O timeout in milliseconds
    pub socket_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "imap.gmail.com".to_owned(),
            port: 993,
            secure: true,
            mailbox: "INBOX".to_owned(),
            connect_timeout_ms: 30_000,
            greeting_timeout_ms: 15_000,
            socket_timeout_ms: 300_000,
        }
    }
}

impl ServerConfig {
    /// Load all configuration from environment variables
    ///
    /// Every setting is optional; unset variables fall back to
    /// [`ServerConfig::default`].
    ///
    /// # Errors
    ///
    /// Returns `Config` if a variable is set to a malformed value.
    ///
    /// # Example Environment
    ///
    /// ```text
    /// MAIL_IMAP_HOST=imap.gmail.com
    /// MAIL_IMAP_PORT=993
    /// MAIL_IMAP_MAILBOX=INBOX
    /// MAIL_IMAP_SOCKET_TIMEOUT_MS=60000
    /// ```
    pub fn load_from_env() -> AppResult<Self> {
        let defaults = Self::default();
        let mailbox = string_env("MAIL_IMAP_MAILBOX", &defaults.mailbox)?;
        if mailbox.is_empty() || mailbox.chars().any(|ch| ch.is_ascii_control()) {
            return Err(AppError::Config(
                "MAIL_IMAP_MAILBOX must be non-empty and free of control characters".to_owned(),
            ));
        }

        Ok(Self {
            host: string_env("MAIL_IMAP_HOST", &defaults.host)?,
            port: parse_u16_env("MAIL_IMAP_PORT", defaults.port)?,
            secure: parse_bool_env("MAIL_IMAP_SECURE", defaults.secure)?,
            mailbox,
            connect_timeout_ms: parse_u64_env(
                "MAIL_IMAP_CONNECT_TIMEOUT_MS",
                defaults.connect_timeout_ms,
            )?,
            greeting_timeout_ms: parse_u64_env(
                "MAIL_IMAP_GREETING_TIMEOUT_MS",
                defaults.greeting_timeout_ms,
            )?,
            socket_timeout_ms: parse_u64_env(
                "MAIL_IMAP_SOCKET_TIMEOUT_MS",
                defaults.socket_timeout_ms,
            )?,
        })
    }
}

/// Read an optional string variable, trimming whitespace
fn string_env(key: &str, default: &str) -> AppResult<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_owned()),
        Ok(_) | Err(VarError::NotPresent) => Ok(default.to_owned()),
        Err(VarError::NotUnicode(_)) => Err(non_unicode(key)),
    }
}

/// Parse a boolean environment variable with flexible values
///
/// Accepts: `1`, `true`, `yes`, `y`, `on` (truthy) or `0`, `false`, `no`,
/// `n`, `off` (falsy). Case-insensitive. Returns `default` if unset.
fn parse_bool_env(key: &str, default: bool) -> AppResult<bool> {
    match env::var(key) {
        Ok(v) => parse_bool_value(&v).ok_or_else(|| {
            AppError::Config(format!("invalid boolean environment variable {key}: '{v}'"))
        }),
        Err(VarError::NotPresent) => Ok(default),
        Err(VarError::NotUnicode(_)) => Err(non_unicode(key)),
    }
}

fn parse_bool_value(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a `u16` environment variable with default fallback
fn parse_u16_env(key: &str, default: u16) -> AppResult<u16> {
    match env::var(key) {
        Ok(v) => v.trim().parse::<u16>().map_err(|_| {
            AppError::Config(format!("invalid u16 environment variable {key}: '{v}'"))
        }),
        Err(VarError::NotPresent) => Ok(default),
        Err(VarError::NotUnicode(_)) => Err(non_unicode(key)),
    }
}

/// Parse a `u64` environment variable with default fallback
fn parse_u64_env(key: &str, default: u64) -> AppResult<u64> {
    match env::var(key) {
        Ok(v) => v.trim().parse::<u64>().map_err(|_| {
            AppError::Config(format!("invalid u64 environment variable {key}: '{v}'"))
        }),
        Err(VarError::NotPresent) => Ok(default),
        Err(VarError::NotUnicode(_)) => Err(non_unicode(key)),
    }
}

fn non_unicode(key: &str) -> AppError {
    AppError::Config(format!(
        "environment variable {key} contains non-unicode data"
    ))
}
