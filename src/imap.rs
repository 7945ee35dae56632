//! IMAP transport over TLS
//!
//! Implements [`MailConnector`] and [`MailTransport`] on top of `async-imap`.
//! Every network round-trip is bounded by a timeout derived from
//! [`ServerConfig`], and connections are TLS-only.

use std::sync::Arc;
use std::time::Duration;

use async_imap::types::Fetch;
use async_imap::{Client, Session};
use async_trait::async_trait;
use futures::StreamExt;
use rustls::ClientConfig;
use rustls::RootCertStore;
use rustls_pki_types::ServerName;
use secrecy::ExposeSecret;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::config::{Credentials, ServerConfig};
use crate::errors::{AppError, AppResult};
use crate::models::{RawAddress, RawEnvelope, RawFetchedMessage};
use crate::session::{FetchStream, MailConnector, MailTransport};

/// Type alias for authenticated IMAP session over TLS
pub type ImapSession = Session<tokio_rustls::client::TlsStream<TcpStream>>;

/// Items requested for every message in the batch
///
/// `BODY.PEEK` leaves the `\Seen` flag untouched.
const FETCH_QUERY: &str = "(UID ENVELOPE BODYSTRUCTURE BODY.PEEK[HEADER] BODY.PEEK[TEXT])";

/// Opens authenticated IMAP sessions for the configured endpoint
#[derive(Debug, Clone)]
pub struct ImapConnector {
    config: Arc<ServerConfig>,
}

impl ImapConnector {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MailConnector for ImapConnector {
    type Transport = ImapTransport;

    async fn connect(&self, credentials: &Credentials) -> AppResult<ImapTransport> {
        let session = connect_authenticated(&self.config, credentials).await?;
        Ok(ImapTransport {
            config: Arc::clone(&self.config),
            session,
        })
    }
}

/// Authenticated IMAP connection
pub struct ImapTransport {
    config: Arc<ServerConfig>,
    session: ImapSession,
}

impl ImapTransport {
    fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.config.socket_timeout_ms)
    }
}

/// Connect to IMAP server and authenticate
///
/// Performs full connection sequence with timeouts:
/// 1. TCP connect
/// 2. TLS handshake with webpki root certificates
/// 3. Read IMAP greeting
/// 4. LOGIN authentication
///
/// # Errors
///
/// - `Config` if `secure` is false or hostname is invalid for TLS SNI
/// - `Timeout` if any connection phase times out
/// - `AuthFailed` if the server rejects the login
/// - `Connect` for TCP, TLS, or greeting failures
pub async fn connect_authenticated(
    config: &ServerConfig,
    credentials: &Credentials,
) -> AppResult<ImapSession> {
    if !config.secure {
        return Err(AppError::Config(
            "insecure IMAP is not supported; set MAIL_IMAP_SECURE=true".to_owned(),
        ));
    }

    let connect_duration = Duration::from_millis(config.connect_timeout_ms);
    let greeting_duration = Duration::from_millis(config.greeting_timeout_ms);

    let tcp = timeout(
        connect_duration,
        TcpStream::connect((config.host.as_str(), config.port)),
    )
    .await
    .map_err(|_| AppError::Timeout("tcp connect timeout".to_owned()))
    .and_then(|r| r.map_err(|e| AppError::Connect(format!("tcp connect failed: {e}"))))?;

    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(tls_config));

    let server_name = ServerName::try_from(config.host.clone())
        .map_err(|_| AppError::Config("invalid IMAP host for TLS SNI".to_owned()))?;
    let tls_stream = timeout(greeting_duration, connector.connect(server_name, tcp))
        .await
        .map_err(|_| AppError::Timeout("TLS handshake timeout".to_owned()))
        .and_then(|r| r.map_err(|e| AppError::Connect(format!("TLS handshake failed: {e}"))))?;

    let mut client = Client::new(tls_stream);
    let greeting = timeout(greeting_duration, client.read_response())
        .await
        .map_err(|_| AppError::Timeout("IMAP greeting timeout".to_owned()))
        .and_then(|r| r.map_err(|e| AppError::Connect(format!("IMAP greeting failed: {e}"))))?;

    if greeting.is_none() {
        return Err(AppError::Connect(
            "IMAP server closed connection before greeting".to_owned(),
        ));
    }

    let pass = credentials.secret.expose_secret();
    let session = timeout(
        greeting_duration,
        client.login(credentials.identity.as_str(), pass),
    )
    .await
    .map_err(|_| AppError::Timeout("IMAP login timeout".to_owned()))
    .and_then(|r| {
        r.map_err(|(e, _)| match e {
            async_imap::error::Error::No(msg) | async_imap::error::Error::Bad(msg) => {
                AppError::AuthFailed(msg)
            }
            other => AppError::Connect(format!("IMAP login failed: {other}")),
        })
    })?;

    debug!(host = %config.host, port = config.port, "IMAP login succeeded");
    Ok(session)
}

#[async_trait]
impl MailTransport for ImapTransport {
    /// Uses `EXAMINE` so the mailbox is opened read-only
    async fn examine(&mut self, mailbox: &str) -> AppResult<()> {
        let duration = self.socket_timeout();
        let encoded = encode_mailbox_name(mailbox);
        timeout(duration, self.session.examine(&encoded))
            .await
            .map_err(|_| AppError::Timeout(format!("EXAMINE timed out for mailbox '{mailbox}'")))
            .and_then(|r| {
                r.map_err(|e| AppError::Lock(format!("cannot examine mailbox '{mailbox}': {e}")))
            })?;
        Ok(())
    }

    async fn close_mailbox(&mut self) -> AppResult<()> {
        let duration = self.socket_timeout();
        timeout(duration, self.session.close())
            .await
            .map_err(|_| AppError::Timeout("CLOSE timed out".to_owned()))
            .and_then(|r| r.map_err(|e| AppError::Lock(format!("CLOSE failed: {e}"))))
    }

    async fn uid_search(&mut self, query: &str) -> AppResult<Vec<u32>> {
        let duration = self.socket_timeout();
        let set = timeout(duration, self.session.uid_search(query))
            .await
            .map_err(|_| AppError::Timeout("UID SEARCH timed out".to_owned()))
            .and_then(|r| r.map_err(|e| AppError::Search(format!("uid search failed: {e}"))))?;
        let mut uids: Vec<u32> = set.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    async fn uid_fetch<'a>(&'a mut self, uids: &[u32]) -> AppResult<FetchStream<'a>> {
        let duration = self.socket_timeout();
        let uid_set = uids
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let stream = timeout(duration, self.session.uid_fetch(uid_set, FETCH_QUERY))
            .await
            .map_err(|_| AppError::Timeout("UID FETCH timed out".to_owned()))
            .and_then(|r| r.map_err(|e| AppError::Fetch(format!("uid fetch failed: {e}"))))?;

        let items = futures::stream::unfold(Some(Box::pin(stream)), move |state| async move {
            let mut stream = state?;
            match timeout(duration, stream.next()).await {
                Err(_) => Some((
                    Err(AppError::Timeout("UID FETCH stream timed out".to_owned())),
                    None,
                )),
                Ok(None) => None,
                Ok(Some(Err(e))) => Some((
                    Err(AppError::Fetch(format!("uid fetch stream failed: {e}"))),
                    None,
                )),
                Ok(Some(Ok(fetch))) => Some((Ok(raw_from_fetch(&fetch)), Some(stream))),
            }
        });
        Ok(items.boxed())
    }

    async fn logout(&mut self) -> AppResult<()> {
        let duration = self.socket_timeout();
        timeout(duration, self.session.logout())
            .await
            .map_err(|_| AppError::Timeout("LOGOUT timed out".to_owned()))
            .and_then(|r| r.map_err(|e| AppError::Internal(format!("LOGOUT failed: {e}"))))
    }
}

/// Copy the parts of a fetch response the pipeline needs into owned data
fn raw_from_fetch(fetch: &Fetch) -> RawFetchedMessage {
    let envelope = fetch
        .envelope()
        .map(|env| RawEnvelope {
            subject: env.subject.as_ref().map(|s| s.to_vec()),
            from: env
                .from
                .as_ref()
                .map(|list| {
                    list.iter()
                        .map(|a| RawAddress {
                            mailbox: a.mailbox.as_ref().map(|v| lossy(v)),
                            host: a.host.as_ref().map(|v| lossy(v)),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            to: env
                .to
                .as_ref()
                .map(|list| {
                    list.iter()
                        .map(|a| RawAddress {
                            mailbox: a.mailbox.as_ref().map(|v| lossy(v)),
                            host: a.host.as_ref().map(|v| lossy(v)),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            date: env.date.as_ref().map(|d| d.to_vec()),
        })
        .unwrap_or_default();

    RawFetchedMessage {
        uid: fetch.uid,
        envelope,
        header: fetch.header().map(<[u8]>::to_vec),
        text: fetch.text().map(<[u8]>::to_vec),
    }
}

/// Encode a display mailbox name into IMAP modified UTF-7
fn encode_mailbox_name(name: &str) -> String {
    utf7_imap::encode_utf7_imap(name.to_owned())
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
