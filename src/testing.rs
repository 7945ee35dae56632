//! In-memory mail store used by unit tests
//!
//! `FakeConnector` records every transport call in a shared log so tests can
//! assert on the exact lifecycle sequence.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;

use crate::config::Credentials;
use crate::errors::{AppError, AppResult};
use crate::models::{RawAddress, RawEnvelope, RawFetchedMessage};
use crate::session::{FetchStream, MailConnector, MailTransport};

/// Transport step at which the fake store fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connect,
    Examine,
    Search,
    Fetch,
    /// Fetch starts, then the stream breaks after the first message
    FetchStream,
    CloseMailbox,
    Logout,
}

#[derive(Debug, Clone, Default)]
pub struct FakeStore {
    pub uids: Vec<u32>,
    pub messages: BTreeMap<u32, RawFetchedMessage>,
    pub fail_at: Option<Stage>,
}

impl FakeStore {
    pub fn with_uids(uids: &[u32]) -> Self {
        Self {
            uids: uids.to_vec(),
            messages: uids.iter().map(|uid| (*uid, plain_message(*uid, "hello"))).collect(),
            fail_at: None,
        }
    }

    pub fn failing_at(stage: Stage) -> Self {
        Self {
            fail_at: Some(stage),
            ..Self::with_uids(&[1])
        }
    }

    fn check(&self, stage: Stage) -> AppResult<()> {
        if self.fail_at == Some(stage) {
            return Err(match stage {
                Stage::Connect => AppError::AuthFailed("invalid credentials".to_owned()),
                Stage::Examine => AppError::Lock("mailbox does not exist".to_owned()),
                Stage::Search => AppError::Search("connection reset".to_owned()),
                Stage::Fetch | Stage::FetchStream => {
                    AppError::Fetch("connection reset".to_owned())
                }
                Stage::CloseMailbox => AppError::Internal("CLOSE rejected".to_owned()),
                Stage::Logout => AppError::Internal("LOGOUT rejected".to_owned()),
            });
        }
        Ok(())
    }
}

pub struct FakeConnector {
    store: FakeStore,
    log: Arc<Mutex<Vec<String>>>,
    connects: AtomicUsize,
}

impl FakeConnector {
    pub fn new(store: FakeStore) -> Self {
        Self {
            store,
            log: Arc::new(Mutex::new(Vec::new())),
            connects: AtomicUsize::new(0),
        }
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().expect("log lock").clone()
    }

    pub fn connect_attempts(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

pub struct FakeTransport {
    store: FakeStore,
    log: Arc<Mutex<Vec<String>>>,
}

impl FakeTransport {
    fn record(&self, entry: impl Into<String>) {
        self.log.lock().expect("log lock").push(entry.into());
    }
}

#[async_trait]
impl MailConnector for FakeConnector {
    type Transport = FakeTransport;

    async fn connect(&self, _credentials: &Credentials) -> AppResult<FakeTransport> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.log.lock().expect("log lock").push("connect".to_owned());
        self.store.check(Stage::Connect)?;
        Ok(FakeTransport {
            store: self.store.clone(),
            log: Arc::clone(&self.log),
        })
    }
}

#[async_trait]
impl MailTransport for FakeTransport {
    async fn examine(&mut self, mailbox: &str) -> AppResult<()> {
        self.record(format!("examine {mailbox}"));
        self.store.check(Stage::Examine)
    }

    async fn close_mailbox(&mut self) -> AppResult<()> {
        self.record("close");
        self.store.check(Stage::CloseMailbox)
    }

    async fn uid_search(&mut self, query: &str) -> AppResult<Vec<u32>> {
        self.record(format!("search {query}"));
        self.store.check(Stage::Search)?;
        Ok(self.store.uids.clone())
    }

    async fn uid_fetch<'a>(&'a mut self, uids: &[u32]) -> AppResult<FetchStream<'a>> {
        let set = uids.iter().map(u32::to_string).collect::<Vec<_>>().join(",");
        self.record(format!("fetch {set}"));
        self.store.check(Stage::Fetch)?;
        let mut items = uids
            .iter()
            .filter_map(|uid| self.store.messages.get(uid).cloned())
            .map(Ok)
            .collect::<Vec<AppResult<RawFetchedMessage>>>();
        if let Err(err) = self.store.check(Stage::FetchStream) {
            items.insert(items.len().min(1), Err(err));
        }
        Ok(futures::stream::iter(items).boxed())
    }

    async fn logout(&mut self) -> AppResult<()> {
        self.record("logout");
        self.store.check(Stage::Logout)
    }
}

pub fn test_credentials() -> Credentials {
    Credentials::from_values(Some("me@example.com".to_owned()), Some("pw".to_owned()))
        .expect("test credentials")
}

/// Single-part plain text message with a fixed envelope
pub fn plain_message(uid: u32, body: &str) -> RawFetchedMessage {
    RawFetchedMessage {
        uid: Some(uid),
        envelope: RawEnvelope {
            subject: Some(format!("Message {uid}").into_bytes()),
            from: vec![RawAddress {
                mailbox: Some("alice".to_owned()),
                host: Some("example.com".to_owned()),
            }],
            to: vec![RawAddress {
                mailbox: Some("me".to_owned()),
                host: Some("example.com".to_owned()),
            }],
            date: Some(b"Wed, 1 Jan 2025 00:00:00 +0000".to_vec()),
        },
        header: Some(b"Content-Type: text/plain; charset=utf-8\r\n\r\n".to_vec()),
        text: Some(body.as_bytes().to_vec()),
    }
}

/// Message whose text part cannot be decoded
pub fn broken_message(uid: u32) -> RawFetchedMessage {
    RawFetchedMessage {
        header: Some(
            b"Content-Type: text/plain\r\nContent-Transfer-Encoding: base64\r\n\r\n".to_vec(),
        ),
        text: Some(b"!!!! not base64 !!!!".to_vec()),
        ..plain_message(uid, "")
    }
}
