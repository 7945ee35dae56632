//! Mailbox session lifecycle
//!
//! A [`MailboxSession`] owns one authenticated transport and at most one
//! mailbox lock. The store itself sits behind [`MailTransport`] and
//! [`MailConnector`] so the lifecycle can run against the IMAP implementation
//! in [`crate::imap`] or an in-memory store in tests.

use async_trait::async_trait;
use futures::stream::BoxStream;
use tracing::{debug, warn};

use crate::config::Credentials;
use crate::criteria::SearchCriteria;
use crate::errors::{AppError, AppResult};
use crate::models::RawFetchedMessage;

/// Lazy, single-pass stream of fetched messages
///
/// A transport fault ends the stream after yielding one `Err` item.
pub type FetchStream<'a> = BoxStream<'a, AppResult<RawFetchedMessage>>;

/// Low-level operations on an authenticated mail store connection
#[async_trait]
pub trait MailTransport: Send {
    /// Select `mailbox` without write access
    async fn examine(&mut self, mailbox: &str) -> AppResult<()>;

    /// Deselect the currently selected mailbox
    async fn close_mailbox(&mut self) -> AppResult<()>;

    /// Run a `UID SEARCH`, returning UIDs in ascending order
    async fn uid_search(&mut self, query: &str) -> AppResult<Vec<u32>>;

    /// Start a `UID FETCH` for envelope and text part of `uids`
    async fn uid_fetch<'a>(&'a mut self, uids: &[u32]) -> AppResult<FetchStream<'a>>;

    /// End the session
    async fn logout(&mut self) -> AppResult<()>;
}

/// Factory for authenticated transports
#[async_trait]
pub trait MailConnector: Send + Sync {
    type Transport: MailTransport;

    /// Connect and authenticate
    ///
    /// # Errors
    ///
    /// - `AuthFailed` if the store rejects the credentials
    /// - `Connect` or `Timeout` on transport failure
    async fn connect(&self, credentials: &Credentials) -> AppResult<Self::Transport>;
}

/// Proof that a mailbox is locked on a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxLock {
    pub mailbox: String,
}

/// One authenticated store session with at most one held mailbox lock
pub struct MailboxSession<T: MailTransport> {
    transport: T,
    lock: Option<MailboxLock>,
    closed: bool,
}

impl<T: MailTransport> MailboxSession<T> {
    /// Open a session through `connector`
    pub async fn open<C>(connector: &C, credentials: &Credentials) -> AppResult<Self>
    where
        C: MailConnector<Transport = T>,
    {
        let transport = connector.connect(credentials).await?;
        debug!("mail store session opened");
        Ok(Self {
            transport,
            lock: None,
            closed: false,
        })
    }

    /// Acquire the exclusive lock on `mailbox`
    ///
    /// # Errors
    ///
    /// - `Lock` if a lock is already held or the store refuses the mailbox
    pub async fn lock_mailbox(&mut self, mailbox: &str) -> AppResult<MailboxLock> {
        if let Some(held) = &self.lock {
            return Err(AppError::Lock(format!(
                "mailbox '{}' is already locked on this session",
                held.mailbox
            )));
        }
        self.transport.examine(mailbox).await?;
        let lock = MailboxLock {
            mailbox: mailbox.to_owned(),
        };
        self.lock = Some(lock.clone());
        debug!(mailbox, "mailbox locked");
        Ok(lock)
    }

    /// Search the locked mailbox
    ///
    /// # Errors
    ///
    /// - `Lock` if no mailbox is locked
    /// - `InvalidInput` if the criteria cannot be rendered
    /// - `Search` or `Timeout` on store failure
    pub async fn search(&mut self, criteria: &SearchCriteria) -> AppResult<Vec<u32>> {
        self.require_lock()?;
        let query = criteria.to_imap_query()?;
        let uids = self.transport.uid_search(&query).await?;
        debug!(query = %query, matched = uids.len(), "search complete");
        Ok(uids)
    }

    /// Stream envelope and text part for `uids` from the locked mailbox
    pub async fn fetch(&mut self, uids: &[u32]) -> AppResult<FetchStream<'_>> {
        self.require_lock()?;
        self.transport.uid_fetch(uids).await
    }

    /// Release the lock if held, then log out
    ///
    /// Failures are logged and swallowed so that they never mask the outcome
    /// of the invocation. Calling `close` again is a no-op.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(lock) = self.lock.take()
            && let Err(e) = self.transport.close_mailbox().await
        {
            warn!(mailbox = %lock.mailbox, error = %e, "error releasing mailbox lock");
        }
        if let Err(e) = self.transport.logout().await {
            warn!(error = %e, "error logging out");
        }
        debug!("mail store session closed");
    }

    fn require_lock(&self) -> AppResult<()> {
        if self.closed {
            return Err(AppError::Lock("session is closed".to_owned()));
        }
        if self.lock.is_none() {
            return Err(AppError::Lock("no mailbox is locked".to_owned()));
        }
        Ok(())
    }
}
