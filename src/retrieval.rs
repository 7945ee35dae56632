//! `get-messages` orchestration
//!
//! Runs one retrieval against its own session and closes that session on
//! every path before returning.

use tracing::{debug, info};

use crate::config::Credentials;
use crate::criteria;
use crate::errors::AppResult;
use crate::fetch;
use crate::models::{EmailMessage, FilterOptions};
use crate::session::{MailConnector, MailTransport, MailboxSession};

/// What a successful retrieval produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalOutcome {
    /// The search matched no messages
    Empty,
    /// Messages fetched from the selected batch (possibly none)
    Messages(Vec<EmailMessage>),
}

/// Retrieve recent messages from `mailbox` matching `options`
///
/// Missing credentials fail before any connection attempt. Once a session
/// exists it is closed exactly once, whatever the outcome.
///
/// # Errors
///
/// Configuration and session-level failures; per-message parse failures are
/// absorbed by the fetch pipeline.
pub async fn get_messages<C: MailConnector>(
    connector: &C,
    credentials: AppResult<Credentials>,
    mailbox: &str,
    options: &FilterOptions,
) -> AppResult<RetrievalOutcome> {
    let credentials = credentials?;
    let mut session = MailboxSession::open(connector, &credentials).await?;
    let result = retrieve(&mut session, mailbox, options).await;
    session.close().await;
    result
}

async fn retrieve<T: MailTransport>(
    session: &mut MailboxSession<T>,
    mailbox: &str,
    options: &FilterOptions,
) -> AppResult<RetrievalOutcome> {
    let criteria = criteria::translate(options);
    let lock = session.lock_mailbox(mailbox).await?;
    debug!(
        mailbox = %lock.mailbox,
        unconstrained = criteria.is_unconstrained(),
        "searching mailbox"
    );

    let uids = session.search(&criteria).await?;
    if uids.is_empty() {
        info!(mailbox, "no messages matched");
        return Ok(RetrievalOutcome::Empty);
    }

    let batch = fetch::select_batch(&uids, options.limit);
    if batch.is_empty() {
        debug!(limit = options.limit, "limit selects no messages");
        return Ok(RetrievalOutcome::Messages(Vec::new()));
    }

    let messages = fetch::fetch_messages(session, batch, options.include_full_content).await?;
    info!(mailbox, matched = uids.len(), returned = messages.len(), "messages retrieved");
    Ok(RetrievalOutcome::Messages(messages))
}

#[cfg(test)]
mod tests {
    use super::{RetrievalOutcome, get_messages};
    use crate::config::Credentials;
    use crate::models::FilterOptions;
    use crate::testing::{
        FakeConnector, FakeStore, Stage, broken_message, plain_message, test_credentials,
    };

    fn close_sequence(log: &[String]) -> Vec<&str> {
        log.iter()
            .map(String::as_str)
            .filter(|entry| *entry == "close" || *entry == "logout")
            .collect()
    }

    #[tokio::test]
    async fn empty_mailbox_returns_empty_and_closes() {
        let connector = FakeConnector::new(FakeStore::default());
        let outcome = get_messages(
            &connector,
            Ok(test_credentials()),
            "INBOX",
            &FilterOptions::default(),
        )
        .await
        .expect("retrieval");
        assert_eq!(outcome, RetrievalOutcome::Empty);
        assert_eq!(
            connector.log(),
            ["connect", "examine INBOX", "search ALL", "close", "logout"]
        );
    }

    #[tokio::test]
    async fn limit_selects_most_recent_messages() {
        let connector = FakeConnector::new(FakeStore::with_uids(&[10, 11, 12]));
        let options = FilterOptions {
            limit: 2,
            ..FilterOptions::default()
        };
        let outcome = get_messages(&connector, Ok(test_credentials()), "INBOX", &options)
            .await
            .expect("retrieval");
        let RetrievalOutcome::Messages(messages) = outcome else {
            panic!("expected messages");
        };
        assert_eq!(messages.iter().map(|m| m.uid).collect::<Vec<_>>(), [11, 12]);
        assert!(connector.log().contains(&"fetch 11,12".to_owned()));
        assert_eq!(close_sequence(&connector.log()), ["close", "logout"]);
    }

    #[tokio::test]
    async fn long_body_is_previewed() {
        let mut store = FakeStore::with_uids(&[1]);
        store.messages.insert(1, plain_message(1, &"a".repeat(600)));
        let connector = FakeConnector::new(store);
        let outcome = get_messages(
            &connector,
            Ok(test_credentials()),
            "INBOX",
            &FilterOptions::default(),
        )
        .await
        .expect("retrieval");
        let RetrievalOutcome::Messages(messages) = outcome else {
            panic!("expected messages");
        };
        assert_eq!(messages[0].body.chars().count(), 503);
        assert!(messages[0].body.ends_with("..."));
    }

    #[tokio::test]
    async fn missing_credentials_never_connect() {
        let connector = FakeConnector::new(FakeStore::with_uids(&[1]));
        let err = get_messages(
            &connector,
            Credentials::from_values(None, None),
            "INBOX",
            &FilterOptions::default(),
        )
        .await
        .expect_err("must fail");
        assert!(err.to_string().contains("USER_EMAIL"));
        assert!(err.to_string().contains("USER_PASS"));
        assert_eq!(connector.connect_attempts(), 0);
        assert!(connector.log().is_empty());
    }

    #[tokio::test]
    async fn broken_message_is_omitted_without_error() {
        let mut store = FakeStore::with_uids(&[1, 2, 3]);
        store.messages.insert(3, broken_message(3));
        let connector = FakeConnector::new(store);
        let outcome = get_messages(
            &connector,
            Ok(test_credentials()),
            "INBOX",
            &FilterOptions::default(),
        )
        .await
        .expect("retrieval");
        let RetrievalOutcome::Messages(messages) = outcome else {
            panic!("expected messages");
        };
        assert_eq!(messages.iter().map(|m| m.uid).collect::<Vec<_>>(), [1, 2]);
        assert_eq!(close_sequence(&connector.log()), ["close", "logout"]);
    }

    #[tokio::test]
    async fn session_failures_close_exactly_once() {
        for stage in [Stage::Examine, Stage::Search, Stage::Fetch, Stage::FetchStream] {
            let connector = FakeConnector::new(FakeStore::failing_at(stage));
            let result = get_messages(
                &connector,
                Ok(test_credentials()),
                "INBOX",
                &FilterOptions::default(),
            )
            .await;
            assert!(result.is_err(), "{stage:?} should fail");
            let log = connector.log();
            assert_eq!(log.last().map(String::as_str), Some("logout"), "{stage:?}");
            assert_eq!(
                log.iter().filter(|entry| *entry == "logout").count(),
                1,
                "{stage:?}"
            );
        }
    }

    #[tokio::test]
    async fn broken_fetch_stream_fails_without_partial_results() {
        let store = FakeStore {
            fail_at: Some(Stage::FetchStream),
            ..FakeStore::with_uids(&[1, 2, 3])
        };
        let connector = FakeConnector::new(store);
        let err = get_messages(
            &connector,
            Ok(test_credentials()),
            "INBOX",
            &FilterOptions::default(),
        )
        .await
        .expect_err("a broken stream fails the call");
        assert!(err.to_string().contains("fetch failed"));
        assert_eq!(
            connector.log(),
            [
                "connect",
                "examine INBOX",
                "search ALL",
                "fetch 1,2,3",
                "close",
                "logout"
            ]
        );
    }

    #[tokio::test]
    async fn lock_failure_skips_release_but_logs_out() {
        let connector = FakeConnector::new(FakeStore::failing_at(Stage::Examine));
        let err = get_messages(
            &connector,
            Ok(test_credentials()),
            "Archive",
            &FilterOptions::default(),
        )
        .await
        .expect_err("must fail");
        assert!(err.to_string().contains("mailbox lock failed"));
        assert_eq!(connector.log(), ["connect", "examine Archive", "logout"]);
    }

    #[tokio::test]
    async fn auth_failure_has_no_session_to_close() {
        let connector = FakeConnector::new(FakeStore::failing_at(Stage::Connect));
        let err = get_messages(
            &connector,
            Ok(test_credentials()),
            "INBOX",
            &FilterOptions::default(),
        )
        .await
        .expect_err("must fail");
        assert!(err.to_string().contains("authentication failed"));
        assert_eq!(connector.log(), ["connect"]);
    }

    #[tokio::test]
    async fn logout_failure_does_not_mask_success() {
        let connector = FakeConnector::new(FakeStore::failing_at(Stage::Logout));
        let outcome = get_messages(
            &connector,
            Ok(test_credentials()),
            "INBOX",
            &FilterOptions::default(),
        )
        .await
        .expect("retrieval");
        assert!(matches!(outcome, RetrievalOutcome::Messages(ref m) if m.len() == 1));
    }

    #[tokio::test]
    async fn zero_limit_skips_fetch() {
        let connector = FakeConnector::new(FakeStore::with_uids(&[1, 2]));
        let options = FilterOptions {
            limit: 0,
            ..FilterOptions::default()
        };
        let outcome = get_messages(&connector, Ok(test_credentials()), "INBOX", &options)
            .await
            .expect("retrieval");
        assert_eq!(outcome, RetrievalOutcome::Messages(Vec::new()));
        assert!(!connector.log().iter().any(|e| e.starts_with("fetch")));
        assert_eq!(close_sequence(&connector.log()), ["close", "logout"]);
    }

    #[tokio::test]
    async fn invalid_date_is_reported_after_closing() {
        let connector = FakeConnector::new(FakeStore::with_uids(&[1]));
        let options = FilterOptions {
            date_from: Some("not-a-date".to_owned()),
            ..FilterOptions::default()
        };
        let err = get_messages(&connector, Ok(test_credentials()), "INBOX", &options)
            .await
            .expect_err("must fail");
        assert!(err.to_string().contains("dateFrom"));
        assert_eq!(connector.log(), ["connect", "examine INBOX", "close", "logout"]);
    }
}
