//! Mailbox intake: periodic scan of unread mail for signal subjects.
//!
//! One cycle, strictly sequential:
//!
//! ```text
//! open session ─► fetch unseen headers ─► for each message:
//!     subject without marker      → left unread   (skipped)
//!     marker, unparsable payload  → left unread   (errors)
//!     payload fails validation    → marked read   (rejected, PIN mismatch included)
//!     payload validated           → execute, then marked read (processed)
//!     execution panicked          → marked read   (errors)
//! ─► close session
//! ```
//!
//! Execution outcome does not affect flagging: a validated signal is handled
//! once whether or not the exchange accepted the order. A cycle that cannot
//! connect is logged and retried on the next tick.

pub mod imap;
pub mod store;
pub mod subject;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use tx_signal::{SignalError, SignalProcessor};

pub use self::imap::ImapStore;
pub use self::store::{Envelope, MailSession, MailStore};
use self::subject::{SubjectSignal, parse_subject};

/// Counters for one polling cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Unread messages examined.
    pub seen: usize,
    /// Validated signals handed to the executor.
    pub processed: usize,
    /// Messages without the marker.
    pub skipped: usize,
    /// Parsed payloads that failed validation.
    pub rejected: usize,
    /// Unparsable payloads, aborted executions, and store failures on individual messages.
    pub errors: usize,
}

pub struct MailboxPoller {
    store: Arc<dyn MailStore>,
    processor: SignalProcessor,
    marker: String,
    interval: Duration,
}

impl MailboxPoller {
    pub fn new(
        store: Arc<dyn MailStore>,
        processor: SignalProcessor,
        marker: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            processor,
            marker: marker.into(),
            interval,
        }
    }

    /// Poll forever. Only returns if the task is aborted.
    pub async fn run(self) {
        info!(
            "[mailbox] polling every {}s for subjects starting with {:?}",
            self.interval.as_secs(),
            self.marker
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.poll_once().await {
                Ok(report) if report.seen > 0 => info!("[mailbox] cycle done: {report:?}"),
                Ok(_) => debug!("[mailbox] no unread messages"),
                Err(e) => error!("[mailbox] cycle failed: {e:#}"),
            }
        }
    }

    /// Run one polling cycle.
    pub async fn poll_once(&self) -> anyhow::Result<PollReport> {
        let mut session = self.store.open().await?;
        let result = self.drain(session.as_mut()).await;
        if let Err(e) = session.close().await {
            warn!("[mailbox] closing session failed: {e:#}");
        }
        result
    }

    async fn drain(&self, session: &mut dyn MailSession) -> anyhow::Result<PollReport> {
        let envelopes = session.fetch_unseen().await?;
        let mut report = PollReport {
            seen: envelopes.len(),
            ..PollReport::default()
        };

        for envelope in envelopes {
            let uid = envelope.uid;
            let subject = envelope.subject.unwrap_or_default();

            let raw = match parse_subject(&subject, &self.marker) {
                SubjectSignal::NoMarker => {
                    debug!("[mailbox] uid {uid}: not a signal, left unread");
                    report.skipped += 1;
                    continue;
                }
                SubjectSignal::Malformed(reason) => {
                    error!("[mailbox] uid {uid}: unparsable signal payload ({reason}), left unread");
                    report.errors += 1;
                    continue;
                }
                SubjectSignal::Payload(raw) => raw,
            };

            match self.processor.process("mailbox", &raw).await {
                Err(e) if e.is_rejection() => report.rejected += 1,
                Err(SignalError::Aborted(_)) => {
                    error!("[mailbox] uid {uid}: execution aborted, not retried");
                    report.errors += 1;
                }
                // Unavailable exchange or order rejection: already logged by the pipeline.
                _ => report.processed += 1,
            }

            if let Err(e) = session.mark_seen(uid).await {
                error!("[mailbox] uid {uid}: {e:#}");
                report.errors += 1;
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tx_core::Side;
    use tx_exchange::mock::{MockCall, MockExchange, MockOp};
    use tx_exchange::{Exchange, ExchangeRegistry};
    use tx_signal::SignalValidator;

    use super::*;

    #[derive(Default)]
    struct Inbox {
        /// uid → (subject, seen)
        messages: BTreeMap<u32, (Option<String>, bool)>,
        offline: bool,
        closed: usize,
    }

    #[derive(Clone, Default)]
    struct MemoryStore(Arc<Mutex<Inbox>>);

    impl MemoryStore {
        fn with(subjects: &[&str]) -> Self {
            let store = Self::default();
            for (i, s) in subjects.iter().enumerate() {
                store.0.lock().unwrap().messages.insert(i as u32 + 1, (Some(s.to_string()), false));
            }
            store
        }

        fn seen(&self, uid: u32) -> bool {
            self.0.lock().unwrap().messages[&uid].1
        }
    }

    #[async_trait]
    impl MailStore for MemoryStore {
        async fn open(&self) -> anyhow::Result<Box<dyn MailSession>> {
            if self.0.lock().unwrap().offline {
                anyhow::bail!("connection refused");
            }
            Ok(Box::new(self.clone()))
        }
    }

    #[async_trait]
    impl MailSession for MemoryStore {
        async fn fetch_unseen(&mut self) -> anyhow::Result<Vec<Envelope>> {
            Ok(self
                .0
                .lock()
                .unwrap()
                .messages
                .iter()
                .filter(|(_, (_, seen))| !seen)
                .map(|(&uid, (subject, _))| Envelope { uid, subject: subject.clone() })
                .collect())
        }

        async fn mark_seen(&mut self, uid: u32) -> anyhow::Result<()> {
            if let Some(msg) = self.0.lock().unwrap().messages.get_mut(&uid) {
                msg.1 = true;
            }
            Ok(())
        }

        async fn close(self: Box<Self>) -> anyhow::Result<()> {
            self.0.lock().unwrap().closed += 1;
            Ok(())
        }
    }

    fn poller(store: &MemoryStore, pin: Option<&str>, mock: &Arc<MockExchange>) -> MailboxPoller {
        let registry = ExchangeRegistry::from_exchanges([mock.clone() as Arc<dyn Exchange>]);
        let processor = SignalProcessor::new(
            SignalValidator::new(pin.map(str::to_string)),
            Arc::new(registry),
        );
        MailboxPoller::new(Arc::new(store.clone()), processor, "Alert:", Duration::from_secs(15))
    }

    const SIGNAL: &str = r#"Alert: {"EXCHANGE":"binance","SYMBOL":"BTC/USDT","SIDE":"buy","ORDER_TYPE":"market","QUANTITY":"0.01","PIN":"1234"}"#;

    #[tokio::test]
    async fn signal_is_executed_and_marked_read() {
        let store = MemoryStore::with(&[SIGNAL, "Weekly newsletter"]);
        let mock = Arc::new(MockExchange::new("binance"));

        let report = poller(&store, Some("1234"), &mock).poll_once().await.unwrap();

        assert_eq!(
            report,
            PollReport { seen: 2, processed: 1, skipped: 1, rejected: 0, errors: 0 }
        );
        assert_eq!(
            mock.orders_placed(),
            vec![MockCall::MarketOrder { symbol: "BTC/USDT".into(), side: Side::Buy, quantity: 0.01 }]
        );
        assert!(store.seen(1));
        assert!(!store.seen(2));
        assert_eq!(store.0.lock().unwrap().closed, 1);
    }

    #[tokio::test]
    async fn wrong_pin_is_marked_read_without_orders() {
        let store = MemoryStore::with(&[SIGNAL]);
        let mock = Arc::new(MockExchange::new("binance"));

        let report = poller(&store, Some("0000"), &mock).poll_once().await.unwrap();

        assert_eq!(report.rejected, 1);
        assert!(store.seen(1));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn unparsable_payload_stays_unread() {
        let store = MemoryStore::with(&["Alert: {\"EXCHANGE\": \"binance\""]);
        let mock = Arc::new(MockExchange::new("binance"));
        let poller = poller(&store, None, &mock);

        let report = poller.poll_once().await.unwrap();
        assert_eq!(report.errors, 1);
        assert!(!store.seen(1));

        // Still there on the next cycle.
        assert_eq!(poller.poll_once().await.unwrap().seen, 1);
    }

    #[tokio::test]
    async fn message_without_subject_is_skipped() {
        let store = MemoryStore::default();
        store.0.lock().unwrap().messages.insert(7, (None, false));
        let mock = Arc::new(MockExchange::new("binance"));

        let report = poller(&store, None, &mock).poll_once().await.unwrap();
        assert_eq!(report.skipped, 1);
        assert!(!store.seen(7));
    }

    #[tokio::test]
    async fn unreachable_store_fails_the_cycle() {
        let store = MemoryStore::with(&[SIGNAL]);
        store.0.lock().unwrap().offline = true;
        let mock = Arc::new(MockExchange::new("binance"));

        assert!(poller(&store, None, &mock).poll_once().await.is_err());
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn processed_messages_are_not_seen_again() {
        let store = MemoryStore::with(&[SIGNAL]);
        let mock = Arc::new(MockExchange::new("binance"));
        let poller = poller(&store, None, &mock);

        poller.poll_once().await.unwrap();
        let second = poller.poll_once().await.unwrap();
        assert_eq!(second, PollReport::default());
        assert_eq!(mock.orders_placed().len(), 1);
    }

    #[tokio::test]
    async fn aborted_execution_is_counted_and_marked_read() {
        let store = MemoryStore::with(&[SIGNAL]);
        let mock = Arc::new(MockExchange::new("binance").panicking(MockOp::CreateOrder));

        let report = poller(&store, None, &mock).poll_once().await.unwrap();
        assert_eq!(report, PollReport { seen: 1, errors: 1, ..PollReport::default() });
        assert!(store.seen(1));
    }

    #[tokio::test]
    async fn polling_survives_a_panicking_exchange() {
        let store = MemoryStore::with(&[SIGNAL]);
        let mock = Arc::new(MockExchange::new("binance").panicking(MockOp::CreateOrder));
        let mut poller = poller(&store, None, &mock);
        poller.interval = Duration::from_millis(20);
        let task = tokio::spawn(poller.run());

        let wait_seen = |uid: u32| {
            let store = store.clone();
            tokio::time::timeout(Duration::from_secs(5), async move {
                while !store.0.lock().unwrap().messages.get(&uid).is_some_and(|m| m.1) {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
        };

        wait_seen(1).await.expect("first signal handled");
        mock.clear_failure(MockOp::CreateOrder);
        store.0.lock().unwrap().messages.insert(2, (Some(SIGNAL.to_string()), false));

        wait_seen(2).await.expect("poller still running");
        assert!(!task.is_finished());
        assert_eq!(mock.order_count(), 1);
        assert_eq!(mock.orders_placed().len(), 2);
        task.abort();
    }
}
