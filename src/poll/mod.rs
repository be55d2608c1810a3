//! Periodic refresh of the read-only notification and log views.
//!
//! Fetches run on a fixed interval and may overlap. Results go through a
//! [`Sequenced`] slot, so the view always shows the newest request's answer
//! even when responses arrive out of order.

mod sequenced;

pub use sequenced::*;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::transport::{
    ConfigTransport, LogRecord, NotificationQuery, NotificationRecord, TransportError,
};

/// Default refresh interval for read-only views.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 20;

/// Which read-only view to refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Notifications(NotificationQuery),
    Logs { level: Option<String> },
}

/// One refresh result, replacing the previous one wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    Notifications(Vec<NotificationRecord>),
    Logs(Vec<LogRecord>),
}

impl Snapshot {
    pub fn len(&self) -> usize {
        match self {
            Self::Notifications(records) => records.len(),
            Self::Logs(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fetch `view` once.
pub async fn fetch_view<T: ConfigTransport + ?Sized>(
    transport: &T,
    view: &View,
) -> Result<Snapshot, TransportError> {
    match view {
        View::Notifications(query) => transport
            .notifications(query)
            .await
            .map(Snapshot::Notifications),
        View::Logs { level } => transport.logs(level.as_deref()).await.map(Snapshot::Logs),
    }
}

pub struct Poller<T: ConfigTransport + 'static> {
    transport: Arc<T>,
    view: View,
    interval: Duration,
    slot: Arc<Sequenced<Snapshot>>,
    running: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
}

impl<T: ConfigTransport + 'static> Poller<T> {
    pub fn new(transport: Arc<T>, view: View, interval: Duration) -> Self {
        Self {
            transport,
            view,
            interval,
            slot: Arc::new(Sequenced::new()),
            running: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The slot refreshed results land in.
    pub fn slot(&self) -> Arc<Sequenced<Snapshot>> {
        self.slot.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Fetch once and offer the result. Returns whether it was applied.
    pub async fn poll_once(&self) -> Result<bool, TransportError> {
        let ticket = self.slot.issue();
        let snapshot = fetch_view(self.transport.as_ref(), &self.view).await?;
        Ok(self.slot.offer(ticket, snapshot))
    }

    /// Start polling. The first fetch happens immediately; each later tick
    /// starts a new fetch without waiting for earlier ones.
    ///
    /// Returns `None` if the poller is already running.
    pub fn start(&self) -> Option<tokio::task::JoinHandle<()>> {
        if self.running.swap(true, Ordering::AcqRel) {
            debug!("Poller already running");
            return None;
        }
        // A loop left over from before a stop exits instead of resuming.
        let mine = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let generation = self.generation.clone();
        let running = self.running.clone();
        let transport = self.transport.clone();
        let view = self.view.clone();
        let slot = self.slot.clone();
        let interval = self.interval;

        let current = move || {
            running.load(Ordering::Acquire) && generation.load(Ordering::Acquire) == mine
        };

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            while current() {
                ticker.tick().await;
                if !current() {
                    break;
                }
                let ticket = slot.issue();
                let transport = transport.clone();
                let view = view.clone();
                let slot = slot.clone();
                tokio::spawn(async move {
                    match fetch_view(transport.as_ref(), &view).await {
                        Ok(snapshot) => {
                            let count = snapshot.len();
                            if slot.offer(ticket, snapshot) {
                                debug!("Poll {} applied ({} records)", ticket, count);
                            }
                        }
                        Err(e) => warn!("Poll {} failed: {}", ticket, e),
                    }
                });
            }
        }))
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ConfigDocument;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Backend whose log responses take a scripted time to arrive.
    struct SlowLogs {
        delays_ms: Mutex<Vec<u64>>,
        calls: Mutex<u64>,
    }

    #[async_trait]
    impl ConfigTransport for SlowLogs {
        async fn load_config(&self) -> Result<ConfigDocument, TransportError> {
            Ok(ConfigDocument::default())
        }

        async fn save_config(&self, _doc: &ConfigDocument) -> Result<(), TransportError> {
            Ok(())
        }

        async fn notifications(
            &self,
            _query: &NotificationQuery,
        ) -> Result<Vec<NotificationRecord>, TransportError> {
            Ok(vec![NotificationRecord::default()])
        }

        async fn logs(&self, _level: Option<&str>) -> Result<Vec<LogRecord>, TransportError> {
            let (call, delay) = {
                let mut calls = self.calls.lock();
                *calls += 1;
                let delay = self.delays_ms.lock().remove(0);
                (*calls, delay)
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(vec![
                LogRecord {
                    message: format!("call {call}"),
                    ..LogRecord::default()
                };
                call as usize
            ])
        }
    }

    fn poller(delays_ms: Vec<u64>) -> Poller<SlowLogs> {
        let backend = SlowLogs {
            delays_ms: Mutex::new(delays_ms),
            calls: Mutex::new(0),
        };
        Poller::new(
            Arc::new(backend),
            View::Logs { level: None },
            Duration::from_millis(10),
        )
    }

    #[tokio::test]
    async fn slow_first_response_does_not_win() {
        let poller = poller(vec![80, 5]);
        let (first, second) = tokio::join!(poller.poll_once(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            poller.poll_once().await
        });

        // The second request resolves first and is applied; the first one
        // arrives late and is dropped.
        assert!(second.unwrap());
        assert!(!first.unwrap());
        assert_eq!(poller.slot().latest().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn notifications_view() {
        let poller = Poller::new(
            Arc::new(SlowLogs {
                delays_ms: Mutex::new(Vec::new()),
                calls: Mutex::new(0),
            }),
            View::Notifications(NotificationQuery::default()),
            Duration::from_secs(1),
        );
        assert!(poller.poll_once().await.unwrap());
        assert!(matches!(
            poller.slot().latest(),
            Some(Snapshot::Notifications(ref n)) if n.len() == 1
        ));
    }

    #[tokio::test]
    async fn started_poller_fills_slot_and_stops() {
        let poller = poller(vec![0; 64]);
        let handle = poller.start().unwrap();
        assert!(poller.is_running());

        let snapshot = poller.slot().changed().await;
        assert!(snapshot.is_some_and(|s| !s.is_empty()));

        poller.stop();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(!poller.is_running());
    }

    #[tokio::test]
    async fn second_start_is_a_noop() {
        let poller = poller(vec![0; 64]);
        let handle = poller.start().unwrap();
        assert!(poller.start().is_none());

        poller.stop();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();

        // Stopped pollers can be started again.
        let again = poller.start().unwrap();
        poller.stop();
        tokio::time::timeout(Duration::from_secs(1), again)
            .await
            .unwrap()
            .unwrap();
    }
}
