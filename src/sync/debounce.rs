use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::Revision;

/// Quiet period before buffered text is parsed.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Waits out bursts of keystrokes.
///
/// Each keystroke calls [`Debouncer::note`] with the buffer's new revision
/// and then awaits [`Debouncer::settled`]; only the call for the newest
/// revision resolves to `true`.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    latest: Arc<AtomicU64>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            latest: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn note(&self, revision: Revision) {
        self.latest.fetch_max(revision, Ordering::SeqCst);
    }

    /// Sleep for the quiet period, then report whether `revision` is still
    /// the newest one noted.
    pub async fn settled(&self, revision: Revision) -> bool {
        tokio::time::sleep(self.delay).await;
        self.latest.load(Ordering::SeqCst) == revision
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_DEBOUNCE_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ConfigDocument;
    use crate::sync::{Destinations, Synchronizer};

    #[tokio::test]
    async fn only_latest_revision_settles() {
        let debouncer = Debouncer::new(Duration::from_millis(10));
        debouncer.note(1);
        debouncer.note(2);

        let (first, second) = tokio::join!(debouncer.settled(1), debouncer.settled(2));
        assert!(!first);
        assert!(second);
    }

    #[tokio::test]
    async fn late_note_supersedes_pending_wait() {
        let debouncer = Debouncer::new(Duration::from_millis(50));
        debouncer.note(1);
        let waiter = {
            let debouncer = debouncer.clone();
            tokio::spawn(async move { debouncer.settled(1).await })
        };
        debouncer.note(2);
        assert!(!waiter.await.unwrap());
    }

    #[tokio::test]
    async fn drives_synchronizer_commits() {
        let doc = ConfigDocument::default();
        let mut sync = Synchronizer::new(Destinations, &doc);
        let debouncer = Debouncer::new(Duration::from_millis(5));

        let first = sync.stage("- name: a");
        debouncer.note(first);
        let second = sync.stage("- name: a\n  url: x\n");
        debouncer.note(second);

        let (first_settled, second_settled) =
            tokio::join!(debouncer.settled(first), debouncer.settled(second));
        assert!(!first_settled);
        assert!(second_settled);

        let doc = sync.commit(second, &doc).unwrap().unwrap();
        assert_eq!(doc.destinations[0].url, "x");
    }
}
