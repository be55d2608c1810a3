use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;
use tracing::debug;

/// Number handed to a request when it is issued; higher is newer.
pub type Ticket = u64;

struct Applied<T> {
    ticket: Ticket,
    value: Option<T>,
}

/// A value slot fed by overlapping requests.
///
/// Each request takes a [`Ticket`] before it starts and offers its result
/// with that ticket when it finishes. A result is kept only if its ticket is
/// newer than the one already applied, so a slow response can never replace
/// a fresher one.
pub struct Sequenced<T> {
    issued: AtomicU64,
    applied: Mutex<Applied<T>>,
    changed: Notify,
}

impl<T: Clone> Sequenced<T> {
    pub fn new() -> Self {
        Self {
            issued: AtomicU64::new(0),
            applied: Mutex::new(Applied {
                ticket: 0,
                value: None,
            }),
            changed: Notify::new(),
        }
    }

    pub fn issue(&self) -> Ticket {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Offer a result. Returns whether it was applied.
    pub fn offer(&self, ticket: Ticket, value: T) -> bool {
        let mut applied = self.applied.lock();
        if ticket <= applied.ticket {
            debug!(
                "Discarding stale response (ticket {} <= {})",
                ticket, applied.ticket
            );
            return false;
        }
        applied.ticket = ticket;
        applied.value = Some(value);
        drop(applied);
        self.changed.notify_one();
        true
    }

    pub fn latest(&self) -> Option<T> {
        self.applied.lock().value.clone()
    }

    pub fn applied_ticket(&self) -> Ticket {
        self.applied.lock().ticket
    }

    /// Wait until a result is applied, then return the newest value. Meant
    /// for a single consumer.
    pub async fn changed(&self) -> Option<T> {
        self.changed.notified().await;
        self.latest()
    }
}

impl<T: Clone> Default for Sequenced<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_order_response_discarded() {
        let slot = Sequenced::new();
        let first = slot.issue();
        let second = slot.issue();

        assert!(slot.offer(second, "fresh"));
        assert!(!slot.offer(first, "stale"));
        assert_eq!(slot.latest(), Some("fresh"));
        assert_eq!(slot.applied_ticket(), second);
    }

    #[test]
    fn in_order_responses_all_apply() {
        let slot = Sequenced::new();
        let a = slot.issue();
        assert!(slot.offer(a, 1));
        let b = slot.issue();
        assert!(slot.offer(b, 2));
        assert_eq!(slot.latest(), Some(2));
    }

    #[test]
    fn empty_slot() {
        let slot: Sequenced<u8> = Sequenced::default();
        assert_eq!(slot.latest(), None);
        assert_eq!(slot.applied_ticket(), 0);
    }

    #[tokio::test]
    async fn changed_wakes_after_offer() {
        let slot = std::sync::Arc::new(Sequenced::new());
        let ticket = slot.issue();
        slot.offer(ticket, "x");
        // The permit from the earlier offer is kept for the next waiter.
        assert_eq!(slot.changed().await, Some("x"));
    }
}
