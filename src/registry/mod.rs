//! Correlation of venue-assigned operation ids with out-of-band
//! notifications.
//!
//! The gateway registers a waiter synchronously after a successful
//! placement, before the operation id is ever returned upward, so a
//! resolve can never precede its registration. A resolve with no matching
//! waiter is a silent no-op: the notification either raced past a sweep
//! or belongs to an order placed outside the benchmark.

use crate::types::NotificationEvent;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

struct PendingEntry {
    tx: oneshot::Sender<NotificationEvent>,
    deadline: Instant,
    registered_at: Instant,
}

/// Registry of operations awaiting an asynchronous fill/cancel event
#[derive(Default)]
pub struct PendingOperationRegistry {
    entries: Mutex<HashMap<String, PendingEntry>>,
}

impl PendingOperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store one waiter for `operation_id` and hand back its receiver.
    /// A live entry under the same id is replaced; its old waiter
    /// observes this as a timeout.
    pub fn register(
        &self,
        operation_id: &str,
        deadline: Instant,
    ) -> oneshot::Receiver<NotificationEvent> {
        let (tx, rx) = oneshot::channel();
        let entry = PendingEntry {
            tx,
            deadline,
            registered_at: Instant::now(),
        };
        let mut entries = self.entries.lock();
        if entries.insert(operation_id.to_string(), entry).is_some() {
            warn!("replaced stale waiter for operation {}", operation_id);
        }
        rx
    }

    /// Deliver `event` to the waiter for its operation id, if one exists
    pub fn resolve(&self, event: NotificationEvent) {
        let entry = self.entries.lock().remove(&event.operation_id);
        match entry {
            Some(entry) => {
                // Receiver may already have been dropped by a timed-out
                // awaiter; that is not an error.
                let _ = entry.tx.send(event);
            }
            None => debug!(
                "no waiter for operation {}, dropping notification",
                event.operation_id
            ),
        }
    }

    /// Drop the waiter for `operation_id` without invoking it
    pub fn remove(&self, operation_id: &str) -> bool {
        self.entries.lock().remove(operation_id).is_some()
    }

    /// Remove and report all entries whose deadline has elapsed. Waiters
    /// are not invoked; their owners observe the timeout through their
    /// own awaited deadline.
    pub fn sweep(&self, now: Instant) -> Vec<String> {
        let mut entries = self.entries.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            entries.remove(id);
        }
        expired
    }

    /// Remove and report all entries registered more than `max_age` ago,
    /// regardless of their deadline. Waiters are not invoked.
    pub fn sweep_older_than(&self, now: Instant, max_age: std::time::Duration) -> Vec<String> {
        let mut entries = self.entries.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| now.duration_since(e.registered_at) > max_age)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            entries.remove(id);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    fn event(id: &str) -> NotificationEvent {
        NotificationEvent {
            operation_id: id.to_string(),
            event_time: Utc::now(),
            received_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_register_then_resolve_delivers_once() {
        let registry = PendingOperationRegistry::new();
        let rx = registry.register("42", Instant::now() + Duration::from_secs(5));

        registry.resolve(event("42"));

        let delivered = rx.await.unwrap();
        assert_eq!(delivered.operation_id, "42");
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_unregistered_is_noop() {
        let registry = PendingOperationRegistry::new();
        registry.resolve(event("missing"));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_consumes_waiter() {
        let registry = PendingOperationRegistry::new();
        let _rx = registry.register("7", Instant::now() + Duration::from_secs(5));
        registry.resolve(event("7"));
        // Second resolve for the same id finds nothing
        registry.resolve(event("7"));
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn test_remove_drops_without_invoking() {
        let registry = PendingOperationRegistry::new();
        let rx = registry.register("9", Instant::now() + Duration::from_secs(5));

        assert!(registry.remove("9"));
        assert!(!registry.remove("9"));
        assert!(rx.await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_expired() {
        let registry = PendingOperationRegistry::new();
        let now = Instant::now();
        let _early = registry.register("old", now + Duration::from_millis(10));
        let _late = registry.register("new", now + Duration::from_secs(60));

        tokio::time::advance(Duration::from_millis(20)).await;
        let swept = registry.sweep(Instant::now());

        assert_eq!(swept, vec!["old".to_string()]);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_older_than_ignores_deadline() {
        let registry = PendingOperationRegistry::new();
        let _rx = registry.register("aged", Instant::now() + Duration::from_secs(3600));

        tokio::time::advance(Duration::from_secs(10)).await;
        let swept = registry.sweep_older_than(Instant::now(), Duration::from_secs(5));

        assert_eq!(swept, vec!["aged".to_string()]);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_reregister_replaces_waiter() {
        let registry = PendingOperationRegistry::new();
        let stale = registry.register("dup", Instant::now() + Duration::from_secs(5));
        let fresh = registry.register("dup", Instant::now() + Duration::from_secs(5));

        registry.resolve(event("dup"));

        assert!(stale.await.is_err());
        assert_eq!(fresh.await.unwrap().operation_id, "dup");
    }
}
