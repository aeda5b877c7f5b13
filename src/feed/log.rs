//! Bounded, observable log of change events

use super::types::ChangeEvent;
use crate::error::{ApiError, Result};
use crate::store::{SubscribableStore, Subscription};

/// Default number of events retained, matching the admin feed view
pub const DEFAULT_CAPACITY: usize = 200;

/// Insertion-ordered event log with FIFO eviction
///
/// Subscribers always receive the whole ordered snapshot, never a delta.
/// The log never grows past its capacity: appending while full evicts the
/// oldest event first. Cheap to clone; clones share the same log.
#[derive(Clone)]
pub struct ChangeEventLog {
    store: SubscribableStore<Vec<ChangeEvent>>,
    capacity: usize,
}

impl ChangeEventLog {
    /// Create a log retaining at most `capacity` events.
    /// Zero capacity is a configuration error.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ApiError::Config(
                "event log capacity must be a positive integer".into(),
            ));
        }
        Ok(Self {
            store: SubscribableStore::new(Vec::new()),
            capacity,
        })
    }

    /// Append an event, evicting the oldest if the log is full, and publish
    /// the new snapshot to all subscribers.
    pub fn append(&self, event: ChangeEvent) {
        self.store.update(|events| {
            if events.len() >= self.capacity {
                let overflow = events.len() + 1 - self.capacity;
                events.drain(..overflow);
            }
            events.push(event);
        });
    }

    /// Drop all retained events and publish the empty snapshot.
    pub fn clear(&self) {
        self.store.update(|events| events.clear());
    }

    /// Copy of the current snapshot, oldest first.
    pub fn snapshot(&self) -> Vec<ChangeEvent> {
        self.store.get()
    }

    pub fn len(&self) -> usize {
        self.store.get().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.get().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Observe every published snapshot.
    pub fn subscribe(
        &self,
        listener: impl FnMut(&Vec<ChangeEvent>) + Send + 'static,
    ) -> Subscription {
        self.store.subscribe(listener)
    }

    /// The backing store, for callers that pass observable state around.
    pub fn store(&self) -> &SubscribableStore<Vec<ChangeEvent>> {
        &self.store
    }
}

impl Default for ChangeEventLog {
    fn default() -> Self {
        Self {
            store: SubscribableStore::new(Vec::new()),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl std::fmt::Debug for ChangeEventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeEventLog")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

// ======================================================================
// Tests
// ======================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::types::ChangeKind;
    use std::sync::{Arc, Mutex};

    fn event(table: &str, timestamp: i64) -> ChangeEvent {
        ChangeEvent::new(ChangeKind::Insert, table, timestamp)
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = ChangeEventLog::new(0).unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[test]
    fn test_append_within_capacity_keeps_all() {
        let log = ChangeEventLog::new(5).unwrap();
        for n in 0..3 {
            log.append(event("users", n));
        }
        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(
            snapshot.iter().map(|e| e.timestamp).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_append_beyond_capacity_evicts_oldest_first() {
        let log = ChangeEventLog::new(3).unwrap();
        for n in 0..7 {
            log.append(event("users", n));
        }
        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), 3);
        // Exactly the last three, still in insertion order
        assert_eq!(
            snapshot.iter().map(|e| e.timestamp).collect::<Vec<_>>(),
            vec![4, 5, 6]
        );
    }

    #[test]
    fn test_len_never_exceeds_capacity() {
        let log = ChangeEventLog::new(4).unwrap();
        for n in 0..100 {
            log.append(event("orders", n));
            assert!(log.len() <= 4);
        }
        assert_eq!(log.len(), 4);
    }

    #[test]
    fn test_long_runs_keep_exactly_the_newest() {
        let log = ChangeEventLog::new(7).unwrap();
        for n in 0..500 {
            log.append(event("metrics", n));
        }
        assert_eq!(
            log.snapshot().iter().map(|e| e.timestamp).collect::<Vec<_>>(),
            (493..500).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_subscribers_receive_full_snapshots() {
        let log = ChangeEventLog::new(10).unwrap();
        let seen: Arc<Mutex<Vec<Vec<i64>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = log.subscribe(move |events| {
            sink.lock()
                .unwrap()
                .push(events.iter().map(|e| e.timestamp).collect());
        });

        log.append(event("users", 1));
        log.append(event("users", 2));

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![vec![1], vec![1, 2]]);
    }

    #[test]
    fn test_clear_resets_and_republishes() {
        let log = ChangeEventLog::new(10).unwrap();
        log.append(event("users", 1));
        log.append(event("users", 2));

        let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = log.subscribe(move |events| sink.lock().unwrap().push(events.len()));

        log.clear();

        assert!(log.is_empty());
        // Subscribers observed the empty snapshot
        assert_eq!(*seen.lock().unwrap(), vec![0]);
    }

    #[test]
    fn test_default_uses_standard_capacity() {
        let log = ChangeEventLog::default();
        assert_eq!(log.capacity(), DEFAULT_CAPACITY);
        assert!(log.is_empty());
    }

    #[test]
    fn test_debug_reports_len_and_capacity() {
        let log = ChangeEventLog::new(3).unwrap();
        log.append(event("users", 1));
        assert_eq!(
            format!("{:?}", log),
            "ChangeEventLog { len: 1, capacity: 3 }"
        );
    }

    #[test]
    fn test_clones_share_the_log() {
        let log = ChangeEventLog::new(5).unwrap();
        let writer = log.clone();
        writer.append(event("users", 1));
        assert_eq!(log.len(), 1);
    }
}
