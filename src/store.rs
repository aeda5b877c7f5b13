//! Observable value containers backing the console's reactive state

use std::sync::{Arc, Mutex, PoisonError, Weak};

type Listener<T> = Box<dyn FnMut(&T) + Send>;

struct StoreInner<T> {
    value: T,
    listeners: Vec<(u64, Listener<T>)>,
    next_id: u64,
}

impl<T> StoreInner<T> {
    fn notify(&mut self) {
        let StoreInner {
            value, listeners, ..
        } = self;
        for (_, listener) in listeners.iter_mut() {
            listener(value);
        }
    }
}

/// Observable container for a single value.
///
/// `set` swaps the value and invokes every listener synchronously, all under
/// one lock, so observers always see writes in order and never miss one.
/// Listeners run inside that critical section and must not call back into
/// the store they observe; they receive the new value as an argument.
pub struct SubscribableStore<T> {
    inner: Arc<Mutex<StoreInner<T>>>,
}

impl<T> Clone for SubscribableStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Default> Default for SubscribableStore<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> SubscribableStore<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                value,
                listeners: Vec::new(),
                next_id: 0,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner<T>> {
        // A panicked listener must not wedge every later set()
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the value and notify all listeners with the new value.
    pub fn set(&self, value: T) {
        self.update(|current| *current = value);
    }

    /// Mutate the value in place, then notify all listeners.
    ///
    /// The mutation and the notifications form one critical section, so
    /// read-modify-write cycles cannot interleave across threads.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut inner = self.lock();
        let out = f(&mut inner.value);
        inner.notify();
        out
    }

    /// Register a listener invoked on every subsequent change (no replay of
    /// the current value). Dropping the returned guard unsubscribes.
    pub fn subscribe(&self, listener: impl FnMut(&T) + Send + 'static) -> Subscription
    where
        T: Send + 'static,
    {
        let id = {
            let mut inner = self.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push((id, Box::new(listener)));
            id
        };
        let handle = Arc::downgrade(&self.inner);
        Subscription {
            cancel: Some(Box::new(move || remove_listener(&handle, id))),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().listeners.len()
    }
}

impl<T: Clone> SubscribableStore<T> {
    /// Current value.
    pub fn get(&self) -> T {
        self.lock().value.clone()
    }
}

impl<T: PartialEq> SubscribableStore<T> {
    /// Set and notify only when the new value differs from the current one.
    /// Returns whether a change was published.
    pub fn set_if_changed(&self, value: T) -> bool {
        let mut inner = self.lock();
        if inner.value == value {
            return false;
        }
        inner.value = value;
        inner.notify();
        true
    }
}

fn remove_listener<T>(store: &Weak<Mutex<StoreInner<T>>>, id: u64) {
    if let Some(inner) = store.upgrade() {
        let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.listeners.retain(|(listener_id, _)| *listener_id != id);
    }
}

/// Guard for an active subscription.
///
/// Unsubscribes when dropped. `unsubscribe` may be called any number of
/// times; only the first has an effect. A listener is never invoked again
/// once its guard has unsubscribed.
#[must_use = "dropping the guard unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Remove the listener now. Idempotent.
    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Keep the listener registered for the lifetime of the store.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

// ======================================================================
// Tests
// ======================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn collector<T: Clone + Send + 'static>(
        store: &SubscribableStore<T>,
    ) -> (Arc<Mutex<Vec<T>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = store.subscribe(move |value: &T| {
            sink.lock().unwrap().push(value.clone());
        });
        (seen, sub)
    }

    #[test]
    fn test_get_returns_current_value() {
        let store = SubscribableStore::new(41);
        assert_eq!(store.get(), 41);
        store.set(42);
        assert_eq!(store.get(), 42);
    }

    #[test]
    fn test_subscribe_sees_every_set_in_order() {
        let store = SubscribableStore::new(0);
        let (seen, _sub) = collector(&store);

        store.set(1);
        store.set(2);
        store.set(3);

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_subscribe_does_not_replay_current_value() {
        let store = SubscribableStore::new(7);
        let (seen, _sub) = collector(&store);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_notification_is_synchronous() {
        let store = SubscribableStore::new(0);
        let (seen, _sub) = collector(&store);
        store.set(5);
        // Listener already ran by the time set() returned
        assert_eq!(*seen.lock().unwrap(), vec![5]);
    }

    #[test]
    fn test_multi_listeners_all_notified() {
        let store = SubscribableStore::new(String::new());
        let (seen1, _s1) = collector(&store);
        let (seen2, _s2) = collector(&store);
        let (seen3, _s3) = collector(&store);
        assert_eq!(store.subscriber_count(), 3);

        store.set("hello".to_string());

        assert_eq!(*seen1.lock().unwrap(), vec!["hello".to_string()]);
        assert_eq!(*seen2.lock().unwrap(), vec!["hello".to_string()]);
        assert_eq!(*seen3.lock().unwrap(), vec!["hello".to_string()]);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let store = SubscribableStore::new(0);
        let (seen, mut sub) = collector(&store);

        store.set(1);
        sub.unsubscribe();
        store.set(2);
        store.set(3);

        assert_eq!(*seen.lock().unwrap(), vec![1]);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_unsubscribe_twice_is_noop() {
        let store = SubscribableStore::new(0);
        let (_seen, mut sub) = collector(&store);
        let (seen2, _other) = collector(&store);

        sub.unsubscribe();
        sub.unsubscribe();

        // The other listener is untouched
        store.set(9);
        assert_eq!(*seen2.lock().unwrap(), vec![9]);
        assert_eq!(store.subscriber_count(), 1);
    }

    #[test]
    fn test_drop_guard_unsubscribes() {
        let store = SubscribableStore::new(0);
        let (seen, sub) = collector(&store);
        drop(sub);
        store.set(1);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_detach_keeps_listener_registered() {
        let store = SubscribableStore::new(0);
        let (seen, sub) = collector(&store);
        sub.detach();
        store.set(4);
        assert_eq!(*seen.lock().unwrap(), vec![4]);
        assert_eq!(store.subscriber_count(), 1);
    }

    #[test]
    fn test_set_if_changed_publishes_only_on_change() {
        let store = SubscribableStore::new(false);
        let (seen, _sub) = collector(&store);

        assert!(store.set_if_changed(true));
        assert!(!store.set_if_changed(true));
        assert!(!store.set_if_changed(true));
        assert!(store.set_if_changed(false));

        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn test_update_mutates_in_place_and_notifies() {
        let store = SubscribableStore::new(vec![1, 2]);
        let (seen, _sub) = collector(&store);

        let len = store.update(|v| {
            v.push(3);
            v.len()
        });

        assert_eq!(len, 3);
        assert_eq!(*seen.lock().unwrap(), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn test_clone_shares_state() {
        let store = SubscribableStore::new(0);
        let store2 = store.clone();
        let (seen, _sub) = collector(&store);

        store2.set(11);

        assert_eq!(store.get(), 11);
        assert_eq!(*seen.lock().unwrap(), vec![11]);
    }

    #[test]
    fn test_set_from_another_thread_is_observed() {
        let store = SubscribableStore::new(0);
        let (seen, _sub) = collector(&store);

        let writer = store.clone();
        let handle = std::thread::spawn(move || {
            for n in 1..=10 {
                writer.set(n);
            }
        });
        handle.join().unwrap();

        assert_eq!(*seen.lock().unwrap(), (1..=10).collect::<Vec<_>>());
        assert_eq!(store.get(), 10);
    }

    #[test]
    fn test_unsubscribe_silences_writer_threads() {
        let store = SubscribableStore::new(0);
        let (seen, mut sub) = collector(&store);

        let writer = store.clone();
        std::thread::spawn(move || {
            for n in 1..=5 {
                writer.set(n);
            }
        })
        .join()
        .unwrap();

        sub.unsubscribe();

        let writer = store.clone();
        std::thread::spawn(move || {
            for n in 6..=10 {
                writer.set(n);
            }
        })
        .join()
        .unwrap();

        // Writes keep landing, the listener just no longer hears them
        assert_eq!(store.get(), 10);
        assert_eq!(*seen.lock().unwrap(), (1..=5).collect::<Vec<_>>());
    }
}
