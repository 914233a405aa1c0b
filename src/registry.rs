use std::{
    fmt, mem,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::Subscription;

/// All live subscriptions created by one probe.
///
/// Adapters register on `on_subscribe` and unregister when their stream
/// terminates; the probe drives bulk cancellation and attachment counting
/// through here. Safe under concurrent access from any number of delivery
/// tasks without caller-side locking.
#[derive(Default)]
pub struct SubscriptionRegistry {
    subscriptions: Mutex<Vec<Arc<dyn Subscription>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a live subscription.
    pub fn register(&self, subscription: Arc<dyn Subscription>) {
        self.lock().push(subscription);
    }

    /// Stop tracking a subscription, matched by handle identity.
    ///
    /// At most one entry is removed; unknown handles are ignored, so an
    /// adapter whose stream errors and then completes unregisters once and
    /// the second attempt is a no-op.
    pub fn unregister(&self, subscription: &Arc<dyn Subscription>) {
        let mut subscriptions = self.lock();
        if let Some(position) = subscriptions
            .iter()
            .position(|held| Arc::ptr_eq(held, subscription))
        {
            subscriptions.remove(position);
        }
    }

    /// Cancel every currently tracked subscription, exactly once each.
    ///
    /// Swaps the live collection for an empty one under the lock, then
    /// cancels the snapshot outside it. A registration racing this call
    /// either lands in the fresh collection (untouched) or made the
    /// snapshot (cancelled exactly once); no handle is ever cancelled
    /// twice by this path or leaked. Idempotent.
    pub fn cancel_all(&self) {
        let snapshot = mem::take(&mut *self.lock());
        if snapshot.is_empty() {
            return;
        }
        tracing::debug!(count = snapshot.len(), "cancelling all subscriptions");
        for subscription in &snapshot {
            subscription.cancel();
        }
    }

    /// Number of currently tracked subscriptions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<dyn Subscription>>> {
        self.subscriptions
            .lock()
            .expect("subscription registry lock poisoned")
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Barrier,
    };

    #[derive(Default)]
    struct CountingSubscription {
        requested: AtomicUsize,
        cancelled: AtomicUsize,
    }

    impl Subscription for CountingSubscription {
        fn request(&self, n: u64) {
            self.requested.fetch_add(n as usize, Ordering::SeqCst);
        }

        fn cancel(&self) {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting() -> (Arc<CountingSubscription>, Arc<dyn Subscription>) {
        let concrete = Arc::new(CountingSubscription::default());
        let erased = Arc::clone(&concrete) as Arc<dyn Subscription>;
        (concrete, erased)
    }

    #[test]
    fn register_and_len() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.is_empty());

        let (_, a) = counting();
        let (_, b) = counting();
        registry.register(a);
        registry.register(b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn unregister_removes_exactly_one_entry() {
        let registry = SubscriptionRegistry::new();
        let (_, a) = counting();
        registry.register(Arc::clone(&a));
        registry.register(Arc::clone(&a));
        assert_eq!(registry.len(), 2);

        registry.unregister(&a);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unregister_of_unknown_handle_is_ignored() {
        let registry = SubscriptionRegistry::new();
        let (_, known) = counting();
        let (_, stranger) = counting();
        registry.register(known);

        registry.unregister(&stranger);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn cancel_all_cancels_each_exactly_once() {
        let registry = SubscriptionRegistry::new();
        let held: Vec<_> = (0..3)
            .map(|_| {
                let (concrete, erased) = counting();
                registry.register(erased);
                concrete
            })
            .collect();

        registry.cancel_all();

        assert_eq!(registry.len(), 0);
        for subscription in &held {
            assert_eq!(subscription.cancelled.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn cancel_all_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        let (concrete, erased) = counting();
        registry.register(erased);

        registry.cancel_all();
        registry.cancel_all();

        assert_eq!(concrete.cancelled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn registrations_after_cancel_all_survive() {
        let registry = SubscriptionRegistry::new();
        let (earlier, erased) = counting();
        registry.register(erased);
        registry.cancel_all();

        let (later, erased) = counting();
        registry.register(erased);

        assert_eq!(registry.len(), 1);
        assert_eq!(earlier.cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(later.cancelled.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancel_all_racing_registration_cancels_each_at_most_once() {
        const REGISTRARS: usize = 4;

        for _ in 0..200 {
            let registry = Arc::new(SubscriptionRegistry::new());
            let subscriptions: Vec<_> = (0..REGISTRARS)
                .map(|_| Arc::new(CountingSubscription::default()))
                .collect();

            let barrier = Arc::new(Barrier::new(REGISTRARS + 1));
            let registrars: Vec<_> = subscriptions
                .iter()
                .map(|subscription| {
                    let registry = Arc::clone(&registry);
                    let subscription = Arc::clone(subscription);
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        barrier.wait();
                        registry.register(subscription);
                    })
                })
                .collect();
            let sweeper = {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    registry.cancel_all();
                })
            };
            for thread in registrars {
                thread.join().unwrap();
            }
            sweeper.join().unwrap();

            // Whatever registered after the snapshot is still tracked; a
            // second sweep picks it up. No handle is ever cancelled twice.
            registry.cancel_all();
            assert!(registry.is_empty());
            for subscription in &subscriptions {
                assert_eq!(subscription.cancelled.load(Ordering::SeqCst), 1);
            }
        }
    }
}
