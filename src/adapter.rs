use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, OnceLock,
    },
};

use tokio::sync::mpsc::UnboundedSender;

use crate::{
    InertSubscription, Message, Payload, Publisher, SignalError, Subscriber, Subscription,
    SubscriptionRegistry, TopicId,
};

/// The demand-tracking subscriber a probe attaches to a channel.
///
/// One adapter per attachment. It keeps exactly one item of demand
/// outstanding: `request(1)` on subscribe, then `request(1)` again after
/// every delivery. A fast publisher can therefore never flood the probe,
/// and the adapter interleaves fairly with other demand-driven consumers
/// on the same upstream.
///
/// The subscription cell is set-once. The first `on_subscribe` wins; any
/// later offer is cancelled on the spot without disturbing the original.
/// Duplicate offers are a protocol violation by the upstream, handled
/// locally and logged, never surfaced as a test failure.
///
/// An adapter is three things at once:
/// - [`Subscriber<Message<T>>`] for channels that carry wrapped messages
/// - [`Subscriber<T>`] for channels that carry bare payloads (wrapped via
///   [`Message::new`] on entry)
/// - [`Publisher<()>`] as an inert pass-through side, so the adapter can
///   stand where a two-sided pipeline stage is expected; downstream
///   parties receive an [`InertSubscription`] and no items, ever.
pub struct ChannelAdapter<T> {
    topic: TopicId,
    queue: UnboundedSender<Message<T>>,
    registry: Arc<SubscriptionRegistry>,
    subscription: OnceLock<Arc<dyn Subscription>>,
    terminated: AtomicBool,
}

impl<T: Payload> ChannelAdapter<T> {
    pub(crate) fn new(
        topic: TopicId,
        queue: UnboundedSender<Message<T>>,
        registry: Arc<SubscriptionRegistry>,
    ) -> Self {
        Self {
            topic,
            queue,
            registry,
            subscription: OnceLock::new(),
            terminated: AtomicBool::new(false),
        }
    }

    /// First subscription wins the cell, is registered, and gets the
    /// initial `request(1)`. Later offers are cancelled, exactly once.
    fn attach(&self, subscription: Arc<dyn Subscription>) {
        if self.subscription.set(Arc::clone(&subscription)).is_err() {
            tracing::warn!(
                topic = %self.topic,
                "duplicate subscription offered to an attached adapter, cancelling it"
            );
            subscription.cancel();
            return;
        }
        tracing::debug!(topic = %self.topic, "subscribed, requesting first item");
        self.registry.register(Arc::clone(&subscription));
        subscription.request(1);
    }

    /// Queue the message, then restore the outstanding demand to one.
    ///
    /// The push happens even for a terminated adapter (the queue is
    /// unbounded and a late push must not crash); only the follow-up
    /// request is suppressed.
    fn deliver(&self, message: Message<T>) {
        if self.queue.send(message).is_err() {
            tracing::warn!(topic = %self.topic, "receive queue gone, dropping delivered message");
        }
        if self.terminated.load(Ordering::Acquire) {
            return;
        }
        if let Some(subscription) = self.subscription.get() {
            subscription.request(1);
        }
    }

    /// Stop demand and drop out of the registry. Safe to hit twice: the
    /// registry removes by identity at most once.
    fn terminate(&self) {
        self.terminated.store(true, Ordering::Release);
        if let Some(subscription) = self.subscription.get() {
            self.registry.unregister(subscription);
        }
    }
}

impl<T: Payload> Subscriber<Message<T>> for ChannelAdapter<T> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        self.attach(subscription);
    }

    fn on_next(&self, item: Message<T>) {
        self.deliver(item);
    }

    fn on_error(&self, error: SignalError) {
        tracing::debug!(topic = %self.topic, error = %error, "upstream failed");
        self.terminate();
    }

    fn on_complete(&self) {
        tracing::trace!(topic = %self.topic, "upstream completed");
        self.terminate();
    }
}

impl<T: Payload> Subscriber<T> for ChannelAdapter<T> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        self.attach(subscription);
    }

    fn on_next(&self, item: T) {
        self.deliver(Message::new(item));
    }

    fn on_error(&self, error: SignalError) {
        Subscriber::<Message<T>>::on_error(self, error);
    }

    fn on_complete(&self) {
        Subscriber::<Message<T>>::on_complete(self);
    }
}

impl<T: Payload> Publisher<()> for ChannelAdapter<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<()>>) {
        subscriber.on_subscribe(Arc::new(InertSubscription));
    }
}

impl<T> fmt::Debug for ChannelAdapter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelAdapter")
            .field("topic", &self.topic)
            .field("attached", &self.subscription.get().is_some())
            .field("terminated", &self.terminated.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Barrier, Mutex,
    };
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    #[derive(Default)]
    struct CountingSubscription {
        requested: AtomicUsize,
        cancelled: AtomicUsize,
    }

    impl CountingSubscription {
        fn requested(&self) -> usize {
            self.requested.load(Ordering::SeqCst)
        }

        fn cancelled(&self) -> usize {
            self.cancelled.load(Ordering::SeqCst)
        }
    }

    impl Subscription for CountingSubscription {
        fn request(&self, n: u64) {
            self.requested.fetch_add(n as usize, Ordering::SeqCst);
        }

        fn cancel(&self) {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Fixture {
        adapter: Arc<ChannelAdapter<&'static str>>,
        registry: Arc<SubscriptionRegistry>,
        received: UnboundedReceiver<Message<&'static str>>,
    }

    impl Fixture {
        /// Both subscriber views live on the adapter, so plain method syntax
        /// is ambiguous; route deliveries through the wrapped view the way a
        /// publisher would.
        fn deliver(&self, message: Message<&'static str>) {
            Subscriber::<Message<&'static str>>::on_next(&*self.adapter, message);
        }
    }

    fn fixture() -> Fixture {
        let (sender, received) = unbounded_channel();
        let registry = Arc::new(SubscriptionRegistry::new());
        let adapter = Arc::new(ChannelAdapter::new(
            TopicId::new("orders"),
            sender,
            Arc::clone(&registry),
        ));
        Fixture {
            adapter,
            registry,
            received,
        }
    }

    fn subscribe(adapter: &ChannelAdapter<&'static str>) -> Arc<CountingSubscription> {
        let subscription = Arc::new(CountingSubscription::default());
        Subscriber::<Message<&'static str>>::on_subscribe(
            adapter,
            Arc::clone(&subscription) as Arc<dyn Subscription>,
        );
        subscription
    }

    #[test]
    fn first_subscription_is_registered_and_primed() {
        let fx = fixture();
        let subscription = subscribe(&fx.adapter);

        assert_eq!(subscription.requested(), 1);
        assert_eq!(subscription.cancelled(), 0);
        assert_eq!(fx.registry.len(), 1);
    }

    #[test]
    fn duplicate_subscription_is_cancelled_once_and_ignored() {
        let fx = fixture();
        let first = subscribe(&fx.adapter);
        let second = subscribe(&fx.adapter);

        assert_eq!(second.cancelled(), 1);
        assert_eq!(second.requested(), 0);
        // The original keeps flowing untouched.
        assert_eq!(first.cancelled(), 0);
        assert_eq!(first.requested(), 1);
        assert_eq!(fx.registry.len(), 1);
    }

    #[test]
    fn racing_subscriptions_resolve_to_one_winner() {
        for _ in 0..50 {
            let fx = fixture();
            let contenders: Vec<_> = (0..2)
                .map(|_| Arc::new(CountingSubscription::default()))
                .collect();

            let barrier = Arc::new(Barrier::new(2));
            let threads: Vec<_> = contenders
                .iter()
                .map(|subscription| {
                    let adapter = Arc::clone(&fx.adapter);
                    let subscription = Arc::clone(subscription);
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        barrier.wait();
                        Subscriber::<Message<&'static str>>::on_subscribe(
                            &*adapter,
                            subscription as Arc<dyn Subscription>,
                        );
                    })
                })
                .collect();
            for thread in threads {
                thread.join().unwrap();
            }

            let cancelled: usize = contenders.iter().map(|s| s.cancelled()).sum();
            let requested: usize = contenders.iter().map(|s| s.requested()).sum();
            assert_eq!(cancelled, 1, "exactly one contender must lose");
            assert_eq!(requested, 1, "exactly one contender must be primed");
            assert_eq!(fx.registry.len(), 1);
        }
    }

    #[test]
    fn every_delivery_requests_exactly_one_more() {
        let mut fx = fixture();
        let subscription = subscribe(&fx.adapter);

        for n in 0..3usize {
            fx.deliver(Message::new("tick"));
            assert_eq!(subscription.requested(), 1 + n + 1);
        }

        for _ in 0..3 {
            assert!(fx.received.try_recv().is_ok());
        }
        assert!(fx.received.try_recv().is_err());
    }

    #[test]
    fn bare_payloads_are_wrapped_on_entry() {
        let mut fx = fixture();
        subscribe(&fx.adapter);

        Subscriber::<&'static str>::on_next(&*fx.adapter, "bare");

        let message = fx.received.try_recv().expect("payload must be queued");
        assert_eq!(*message.payload(), "bare");
        assert!(!message.is_settled());
    }

    #[test]
    fn stream_error_unregisters_and_stops_demand() {
        let mut fx = fixture();
        let subscription = subscribe(&fx.adapter);

        let failure: SignalError = Arc::new(std::io::Error::other("broker went away"));
        Subscriber::<Message<&'static str>>::on_error(&*fx.adapter, failure);

        assert_eq!(fx.registry.len(), 0);

        // A late delivery is still queued but no longer paid for.
        fx.deliver(Message::new("straggler"));
        assert_eq!(subscription.requested(), 1);
        assert!(fx.received.try_recv().is_ok());
    }

    #[test]
    fn completion_unregisters_and_stops_demand() {
        let fx = fixture();
        let subscription = subscribe(&fx.adapter);

        Subscriber::<Message<&'static str>>::on_complete(&*fx.adapter);
        assert_eq!(fx.registry.len(), 0);

        fx.deliver(Message::new("straggler"));
        assert_eq!(subscription.requested(), 1);
    }

    #[test]
    fn error_then_complete_unregisters_once() {
        let fx = fixture();
        let _subscription = subscribe(&fx.adapter);

        let failure: SignalError = Arc::new(std::io::Error::other("first"));
        Subscriber::<Message<&'static str>>::on_error(&*fx.adapter, failure);
        Subscriber::<Message<&'static str>>::on_complete(&*fx.adapter);

        assert_eq!(fx.registry.len(), 0);
    }

    #[test]
    fn delivery_without_subscription_still_queues() {
        let mut fx = fixture();

        fx.deliver(Message::new("unsolicited"));

        let message = fx.received.try_recv().expect("message must be queued");
        assert_eq!(*message.payload(), "unsolicited");
    }

    #[test]
    fn delivery_after_queue_teardown_does_not_panic() {
        let Fixture {
            adapter, received, ..
        } = fixture();
        let subscription = subscribe(&adapter);
        drop(received);

        Subscriber::<Message<&'static str>>::on_next(&*adapter, Message::new("dropped"));

        // Demand keeps flowing; only the message is lost.
        assert_eq!(subscription.requested(), 2);
    }

    #[test]
    fn inert_publisher_side_hands_out_a_dead_subscription() {
        let fx = fixture();

        #[derive(Default)]
        struct Downstream {
            subscriptions: Mutex<Vec<Arc<dyn Subscription>>>,
            items: AtomicUsize,
        }

        impl Subscriber<()> for Downstream {
            fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
                self.subscriptions.lock().unwrap().push(subscription);
            }

            fn on_next(&self, _item: ()) {
                self.items.fetch_add(1, Ordering::SeqCst);
            }

            fn on_error(&self, _error: SignalError) {}

            fn on_complete(&self) {}
        }

        let downstream = Arc::new(Downstream::default());
        fx.adapter
            .subscribe(Arc::clone(&downstream) as Arc<dyn Subscriber<()>>);

        let handles = downstream.subscriptions.lock().unwrap();
        assert_eq!(handles.len(), 1);
        // The handle is inert: poking it changes nothing and panics never.
        handles[0].request(64);
        handles[0].cancel();
        handles[0].cancel();
        assert_eq!(downstream.items.load(Ordering::SeqCst), 0);
    }
}
