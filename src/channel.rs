use std::sync::Arc;

/// Failure payload carried by [`Subscriber::on_error`].
///
/// Type-erased and shared so a single upstream failure can fan out to any
/// number of subscribers and land in log fields without cloning the
/// underlying error.
pub type SignalError = Arc<dyn std::error::Error + Send + Sync>;

/// A live request/cancel pair between one publisher and one subscriber.
///
/// Handed to the subscriber in [`Subscriber::on_subscribe`] and owned by it
/// from then on. Implementations must tolerate `cancel` being called more
/// than once and `request` arriving after termination (both become no-ops):
/// a registry-driven bulk cancellation can race the publisher's own
/// shutdown, and neither side coordinates with the other first.
pub trait Subscription: Send + Sync {
    /// Authorize the publisher to deliver `n` more items.
    fn request(&self, n: u64);

    /// Stop the flow. Idempotent.
    fn cancel(&self);
}

/// Receiving side of the four-signal channel protocol.
///
/// A conforming publisher calls `on_subscribe` exactly once, then `on_next`
/// only against outstanding demand, then at most one of `on_error` /
/// `on_complete`. Implementations must survive duplicate or out-of-order
/// signals from a misbehaving publisher without panicking; how they defend
/// is up to them.
pub trait Subscriber<T>: Send + Sync {
    /// A publisher offers a subscription. The subscriber controls demand
    /// from here on.
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>);

    /// One item is delivered.
    fn on_next(&self, item: T);

    /// The stream failed. Terminal: no further signals follow.
    fn on_error(&self, error: SignalError);

    /// The stream finished. Terminal: no further signals follow.
    fn on_complete(&self);
}

/// Sending side of the channel protocol.
pub trait Publisher<T>: Send + Sync {
    /// Attach a subscriber. The publisher must signal
    /// [`Subscriber::on_subscribe`] before anything else.
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>);
}

/// A subscription whose `request` and `cancel` do nothing.
///
/// Handed out by stages that advertise no outgoing items, such as the
/// pass-through publisher side of a probe adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct InertSubscription;

impl Subscription for InertSubscription {
    fn request(&self, _n: u64) {}

    fn cancel(&self) {}
}
