use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

type AckFn = Box<dyn Fn() + Send + Sync>;
type NackFn = Box<dyn Fn(&str) + Send + Sync>;

/// Settlement state shared by every clone of one logical message.
struct Acknowledger {
    settled: AtomicBool,
    on_ack: Option<AckFn>,
    on_nack: Option<NackFn>,
}

impl Acknowledger {
    /// Claim the right to settle. Only the first caller gets `true`.
    fn claim(&self) -> bool {
        !self.settled.swap(true, Ordering::AcqRel)
    }
}

/// The unit carried through probe queues and emitter outlets.
///
/// Pairs a payload with its settlement contract: `ack` signals successful
/// consumption back to the original source, `nack` signals rejection with a
/// reason. Both are idempotent and mutually exclusive; exactly one callback
/// fires no matter how many times or from how many tasks they are invoked.
///
/// Clones share settlement state. A message broadcast to several outlets is
/// still one logical delivery: acknowledging any clone settles them all.
///
/// # Example
///
/// ```rust
/// use std::sync::{
///     atomic::{AtomicUsize, Ordering},
///     Arc,
/// };
/// use sonde::Message;
///
/// let acks = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&acks);
/// let message = Message::with_ack("order-42", move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// message.ack();
/// message.ack(); // second settlement is a no-op
/// assert_eq!(acks.load(Ordering::SeqCst), 1);
/// ```
pub struct Message<T> {
    payload: T,
    acknowledger: Arc<Acknowledger>,
}

impl<T> Message<T> {
    /// Wrap a bare payload. Settlement is tracked but has no observers.
    pub fn new(payload: T) -> Self {
        Self::build(payload, None, None)
    }

    /// Wrap a payload with an acknowledgement callback.
    pub fn with_ack(payload: T, on_ack: impl Fn() + Send + Sync + 'static) -> Self {
        Self::build(payload, Some(Box::new(on_ack)), None)
    }

    /// Wrap a payload with both acknowledgement and rejection callbacks.
    pub fn with_handlers(
        payload: T,
        on_ack: impl Fn() + Send + Sync + 'static,
        on_nack: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        Self::build(payload, Some(Box::new(on_ack)), Some(Box::new(on_nack)))
    }

    fn build(payload: T, on_ack: Option<AckFn>, on_nack: Option<NackFn>) -> Self {
        Self {
            payload,
            acknowledger: Arc::new(Acknowledger {
                settled: AtomicBool::new(false),
                on_ack,
                on_nack,
            }),
        }
    }

    /// Returns a reference to the payload.
    #[inline]
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Consume the message and return the payload.
    ///
    /// Does not settle; a payload extracted from an unsettled message leaves
    /// the source waiting.
    pub fn into_payload(self) -> T {
        self.payload
    }

    /// Signal successful consumption to the source.
    ///
    /// Fires the acknowledgement callback at most once across all clones of
    /// this message; later calls (and any `nack`) are no-ops.
    pub fn ack(&self) {
        if self.acknowledger.claim() {
            if let Some(on_ack) = &self.acknowledger.on_ack {
                on_ack();
            }
        }
    }

    /// Signal rejection to the source, with a reason.
    ///
    /// Fires the rejection callback at most once across all clones of this
    /// message; later calls (and any `ack`) are no-ops.
    pub fn nack(&self, reason: &str) {
        if self.acknowledger.claim() {
            if let Some(on_nack) = &self.acknowledger.on_nack {
                on_nack(reason);
            }
        }
    }

    /// Whether this message (or any clone of it) has been acked or nacked.
    pub fn is_settled(&self) -> bool {
        self.acknowledger.settled.load(Ordering::Acquire)
    }
}

impl<T: Clone> Clone for Message<T> {
    fn clone(&self) -> Self {
        Self {
            payload: self.payload.clone(),
            acknowledger: Arc::clone(&self.acknowledger),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Message<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("payload", &self.payload)
            .field("settled", &self.is_settled())
            .finish()
    }
}

impl<T: PartialEq> PartialEq for Message<T> {
    fn eq(&self, other: &Self) -> bool {
        self.payload == other.payload
    }
}
