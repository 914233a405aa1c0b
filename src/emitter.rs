use std::{
    collections::VecDeque,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::{Message, Payload, Publisher, SignalError, Subscriber, Subscription, TopicId};

/// Scripted message source honoring downstream demand.
///
/// An emitter is the sending half of a test harness: the test scripts
/// payloads with [`send`](Emitter::send) and a terminal signal with
/// [`complete`](Emitter::complete) or [`fail`](Emitter::fail), and each
/// subscriber drains its own copy of that script exactly as fast as it
/// requests. Nothing is pushed past demand; a slow subscriber simply
/// leaves its backlog queued.
///
/// Terminal signals wait behind the backlog, so a subscriber always sees
/// every payload sent before `complete` was called.
///
/// # Example
///
/// ```rust,no_run
/// use sonde::{Emitter, Probe, Publisher, TestEnvironment};
///
/// #[tokio::main]
/// async fn main() -> sonde::Result {
///     let mut probe = Probe::new(TestEnvironment::default(), "ticks");
///     let emitter = Emitter::new("ticks");
///     emitter.subscribe(probe.subscriber());
///
///     emitter.send(1u32);
///     emitter.complete();
///     probe.expect_next_message(&1).await?.ack();
///     Ok(())
/// }
/// ```
pub struct Emitter<T: Payload> {
    topic: TopicId,
    outlets: Mutex<Vec<Arc<Outlet<T>>>>,
}

impl<T: Payload> Emitter<T> {
    /// Create an emitter for the channel named by `topic`.
    pub fn new(topic: impl Into<TopicId>) -> Self {
        Self {
            topic: topic.into(),
            outlets: Mutex::new(Vec::new()),
        }
    }

    /// Returns the topic label this emitter publishes under.
    #[inline]
    pub fn topic(&self) -> &TopicId {
        &self.topic
    }

    /// Queue a bare payload for every current subscriber.
    ///
    /// With no subscribers attached the payload is dropped with a warning;
    /// there is no replay for late subscribers.
    pub fn send(&self, payload: T)
    where
        T: Clone,
    {
        self.send_message(Message::new(payload));
    }

    /// Queue a wrapped message for every current subscriber.
    ///
    /// Each subscriber gets its own clone; the clones share settlement, so
    /// whichever side acknowledges first wins and the rest observe it.
    pub fn send_message(&self, message: Message<T>)
    where
        T: Clone,
    {
        let outlets = self.live_outlets();
        if outlets.is_empty() {
            tracing::warn!(topic = %self.topic, "send with no live subscribers, message dropped");
            return;
        }
        for outlet in outlets {
            outlet.enqueue(message.clone());
        }
    }

    /// Mark the script finished.
    ///
    /// Each subscriber receives the completion signal once its backlog has
    /// drained, then its subscription goes dead.
    pub fn complete(&self) {
        tracing::debug!(topic = %self.topic, "emitting completion");
        for outlet in self.live_outlets() {
            outlet.terminate(Terminal::Complete);
        }
    }

    /// Mark the script failed.
    ///
    /// Like [`complete`](Emitter::complete) the signal waits behind any
    /// backlog, so subscribers see the full script before the failure.
    pub fn fail(&self, error: SignalError) {
        tracing::debug!(topic = %self.topic, error = %error, "emitting failure");
        for outlet in self.live_outlets() {
            outlet.terminate(Terminal::Failed(Arc::clone(&error)));
        }
    }

    /// Convenience wrapper around [`fail`](Emitter::fail) for a concrete
    /// error value.
    pub fn fail_with(&self, error: impl std::error::Error + Send + Sync + 'static) {
        self.fail(Arc::new(error));
    }

    /// Number of currently live subscribers.
    ///
    /// Cancelled and terminated subscriptions are pruned on the way.
    pub fn num_subscribers(&self) -> usize {
        let mut outlets = self.lock();
        outlets.retain(|outlet| !outlet.is_dead());
        outlets.len()
    }

    fn live_outlets(&self) -> Vec<Arc<Outlet<T>>> {
        self.lock()
            .iter()
            .filter(|outlet| !outlet.is_dead())
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Outlet<T>>>> {
        self.outlets.lock().expect("emitter outlet list lock poisoned")
    }
}

impl<T: Payload> Publisher<Message<T>> for Emitter<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<Message<T>>>) {
        let outlet = Arc::new(Outlet {
            subscriber: Arc::clone(&subscriber),
            state: Mutex::new(OutletState::default()),
        });
        self.lock().push(Arc::clone(&outlet));
        tracing::debug!(topic = %self.topic, "subscriber attached");
        // Handed out after the outlet list is unlocked, so the subscriber
        // may synchronously request or cancel from inside on_subscribe.
        subscriber.on_subscribe(Arc::new(OutletSubscription { outlet }));
    }
}

impl<T: Payload> fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("topic", &self.topic)
            .field("outlets", &self.lock().len())
            .finish_non_exhaustive()
    }
}

// ==================== Outlets ====================

#[derive(Clone)]
enum Terminal {
    Complete,
    Failed(SignalError),
}

/// Per-subscriber delivery lane: a backlog, a demand counter, and a pump
/// that moves one onto the other.
struct Outlet<T: Payload> {
    subscriber: Arc<dyn Subscriber<Message<T>>>,
    state: Mutex<OutletState<T>>,
}

struct OutletState<T> {
    pending: VecDeque<Message<T>>,
    demand: u64,
    pumping: bool,
    cancelled: bool,
    terminal: Option<Terminal>,
    terminal_sent: bool,
}

impl<T> Default for OutletState<T> {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
            demand: 0,
            pumping: false,
            cancelled: false,
            terminal: None,
            terminal_sent: false,
        }
    }
}

enum Step<T> {
    Deliver(Message<T>),
    Finish(Terminal),
    Idle,
}

impl<T: Payload> Outlet<T> {
    fn enqueue(&self, message: Message<T>) {
        {
            let mut state = self.lock();
            // Post-terminal and post-cancel sends race the snapshot in
            // live_outlets; they resolve to a silent drop here.
            if state.cancelled || state.terminal.is_some() {
                return;
            }
            state.pending.push_back(message);
        }
        self.pump();
    }

    fn terminate(&self, terminal: Terminal) {
        {
            let mut state = self.lock();
            if state.cancelled || state.terminal.is_some() {
                return;
            }
            state.terminal = Some(terminal);
        }
        self.pump();
    }

    fn add_demand(&self, n: u64) {
        {
            let mut state = self.lock();
            if state.cancelled {
                return;
            }
            state.demand = state.demand.saturating_add(n);
        }
        self.pump();
    }

    fn cancel(&self) {
        let mut state = self.lock();
        if state.cancelled {
            return;
        }
        state.cancelled = true;
        state.pending.clear();
        state.demand = 0;
    }

    fn is_dead(&self) -> bool {
        self.lock().cancelled
    }

    /// Drain backlog into the subscriber while demand lasts, then emit the
    /// terminal signal if the script is finished.
    ///
    /// Exactly one frame pumps at a time. Signals are invoked outside the
    /// state lock, so a subscriber that requests more from inside `on_next`
    /// just bumps the counter and the running frame picks it up.
    fn pump(&self) {
        {
            let mut state = self.lock();
            if state.pumping || state.cancelled {
                return;
            }
            state.pumping = true;
        }

        loop {
            let step = {
                let mut state = self.lock();
                if state.cancelled {
                    state.pumping = false;
                    Step::Idle
                } else if state.demand > 0 {
                    match state.pending.pop_front() {
                        Some(message) => {
                            state.demand -= 1;
                            Step::Deliver(message)
                        }
                        None => Self::terminal_or_idle(&mut state),
                    }
                } else if state.pending.is_empty() {
                    Self::terminal_or_idle(&mut state)
                } else {
                    // Backlog waits for demand.
                    state.pumping = false;
                    Step::Idle
                }
            };

            match step {
                Step::Deliver(message) => self.subscriber.on_next(message),
                Step::Finish(Terminal::Complete) => self.subscriber.on_complete(),
                Step::Finish(Terminal::Failed(error)) => self.subscriber.on_error(error),
                Step::Idle => return,
            }
        }
    }

    /// Emit the scripted terminal signal if it is due, else release the frame.
    fn terminal_or_idle(state: &mut OutletState<T>) -> Step<T> {
        match state.terminal.clone() {
            Some(terminal) if !state.terminal_sent => {
                state.terminal_sent = true;
                state.cancelled = true;
                Step::Finish(terminal)
            }
            _ => {
                state.pumping = false;
                Step::Idle
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, OutletState<T>> {
        self.state.lock().expect("emitter outlet state lock poisoned")
    }
}

struct OutletSubscription<T: Payload> {
    outlet: Arc<Outlet<T>>,
}

impl<T: Payload> Subscription for OutletSubscription<T> {
    fn request(&self, n: u64) {
        self.outlet.add_demand(n);
    }

    fn cancel(&self) {
        self.outlet.cancel();
    }
}
