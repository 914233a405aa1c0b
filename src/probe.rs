use std::{fmt, sync::Arc};

use tokio::time::Instant;

use crate::{
    queue::{Pop, ReceiveQueue},
    ChannelAdapter, Error, Message, Payload, Result, SubscriptionRegistry, TestEnvironment,
    TopicId,
};

/// Deadline-bound assertions over one logical message channel.
///
/// A probe attaches to channels through the adapters it hands out, buffers
/// everything they deliver, and lets the owning test pop that buffer with
/// the windows configured in [`TestEnvironment`]. Any number of adapters
/// push concurrently; only the owner asserts (statically enforced: the
/// `expect_*` methods take `&mut self`).
///
/// Every failure is returned synchronously as an [`Error`] from the call
/// that detected it; `?` or `unwrap()` in the test turns it into the test
/// failure. Nothing is deferred, swallowed, or retried past its deadline.
///
/// # Example
///
/// ```rust,no_run
/// use sonde::{Probe, TestEnvironment};
///
/// #[tokio::main]
/// async fn main() -> sonde::Result {
///     let mut probe = Probe::new(TestEnvironment::default(), "orders");
///
///     probe.receive_message("fill");
///     probe.expect_next_message(&"fill").await?.ack();
///     probe.expect_no_messages("no more orders expected").await?;
///     Ok(())
/// }
/// ```
pub struct Probe<T: Payload> {
    topic: TopicId,
    environment: TestEnvironment,
    queue: ReceiveQueue<T>,
    registry: Arc<SubscriptionRegistry>,
}

impl<T: Payload> Probe<T> {
    /// Create a probe for the channel named by `topic`.
    ///
    /// The topic is a diagnostic label for failures and logs; nothing
    /// routes on it.
    pub fn new(environment: TestEnvironment, topic: impl Into<TopicId>) -> Self {
        Self {
            topic: topic.into(),
            environment,
            queue: ReceiveQueue::new(),
            registry: Arc::new(SubscriptionRegistry::new()),
        }
    }

    /// Returns the topic label this probe reports under.
    #[inline]
    pub fn topic(&self) -> &TopicId {
        &self.topic
    }

    /// Returns the assertion windows this probe runs with.
    #[inline]
    pub fn environment(&self) -> &TestEnvironment {
        &self.environment
    }

    // ==================== Channel Attachment ====================

    /// Create a fresh adapter feeding this probe.
    ///
    /// Each call makes a new attachment, so a probe can tap several
    /// channels (or the same channel several times) concurrently. The
    /// returned adapter coerces to whichever view the wiring needs:
    /// `Arc<dyn Subscriber<T>>`, `Arc<dyn Subscriber<Message<T>>>`, or
    /// `Arc<dyn Publisher<()>>` for its inert pass-through side.
    pub fn subscriber(&self) -> Arc<ChannelAdapter<T>> {
        Arc::new(ChannelAdapter::new(
            self.topic.clone(),
            self.queue.sender(),
            Arc::clone(&self.registry),
        ))
    }

    /// Number of currently live channel attachments.
    pub fn num_subscriptions(&self) -> usize {
        self.registry.len()
    }

    /// Cancel every live attachment, exactly once each. Idempotent.
    pub fn cancel_all(&self) {
        self.registry.cancel_all();
    }

    // ==================== Test-Side Injection ====================

    /// Push a bare payload into the receive buffer, bypassing any adapter.
    ///
    /// Used when the probe plays the role of a source rather than a sink.
    pub fn receive_message(&self, payload: T) {
        self.queue.push(Message::new(payload));
    }

    /// Push a wrapped message into the receive buffer, bypassing any
    /// adapter. Lets tests attach settlement callbacks to what the probe
    /// will later hand back out.
    pub fn receive_wrapped_message(&self, message: Message<T>) {
        self.queue.push(message);
    }

    /// Shut the receive buffer down.
    ///
    /// Buffered messages can still be popped; once drained, every
    /// `expect_*` call reports [`Error::QueueClosed`] and adapters drop
    /// late deliveries on the floor.
    pub fn close(&mut self) {
        self.queue.close();
    }

    // ==================== Assertions ====================

    /// Wait up to `receive_timeout` for the next message and require its
    /// payload to be `expected`.
    ///
    /// A message with the wrong payload fails immediately with
    /// [`Error::PayloadMismatch`]; there is no retry. On success the
    /// message is returned unsettled so the caller can `ack` or `nack` it.
    ///
    /// # Errors
    ///
    /// [`Error::ReceiveTimeout`] if nothing arrives in the window,
    /// [`Error::PayloadMismatch`] on the wrong payload,
    /// [`Error::QueueClosed`] if the probe was torn down.
    pub async fn expect_next_message(&mut self, expected: &T) -> Result<Message<T>> {
        let deadline = Instant::now() + self.environment.receive_timeout();
        let message = self.next_within(expected, deadline).await?;
        if message.payload() != expected {
            return Err(Error::PayloadMismatch {
                topic: self.topic.clone(),
                expected: format!("{expected:?}"),
                actual: format!("{message:?}"),
            });
        }
        Ok(message)
    }

    /// Wait up to `receive_timeout` for a message with payload `expected`,
    /// acknowledging and discarding everything else that arrives first.
    ///
    /// The deadline is fixed at call start: time spent on non-matching
    /// traffic counts against the window, so a busy channel can exhaust it
    /// without the target ever arriving. Ignored payloads are recorded and
    /// reported in the timeout failure. The matching message is returned
    /// unsettled.
    ///
    /// # Errors
    ///
    /// [`Error::EventualTimeout`] if the window closes after at least one
    /// ignored message, [`Error::ReceiveTimeout`] if it closes on a silent
    /// channel, [`Error::QueueClosed`] if the probe was torn down.
    pub async fn expect_eventual_message(&mut self, expected: &T) -> Result<Message<T>> {
        let deadline = Instant::now() + self.environment.receive_timeout();
        let mut ignored: Vec<String> = Vec::new();

        loop {
            let message = match self.next_within(expected, deadline).await {
                Ok(message) => message,
                Err(Error::ReceiveTimeout {
                    topic,
                    expected,
                    timeout,
                }) if !ignored.is_empty() => {
                    return Err(Error::EventualTimeout {
                        topic,
                        expected,
                        timeout,
                        ignored,
                    });
                }
                Err(error) => return Err(error),
            };

            if message.payload() == expected {
                return Ok(message);
            }
            tracing::trace!(
                topic = %self.topic,
                payload = ?message.payload(),
                "ignoring non-matching message"
            );
            ignored.push(format!("{:?}", message.payload()));
            message.ack();
        }
    }

    /// Watch the channel for `no_message_timeout` and require silence.
    ///
    /// `context` is the caller's description of why silence was expected;
    /// it leads the failure message when a message shows up.
    ///
    /// # Errors
    ///
    /// [`Error::UnexpectedMessage`] as soon as anything arrives,
    /// [`Error::QueueClosed`] if the probe was torn down.
    pub async fn expect_no_messages(&mut self, context: &str) -> Result {
        let deadline = Instant::now() + self.environment.no_message_timeout();
        match self.queue.pop(deadline).await {
            Pop::Message(message) => Err(Error::UnexpectedMessage {
                context: context.to_owned(),
                topic: self.topic.clone(),
                message: format!("{message:?}"),
            }),
            Pop::TimedOut => Ok(()),
            Pop::Closed => Err(Error::QueueClosed {
                topic: self.topic.clone(),
            }),
        }
    }

    /// Pop with an absolute deadline, mapping the non-message outcomes to
    /// their errors. The timeout error always cites the configured window,
    /// not the possibly-shorter remainder it actually waited.
    async fn next_within(&mut self, expected: &T, deadline: Instant) -> Result<Message<T>> {
        match self.queue.pop(deadline).await {
            Pop::Message(message) => Ok(message),
            Pop::TimedOut => Err(Error::ReceiveTimeout {
                topic: self.topic.clone(),
                expected: format!("{expected:?}"),
                timeout: self.environment.receive_timeout(),
            }),
            Pop::Closed => Err(Error::QueueClosed {
                topic: self.topic.clone(),
            }),
        }
    }
}

impl<T: Payload> fmt::Debug for Probe<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Probe")
            .field("topic", &self.topic)
            .field("buffered", &self.queue.len())
            .field("subscriptions", &self.registry.len())
            .finish_non_exhaustive()
    }
}
