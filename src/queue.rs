use std::fmt;

use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    time::Instant,
};

use crate::Message;

/// Outcome of a deadline-bound [`ReceiveQueue::pop`].
///
/// Three-state on purpose: a missing message is either "not yet" or "never
/// again", and assertions treat those very differently.
#[derive(Debug)]
pub enum Pop<T> {
    /// A message was handed out before the deadline.
    Message(Message<T>),
    /// The deadline passed with nothing to hand out.
    TimedOut,
    /// The queue is closed and fully drained; nothing further will arrive.
    Closed,
}

/// Unbounded FIFO bridging delivery tasks and the single test task.
///
/// Any number of adapters (or the probe's own injection path) push
/// concurrently and never wait. The owner pops with an absolute deadline;
/// only that call suspends, and only until the deadline. There is no
/// consumer-side backpressure here: the demand protocol upstream is what
/// bounds growth.
///
/// A deadline already in the past reports [`Pop::TimedOut`] immediately,
/// even if messages are queued. Assertions compute one deadline up front
/// and re-pop with it; once the window is spent, buffered stragglers no
/// longer count.
pub struct ReceiveQueue<T> {
    sender: UnboundedSender<Message<T>>,
    receiver: UnboundedReceiver<Message<T>>,
}

impl<T> ReceiveQueue<T> {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded_channel();
        Self { sender, receiver }
    }

    /// Append a message. Never blocks; messages pushed after [`close`]
    /// are dropped.
    ///
    /// [`close`]: Self::close
    pub fn push(&self, message: Message<T>) {
        if self.sender.send(message).is_err() {
            tracing::warn!("receive queue closed, dropping pushed message");
        }
    }

    /// A sender half for delivery-side code to push through.
    pub(crate) fn sender(&self) -> UnboundedSender<Message<T>> {
        self.sender.clone()
    }

    /// Wait until a message is available or `deadline` passes.
    pub async fn pop(&mut self, deadline: Instant) -> Pop<T> {
        if Instant::now() >= deadline {
            return Pop::TimedOut;
        }
        match tokio::time::timeout_at(deadline, self.receiver.recv()).await {
            Ok(Some(message)) => Pop::Message(message),
            Ok(None) => Pop::Closed,
            Err(_) => Pop::TimedOut,
        }
    }

    /// Shut the queue down.
    ///
    /// Already-buffered messages can still be popped; once drained, `pop`
    /// reports [`Pop::Closed`] and delivery-side pushes are dropped.
    pub fn close(&mut self) {
        self.receiver.close();
    }

    /// Number of messages currently buffered.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl<T> Default for ReceiveQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ReceiveQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiveQueue")
            .field("buffered", &self.len())
            .finish_non_exhaustive()
    }
}
