use std::time::Duration;

use crate::TopicId;

/// The single error type for all sonde assertions.
///
/// Every fallible sonde API returns `sonde::Result<T>` (alias for
/// `Result<T, sonde::Error>`). In a test, `?` or `unwrap()` on that result
/// turns the variant's message into the test failure; the variants exist so
/// that tests about the probe itself can match on exactly what went wrong.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The receive window elapsed with no message to hand out.
    #[error("timed out after {timeout:?} waiting for a message on topic '{topic}' with payload {expected}")]
    ReceiveTimeout {
        topic: TopicId,
        expected: String,
        timeout: Duration,
    },

    /// The receive window elapsed during an eventual match; everything that
    /// arrived in the meantime was acknowledged and ignored.
    ///
    /// The ignored entries are already rendered payload descriptions, so the
    /// message splices them in as captured rather than re-escaping them.
    #[error("timed out after {timeout:?} waiting for a message on topic '{topic}' with payload {expected}; received and ignored payloads: [{}]", .ignored.join(", "))]
    EventualTimeout {
        topic: TopicId,
        expected: String,
        timeout: Duration,
        ignored: Vec<String>,
    },

    /// A message arrived in time but carried the wrong payload.
    #[error("expected a message on topic '{topic}' with payload {expected} but got {actual}")]
    PayloadMismatch {
        topic: TopicId,
        expected: String,
        actual: String,
    },

    /// A message arrived while the probe was asserting silence.
    #[error("{context}: expected no messages on topic '{topic}' but got {message}")]
    UnexpectedMessage {
        context: String,
        topic: TopicId,
        message: String,
    },

    /// The receive queue shut down underneath a blocked wait. Unrecoverable;
    /// nothing will ever arrive again on this probe.
    #[error("receive queue for topic '{topic}' closed while a wait was in progress")]
    QueueClosed { topic: TopicId },
}
