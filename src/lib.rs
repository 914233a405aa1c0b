//! # Sonde
//!
//! Deadline-bound probes and scripted emitters for demand-driven message
//! channels.
//!
//! Sonde helps you test code that publishes to or consumes from reactive
//! channels without hand-rolling latches, sleeps, or polling loops. Attach a
//! [`Probe`] where your system delivers messages, script the other side with
//! an [`Emitter`], and assert on what arrives with bounded waits that fail
//! loudly instead of hanging the suite.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sonde::*;
//!
//! #[tokio::main]
//! async fn main() -> Result {
//!     let mut probe = Probe::new(TestEnvironment::default(), "fills");
//!     let emitter = Emitter::new("fills");
//!     emitter.subscribe(probe.subscriber());
//!
//!     emitter.send("order filled");
//!     emitter.send("order settled");
//!
//!     probe.expect_next_message(&"order filled").await?.ack();
//!     probe.expect_next_message(&"order settled").await?.ack();
//!     probe.expect_no_messages("the book is empty").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Core Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Probe`] | Buffers channel deliveries and asserts on them under deadlines |
//! | [`Emitter`] | Scripted source that delivers exactly as fast as demand allows |
//! | [`Message`] | A payload plus its ack/nack settlement contract |
//! | [`ChannelAdapter`] | Attaches a probe to a channel, one item of demand at a time |
//! | [`TestEnvironment`] | Assertion windows shared across a suite |
//! | [`Publisher`] / [`Subscriber`] / [`Subscription`] | The four-signal channel contract |
//! | [`TopicId`] | Cheap shared label naming a channel in failures and logs |
//! | [`Error`] | Every way an assertion can fail, with full context |
//!
//! ## One Item at a Time
//!
//! The adapters a probe hands out never request more than a single item:
//! one `request(1)` when the subscription is established, and one more after
//! each delivery. A publisher that respects demand therefore cannot flood
//! the probe, and a publisher that ignores demand is caught by tests built
//! on [`Emitter`], which delivers strictly against its demand counter.
//! Buffering on the probe side is unbounded, so slow assertions never push
//! back on the channel under test.
//!
//! ## Settlement
//!
//! Every delivery is a [`Message`]: the payload plus callbacks for `ack`
//! (consumed) and `nack` (rejected, with a reason). Settlement is claimed
//! once per logical message no matter how many clones exist or how many
//! tasks race for it, so sources can hang completion tracking off the
//! callbacks without double-count worries. Assertions return matched
//! messages unsettled; deciding their fate is the test's job.
//!
//! ## Examples
//!
//! See the `demos/` directory:
//!
//! - `probe.rs`  - Asserting on a channel fed by a live publisher
//! - `emitter.rs`  - Scripting a source and watching demand pace it

mod adapter;
mod channel;
mod emitter;
mod environment;
mod error;
mod message;
mod payload;
mod probe;
mod queue;
mod registry;
mod topic;

pub use adapter::ChannelAdapter;
pub use channel::{InertSubscription, Publisher, SignalError, Subscriber, Subscription};
pub use emitter::Emitter;
pub use environment::TestEnvironment;
pub use error::Error;
pub use message::Message;
pub use payload::Payload;
pub use probe::Probe;
pub use queue::{Pop, ReceiveQueue};
pub use registry::SubscriptionRegistry;
pub use topic::TopicId;

/// Convenience alias for `Result<T, sonde::Error>`.
pub type Result<T = ()> = std::result::Result<T, Error>;
