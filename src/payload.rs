use std::fmt;

/// Bound satisfied by every payload type a probe or emitter can carry.
///
/// Payloads must be `Send + Sync + PartialEq + Debug + 'static` because they:
/// - Cross from delivery tasks into the test task and live inside spawned
///   publishers (`Send`, `'static`)
/// - Are shared behind [`Message`](crate::Message) clones (`Sync`)
/// - Are compared against expected values by the `expect_*` assertions
///   (`PartialEq`)
/// - Appear in assertion failures and log lines (`Debug`)
///
/// The trait is blanket-implemented; any type meeting the bounds qualifies
/// without opting in:
///
/// ```rust
/// use sonde::Payload;
///
/// #[derive(Debug, PartialEq)]
/// enum OrderEvent {
///     Placed(u32),
///     Cancelled(u32),
/// }
///
/// fn assert_payload<T: Payload>() {}
/// assert_payload::<OrderEvent>();
/// assert_payload::<String>();
/// ```
///
/// `Clone` is not part of the bound: only the broadcast send path of
/// [`Emitter`](crate::Emitter) needs it, and it is bounded there.
pub trait Payload: Send + Sync + PartialEq + fmt::Debug + 'static {}

impl<T: Send + Sync + PartialEq + fmt::Debug + 'static> Payload for T {}
