use std::time::Duration;

/// Assertion windows shared by the probes of one test run.
///
/// Controls how long the two families of assertions wait. Use the builder
/// pattern to customize, or use [`Default`] for values suited to CI latency.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use sonde::TestEnvironment;
///
/// let environment = TestEnvironment::default()
///     .with_receive_timeout(Duration::from_millis(200))     // Fast local runs
///     .with_no_message_timeout(Duration::from_millis(50));  // Short silence checks
///
/// assert_eq!(environment.receive_timeout(), Duration::from_millis(200));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TestEnvironment {
    /// How long `expect_next_message` / `expect_eventual_message` wait for
    /// a delivery before failing.
    /// Default: 5s
    receive_timeout: Duration,

    /// How long `expect_no_messages` watches for stray traffic before
    /// declaring the channel quiet.
    /// Default: 500ms
    no_message_timeout: Duration,
}

impl Default for TestEnvironment {
    fn default() -> Self {
        TestEnvironment {
            receive_timeout: Self::DEFAULT_RECEIVE_TIMEOUT,
            no_message_timeout: Self::DEFAULT_NO_MESSAGE_TIMEOUT,
        }
    }
}

impl TestEnvironment {
    /// Default window for the message-expecting assertions: generous enough
    /// for a loaded CI worker to schedule the delivery task.
    pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Default window for silence checks: long enough to catch an in-flight
    /// straggler, short enough not to dominate a test.
    pub const DEFAULT_NO_MESSAGE_TIMEOUT: Duration = Duration::from_millis(500);

    /// Set the wait window for message-expecting assertions.
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Returns the wait window for message-expecting assertions.
    pub fn receive_timeout(&self) -> Duration {
        self.receive_timeout
    }

    /// Set the watch window for silence checks.
    pub fn with_no_message_timeout(mut self, timeout: Duration) -> Self {
        self.no_message_timeout = timeout;
        self
    }

    /// Returns the watch window for silence checks.
    pub fn no_message_timeout(&self) -> Duration {
        self.no_message_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_constants() {
        let environment = TestEnvironment::default();
        assert_eq!(
            environment.receive_timeout(),
            TestEnvironment::DEFAULT_RECEIVE_TIMEOUT
        );
        assert_eq!(
            environment.no_message_timeout(),
            TestEnvironment::DEFAULT_NO_MESSAGE_TIMEOUT
        );
    }

    #[test]
    fn builders_override_independently() {
        let environment = TestEnvironment::default()
            .with_receive_timeout(Duration::from_millis(120))
            .with_no_message_timeout(Duration::from_millis(30));
        assert_eq!(environment.receive_timeout(), Duration::from_millis(120));
        assert_eq!(environment.no_message_timeout(), Duration::from_millis(30));
    }
}
