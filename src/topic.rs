use std::{hash::Hash, sync::Arc};

/// Label for the logical channel a probe or emitter is attached to.
///
/// Topics are purely diagnostic: they appear in assertion failures and log
/// lines so that a test touching several channels can tell which probe
/// fired. Nothing routes on them.
///
/// `TopicId` is cheap to clone. Equality uses string comparison with a
/// fast-path for pointer equality when labels share the same allocation.
///
/// # Example
///
/// ```rust
/// use sonde::TopicId;
///
/// let topic = TopicId::new("orders");
/// assert_eq!(topic.as_str(), "orders");
/// assert_eq!(topic, TopicId::from("orders"));
/// ```
#[derive(Debug, Clone)]
pub struct TopicId(Arc<str>);

impl TopicId {
    pub fn new(label: &str) -> Self {
        Self(Arc::from(label))
    }

    /// Returns the string representation of this topic label.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for TopicId {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for TopicId {}

impl std::fmt::Display for TopicId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Hash for TopicId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl From<&str> for TopicId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TopicId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}
