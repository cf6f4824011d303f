//! Subscription topic patterns.
//!
//! A topic ending in `*` matches every topic that starts with the literal
//! text before the `*`. Any other topic, including one with a `*` in the
//! middle, only matches itself.

/// A parsed subscription topic.
///
/// # Example
///
/// ```
/// use gantry_event::TopicPattern;
///
/// let wildcard = TopicPattern::parse("DATA/sensor1/*");
/// assert!(wildcard.matches("DATA/sensor1/temp/level"));
/// assert!(!wildcard.matches("DATA/sensor2/temp/level"));
///
/// let exact = TopicPattern::parse("DATA/sensor1/temp/level");
/// assert!(exact.matches("DATA/sensor1/temp/level"));
/// assert!(!exact.matches("DATA/sensor1/temp/level2"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TopicPattern {
    /// Matches only the identical topic.
    Exact(String),
    /// Matches every topic starting with the stored prefix.
    Prefix(String),
}

impl TopicPattern {
    /// Parses a subscription topic.
    #[must_use]
    pub fn parse(topic: &str) -> Self {
        match topic.strip_suffix('*') {
            Some(prefix) => Self::Prefix(prefix.to_string()),
            None => Self::Exact(topic.to_string()),
        }
    }

    /// Same as [`parse`](Self::parse), with `prefix` prepended to the stored key.
    #[must_use]
    pub fn parse_with_prefix(prefix: &str, topic: &str) -> Self {
        match Self::parse(topic) {
            Self::Exact(t) => Self::Exact(format!("{prefix}{t}")),
            Self::Prefix(p) => Self::Prefix(format!("{prefix}{p}")),
        }
    }

    /// Returns the stored key (exact topic or literal prefix).
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Exact(t) | Self::Prefix(t) => t,
        }
    }

    /// Returns `true` for wildcard patterns.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Prefix(_))
    }

    /// Returns `true` if `topic` is matched by this pattern.
    #[must_use]
    pub fn matches(&self, topic: &str) -> bool {
        match self {
            Self::Exact(t) => t == topic,
            Self::Prefix(p) => topic.starts_with(p.as_str()),
        }
    }
}
