//! Pre-authorization results.
//!
//! A pre-authorization is a cheap decision taken *before* the twin is
//! consulted, typically from token claims alone. It is three-valued:
//!
//! ```text
//! PreAuth::Allow    → skip the authoritative check, go straight to the twin
//! PreAuth::Deny     → fail now, the twin is never looked at
//! PreAuth::Unknown  → look the target up, then ask the Authorizer
//! ```

use serde::{Deserialize, Serialize};

/// Result of a [`PreAuthorizer`](crate::PreAuthorizer) check.
///
/// # Example
///
/// ```
/// use gantry_auth::PreAuth;
///
/// assert!(PreAuth::Deny.is_denied());
/// assert!(PreAuth::Unknown.needs_authoritative_check());
/// assert!(!PreAuth::Allow.needs_authoritative_check());
/// assert_eq!(PreAuth::Allow.status_str(), "allow");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PreAuth {
    /// Access is granted; no further check is needed.
    Allow,
    /// Access is refused; the twin must not be consulted.
    Deny,
    /// The pre-authorizer cannot decide without the target's model.
    Unknown,
}

impl PreAuth {
    /// Returns `true` if access was granted up front.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Returns `true` if access was refused up front.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny)
    }

    /// Returns `true` if the authoritative check must run inside the twin command.
    #[must_use]
    pub fn needs_authoritative_check(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Converts a definitive boolean decision.
    #[must_use]
    pub fn from_decision(allowed: bool) -> Self {
        if allowed {
            Self::Allow
        } else {
            Self::Deny
        }
    }

    /// Returns the status as a string ("allow", "deny", "unknown").
    #[must_use]
    pub fn status_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Unknown => "unknown",
        }
    }
}
