//! Caller identity.
//!
//! A [`UserInfo`] is produced by the northbound authentication layer
//! (token validation, basic auth, ...) and is immutable afterwards. The
//! session layer only uses it to index sessions and to build authorizers;
//! it never inspects credentials.

use serde::{Deserialize, Serialize};

/// User id under which every unauthenticated caller is tracked.
pub const ANONYMOUS_USER_ID: &str = "<ANONYMOUS>";

/// Identity of an authenticated (or anonymous) caller.
///
/// Two `UserInfo` values with the same `user_id` address the same set of
/// sessions in the registry.
///
/// # Example
///
/// ```
/// use gantry_types::UserInfo;
///
/// let bob = UserInfo::new("bob");
/// assert!(!bob.is_anonymous());
///
/// let anon = UserInfo::anonymous();
/// assert!(anon.is_anonymous());
/// assert_eq!(anon.user_id(), "<ANONYMOUS>");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserInfo {
    user_id: String,
    anonymous: bool,
}

impl UserInfo {
    /// Creates an authenticated identity.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            anonymous: false,
        }
    }

    /// Returns the shared anonymous identity.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            user_id: ANONYMOUS_USER_ID.to_string(),
            anonymous: true,
        }
    }

    /// Returns the user id.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Returns `true` for the anonymous identity.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }
}

impl std::fmt::Display for UserInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.anonymous {
            write!(f, "anonymous")
        } else {
            write!(f, "user:{}", self.user_id)
        }
    }
}
