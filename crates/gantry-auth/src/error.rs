//! Permission denied error.

use crate::PermissionLevel;
use gantry_types::{ErrorCode, TwinPath};
use thiserror::Error;

/// A user lacks a permission on a twin element.
///
/// The message names the user, the verb and the target path, so it can be
/// returned to northbound clients as is.
///
/// # Example
///
/// ```
/// use gantry_auth::{NotPermitted, PermissionLevel};
/// use gantry_types::TwinPath;
///
/// let err = NotPermitted::new("bob", PermissionLevel::Read, TwinPath::resource("p", "s", "r"));
/// assert_eq!(err.to_string(), "user bob does not have permission to read p/s/r");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("user {user_id} does not have permission to {} {path}", .level.verb())]
pub struct NotPermitted {
    /// Id of the denied user.
    pub user_id: String,
    /// The level that was requested.
    pub level: PermissionLevel,
    /// The targeted element.
    pub path: TwinPath,
}

impl NotPermitted {
    /// Creates a permission error.
    #[must_use]
    pub fn new(user_id: impl Into<String>, level: PermissionLevel, path: TwinPath) -> Self {
        Self {
            user_id: user_id.into(),
            level,
            path,
        }
    }
}

impl ErrorCode for NotPermitted {
    fn code(&self) -> &'static str {
        "AUTH_NOT_PERMITTED"
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}
