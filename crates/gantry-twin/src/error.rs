//! Twin and executor errors.
//!
//! # Error Codes
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`TwinError::UnknownTarget`] | `TWIN_UNKNOWN_TARGET` | No |
//! | [`TwinError::AlreadyExists`] | `TWIN_ALREADY_EXISTS` | No |
//! | [`TwinError::WrongResourceType`] | `TWIN_WRONG_RESOURCE_TYPE` | No |
//! | [`TwinError::InvalidValue`] | `TWIN_INVALID_VALUE` | No |
//! | [`TwinError::ActionFailed`] | `TWIN_ACTION_FAILED` | Yes |
//! | [`ExecutorError::Stopped`] | `EXECUTOR_STOPPED` | No |
//! | [`ExecutorError::CommandDropped`] | `EXECUTOR_COMMAND_DROPPED` | Yes |

use crate::ResourceType;
use gantry_types::{ErrorCode, TwinPath};
use thiserror::Error;

/// Failure reported by the digital twin itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TwinError {
    /// The addressed element does not exist.
    #[error("unknown {} {path}", .path.level_name())]
    UnknownTarget {
        /// Path that was looked up.
        path: TwinPath,
    },

    /// The element to create already exists.
    #[error("{} {path} already exists", .path.level_name())]
    AlreadyExists {
        /// Path of the existing element.
        path: TwinPath,
    },

    /// The operation does not apply to this kind of resource.
    #[error("resource {path} is of type {actual}")]
    WrongResourceType {
        /// Resource path.
        path: TwinPath,
        /// The resource's actual type.
        actual: ResourceType,
    },

    /// The value does not fit the resource content type.
    #[error("invalid value for {path}: {reason}")]
    InvalidValue {
        /// Resource path.
        path: TwinPath,
        /// What was wrong.
        reason: String,
    },

    /// An action handler returned an error.
    #[error("action {path} failed: {reason}")]
    ActionFailed {
        /// Action resource path.
        path: TwinPath,
        /// Handler message.
        reason: String,
    },
}

impl TwinError {
    /// Shorthand for [`TwinError::UnknownTarget`].
    #[must_use]
    pub fn unknown(path: TwinPath) -> Self {
        Self::UnknownTarget { path }
    }
}

impl ErrorCode for TwinError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnknownTarget { .. } => "TWIN_UNKNOWN_TARGET",
            Self::AlreadyExists { .. } => "TWIN_ALREADY_EXISTS",
            Self::WrongResourceType { .. } => "TWIN_WRONG_RESOURCE_TYPE",
            Self::InvalidValue { .. } => "TWIN_INVALID_VALUE",
            Self::ActionFailed { .. } => "TWIN_ACTION_FAILED",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::ActionFailed { .. })
    }
}

/// Failure to run a command on the twin executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExecutorError {
    /// The executor no longer accepts commands.
    #[error("twin executor stopped")]
    Stopped,

    /// The command was accepted but never replied (it panicked or was discarded).
    #[error("twin command dropped before completion")]
    CommandDropped,
}

impl ErrorCode for ExecutorError {
    fn code(&self) -> &'static str {
        match self {
            Self::Stopped => "EXECUTOR_STOPPED",
            Self::CommandDropped => "EXECUTOR_COMMAND_DROPPED",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::CommandDropped)
    }
}
