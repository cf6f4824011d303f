//! Session layer errors.

use gantry_auth::NotPermitted;
use gantry_twin::{ExecutorError, TwinError};
use gantry_types::{ErrorCode, SessionId};
use thiserror::Error;

/// Errors returned by [`Session`](crate::Session) and
/// [`SessionRegistry`](crate::SessionRegistry).
///
/// Absent twin elements are not errors: operations return `Ok(None)`
/// once the caller was allowed to know about the absence.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The caller lacks the required permission.
    #[error(transparent)]
    NotPermitted(#[from] NotPermitted),

    /// The session expired, or was expired explicitly.
    #[error("session {0} is expired")]
    Expired(SessionId),

    /// The registry has been closed.
    #[error("session registry is closed")]
    RegistryClosed,

    /// A caller-supplied argument is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The authorization engine kept changing while a session was built.
    #[error("authorization engine changed {retries} times while creating a session")]
    EngineChurn { retries: u32 },

    /// The twin refused the operation.
    #[error(transparent)]
    Twin(#[from] TwinError),

    /// The twin executor did not run the operation.
    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

impl SessionError {
    /// Returns `true` for [`SessionError::NotPermitted`].
    #[must_use]
    pub fn is_not_permitted(&self) -> bool {
        matches!(self, Self::NotPermitted(_))
    }

    /// Returns `true` for [`SessionError::Expired`].
    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired(_))
    }
}

impl ErrorCode for SessionError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotPermitted(e) => e.code(),
            Self::Expired(_) => "SESSION_EXPIRED",
            Self::RegistryClosed => "SESSION_REGISTRY_CLOSED",
            Self::InvalidArgument(_) => "SESSION_INVALID_ARGUMENT",
            Self::EngineChurn { .. } => "SESSION_ENGINE_CHURN",
            Self::Twin(e) => e.code(),
            Self::Executor(e) => e.code(),
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            // A fresh session can be requested.
            Self::Expired(_) | Self::EngineChurn { .. } => true,
            Self::NotPermitted(_) | Self::RegistryClosed | Self::InvalidArgument(_) => false,
            Self::Twin(e) => e.is_recoverable(),
            Self::Executor(e) => e.is_recoverable(),
        }
    }
}
