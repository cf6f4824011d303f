//! Per-user authorization traits.
//!
//! An [`Authorizer`] is the authoritative decision point. It receives the
//! model identifiers of the target provider, so it can only be asked once
//! the twin has been consulted. A [`PreAuthorizer`] decides without the
//! model and may answer [`PreAuth::Unknown`] to defer to the authorizer.
//!
//! # Architecture
//!
//! ```text
//! AuthorizationEngine (engine.rs)
//!     │  create_authorizer(user)      create_pre_authorizer(user)
//!     ▼                               ▼
//! Authorizer  (THIS)              PreAuthorizer (THIS)
//!     │                               │
//!     └── PolicyAuthorizer            ├── PassThroughPreAuthorizer
//!                                     └── custom (token claims, ...)
//! ```

use crate::{PermissionLevel, PreAuth};
use gantry_types::ModelRef;

/// Authoritative, model-aware permission check for a single user.
///
/// Every method receives the target's [`ModelRef`]. When the target does
/// not exist the caller passes [`ModelRef::UNKNOWN`].
///
/// # Example
///
/// ```
/// use gantry_auth::{Authorizer, PermissionLevel};
/// use gantry_types::ModelRef;
///
/// struct ReadOnly;
///
/// impl Authorizer for ReadOnly {
///     fn has_provider_permission(&self, level: PermissionLevel, _: ModelRef<'_>, _: &str) -> bool {
///         matches!(level, PermissionLevel::Describe | PermissionLevel::Read)
///     }
///     fn has_service_permission(&self, level: PermissionLevel, _: ModelRef<'_>, _: &str, _: &str) -> bool {
///         matches!(level, PermissionLevel::Describe | PermissionLevel::Read)
///     }
///     fn has_resource_permission(
///         &self,
///         level: PermissionLevel,
///         _: ModelRef<'_>,
///         _: &str,
///         _: &str,
///         _: &str,
///     ) -> bool {
///         matches!(level, PermissionLevel::Describe | PermissionLevel::Read)
///     }
/// }
///
/// let auth = ReadOnly;
/// assert!(auth.has_resource_permission(PermissionLevel::Read, ModelRef::UNKNOWN, "p", "s", "r"));
/// assert!(!auth.has_provider_permission(PermissionLevel::Update, ModelRef::UNKNOWN, "p"));
/// ```
pub trait Authorizer: Send + Sync {
    /// Checks `level` on a whole provider.
    fn has_provider_permission(
        &self,
        level: PermissionLevel,
        model: ModelRef<'_>,
        provider: &str,
    ) -> bool;

    /// Checks `level` on a service.
    fn has_service_permission(
        &self,
        level: PermissionLevel,
        model: ModelRef<'_>,
        provider: &str,
        service: &str,
    ) -> bool;

    /// Checks `level` on a resource.
    fn has_resource_permission(
        &self,
        level: PermissionLevel,
        model: ModelRef<'_>,
        provider: &str,
        service: &str,
        resource: &str,
    ) -> bool;
}

/// Model-unaware permission check, run before the twin is consulted.
pub trait PreAuthorizer: Send + Sync {
    /// Pre-checks `level` on a provider.
    fn pre_auth_provider(&self, level: PermissionLevel, provider: &str) -> PreAuth;

    /// Pre-checks `level` on a service.
    fn pre_auth_service(&self, level: PermissionLevel, provider: &str, service: &str) -> PreAuth;

    /// Pre-checks `level` on a resource.
    fn pre_auth_resource(
        &self,
        level: PermissionLevel,
        provider: &str,
        service: &str,
        resource: &str,
    ) -> PreAuth;
}

/// Pre-authorizer that never decides.
///
/// Installed for engines that provide no pre-authorizer, so that every
/// request goes through the authoritative check.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughPreAuthorizer;

impl PreAuthorizer for PassThroughPreAuthorizer {
    fn pre_auth_provider(&self, _level: PermissionLevel, _provider: &str) -> PreAuth {
        PreAuth::Unknown
    }

    fn pre_auth_service(&self, _level: PermissionLevel, _provider: &str, _service: &str) -> PreAuth {
        PreAuth::Unknown
    }

    fn pre_auth_resource(
        &self,
        _level: PermissionLevel,
        _provider: &str,
        _service: &str,
        _resource: &str,
    ) -> PreAuth {
        PreAuth::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_through_is_always_unknown() {
        let pre = PassThroughPreAuthorizer;
        for level in PermissionLevel::ALL {
            assert_eq!(pre.pre_auth_provider(level, "p"), PreAuth::Unknown);
            assert_eq!(pre.pre_auth_service(level, "p", "s"), PreAuth::Unknown);
            assert_eq!(pre.pre_auth_resource(level, "p", "s", "r"), PreAuth::Unknown);
        }
    }
}
