//! Built-in authorization policies.
//!
//! Used when no external [`AuthorizationEngine`] has been registered. The
//! policy is chosen by configuration (`auth_policy`).

use crate::{AuthorizationEngine, Authorizer, PermissionLevel, PreAuth, PreAuthorizer};
use gantry_types::{ModelRef, UserInfo};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default policy applied by [`PolicyEngine`].
///
/// # Rules
///
/// | Policy | Anonymous | Authenticated |
/// |--------|-----------|---------------|
/// | `AllowAll` | Allowed | Allowed |
/// | `DenyAll` | Denied | Denied |
/// | `AuthenticatedOnly` | Denied | Allowed |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DefaultAuthPolicy {
    /// Every request is granted.
    AllowAll,
    /// Every request is refused.
    #[default]
    DenyAll,
    /// Only non-anonymous users are granted.
    AuthenticatedOnly,
}

impl DefaultAuthPolicy {
    /// Returns the configuration name of this policy.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllowAll => "ALLOW_ALL",
            Self::DenyAll => "DENY_ALL",
            Self::AuthenticatedOnly => "AUTHENTICATED_ONLY",
        }
    }

    /// Parses a configuration name, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALLOW_ALL" => Some(Self::AllowAll),
            "DENY_ALL" => Some(Self::DenyAll),
            "AUTHENTICATED_ONLY" => Some(Self::AuthenticatedOnly),
            _ => None,
        }
    }

    /// Decides for `user`, independently of the target.
    #[must_use]
    pub fn allows(&self, user: &UserInfo) -> bool {
        match self {
            Self::AllowAll => true,
            Self::DenyAll => false,
            Self::AuthenticatedOnly => !user.is_anonymous(),
        }
    }
}

impl std::fmt::Display for DefaultAuthPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine applying a [`DefaultAuthPolicy`] to every user.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyEngine {
    policy: DefaultAuthPolicy,
}

impl PolicyEngine {
    /// Creates an engine for `policy`.
    #[must_use]
    pub fn new(policy: DefaultAuthPolicy) -> Self {
        Self { policy }
    }

    /// Returns the applied policy.
    #[must_use]
    pub fn policy(&self) -> DefaultAuthPolicy {
        self.policy
    }
}

impl AuthorizationEngine for PolicyEngine {
    fn create_authorizer(&self, user: &UserInfo) -> Arc<dyn Authorizer> {
        Arc::new(PolicyAuthorizer::new(self.policy, user.clone()))
    }

    fn create_pre_authorizer(&self, user: &UserInfo) -> Option<Arc<dyn PreAuthorizer>> {
        Some(Arc::new(PolicyAuthorizer::new(self.policy, user.clone())))
    }
}

/// Per-user checker built by [`PolicyEngine`].
///
/// The decision never depends on the target, so the pre-authorizer side
/// always answers definitively.
///
/// # Audit Logging
///
/// - Allowed checks: debug level
/// - Denied checks: warn level
#[derive(Debug, Clone)]
pub struct PolicyAuthorizer {
    policy: DefaultAuthPolicy,
    user: UserInfo,
}

impl PolicyAuthorizer {
    /// Creates a checker for `user`.
    #[must_use]
    pub fn new(policy: DefaultAuthPolicy, user: UserInfo) -> Self {
        Self { policy, user }
    }

    fn decide(&self, level: PermissionLevel, target: &dyn std::fmt::Display) -> bool {
        let allowed = self.policy.allows(&self.user);

        if allowed {
            tracing::debug!(
                user = %self.user,
                policy = %self.policy,
                level = %level,
                target = %target,
                "access allowed"
            );
        } else {
            tracing::warn!(
                user = %self.user,
                policy = %self.policy,
                level = %level,
                target = %target,
                "access denied by default policy"
            );
        }

        allowed
    }
}

impl Authorizer for PolicyAuthorizer {
    fn has_provider_permission(
        &self,
        level: PermissionLevel,
        _model: ModelRef<'_>,
        provider: &str,
    ) -> bool {
        self.decide(level, &provider)
    }

    fn has_service_permission(
        &self,
        level: PermissionLevel,
        _model: ModelRef<'_>,
        provider: &str,
        service: &str,
    ) -> bool {
        self.decide(level, &format_args!("{provider}/{service}"))
    }

    fn has_resource_permission(
        &self,
        level: PermissionLevel,
        _model: ModelRef<'_>,
        provider: &str,
        service: &str,
        resource: &str,
    ) -> bool {
        self.decide(level, &format_args!("{provider}/{service}/{resource}"))
    }
}

impl PreAuthorizer for PolicyAuthorizer {
    fn pre_auth_provider(&self, level: PermissionLevel, provider: &str) -> PreAuth {
        PreAuth::from_decision(self.has_provider_permission(level, ModelRef::UNKNOWN, provider))
    }

    fn pre_auth_service(&self, level: PermissionLevel, provider: &str, service: &str) -> PreAuth {
        PreAuth::from_decision(self.has_service_permission(
            level,
            ModelRef::UNKNOWN,
            provider,
            service,
        ))
    }

    fn pre_auth_resource(
        &self,
        level: PermissionLevel,
        provider: &str,
        service: &str,
        resource: &str,
    ) -> PreAuth {
        PreAuth::from_decision(self.has_resource_permission(
            level,
            ModelRef::UNKNOWN,
            provider,
            service,
            resource,
        ))
    }
}
