//! Authorization engine trait.

use crate::{Authorizer, PassThroughPreAuthorizer, PreAuthorizer};
use gantry_types::UserInfo;
use std::sync::Arc;

/// Factory of per-user authorizers.
///
/// The session registry holds at most one engine at a time and builds an
/// [`Authorizer`] and a [`PreAuthorizer`] for every session it creates.
/// Replacing the engine invalidates every session built from the old one.
pub trait AuthorizationEngine: Send + Sync {
    /// Builds the authoritative checker for `user`.
    fn create_authorizer(&self, user: &UserInfo) -> Arc<dyn Authorizer>;

    /// Builds the pre-authorizer for `user`, if the engine has one.
    ///
    /// Returns `None` by default.
    fn create_pre_authorizer(&self, _user: &UserInfo) -> Option<Arc<dyn PreAuthorizer>> {
        None
    }
}

/// Builds the pre-authorizer for `user`, falling back to
/// [`PassThroughPreAuthorizer`] when the engine provides none.
#[must_use]
pub fn pre_authorizer_for(engine: &dyn AuthorizationEngine, user: &UserInfo) -> Arc<dyn PreAuthorizer> {
    engine
        .create_pre_authorizer(user)
        .unwrap_or_else(|| Arc::new(PassThroughPreAuthorizer))
}
