//! Permission checks and snapshot redaction for one caller.
//!
//! An [`AccessGuard`] is cheap to clone and `Send + Sync`, so copies of it
//! travel into twin commands and into snapshot predicates.

use gantry_auth::{Authorizer, NotPermitted, PermissionLevel};
use gantry_twin::{
    LinkedProviderSnapshot, ProviderIdentity, ProviderSnapshot, ResourceSnapshot,
    ServiceSnapshot, ADMIN_SERVICE, DESCRIPTION, FRIENDLY_NAME, ICON, LOCATION,
};
use gantry_types::{ModelRef, TwinPath};
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AccessGuard {
    user_id: Arc<str>,
    authorizer: Arc<dyn Authorizer>,
}

impl AccessGuard {
    pub(crate) fn new(user_id: &str, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            user_id: Arc::from(user_id),
            authorizer,
        }
    }

    pub(crate) fn denied(&self, level: PermissionLevel, path: TwinPath) -> NotPermitted {
        NotPermitted::new(self.user_id.as_ref(), level, path)
    }

    pub(crate) fn require_provider(
        &self,
        level: PermissionLevel,
        model: ModelRef<'_>,
        provider: &str,
    ) -> Result<(), NotPermitted> {
        if self.authorizer.has_provider_permission(level, model, provider) {
            Ok(())
        } else {
            Err(self.denied(level, TwinPath::provider_path(provider)))
        }
    }

    pub(crate) fn require_service(
        &self,
        level: PermissionLevel,
        model: ModelRef<'_>,
        provider: &str,
        service: &str,
    ) -> Result<(), NotPermitted> {
        if self
            .authorizer
            .has_service_permission(level, model, provider, service)
        {
            Ok(())
        } else {
            Err(self.denied(level, TwinPath::service(provider, service)))
        }
    }

    pub(crate) fn require_resource(
        &self,
        level: PermissionLevel,
        model: ModelRef<'_>,
        provider: &str,
        service: &str,
        resource: &str,
    ) -> Result<(), NotPermitted> {
        if self
            .authorizer
            .has_resource_permission(level, model, provider, service, resource)
        {
            Ok(())
        } else {
            Err(self.denied(level, TwinPath::resource(provider, service, resource)))
        }
    }

    pub(crate) fn can_describe_provider(&self, provider: &impl ProviderIdentity) -> bool {
        self.authorizer.has_provider_permission(
            PermissionLevel::Describe,
            provider.model_ref(),
            provider.provider_name(),
        )
    }

    /// Provider predicate for snapshots. With `use_location`, the caller
    /// must also be able to read `admin/location`, since a location filter
    /// would otherwise reveal it.
    pub(crate) fn authorize_provider(&self, snapshot: &ProviderSnapshot, use_location: bool) -> bool {
        if use_location && !self.can_read_admin(snapshot, LOCATION) {
            return false;
        }
        self.can_describe_provider(snapshot)
    }

    pub(crate) fn authorize_service(&self, snapshot: &ServiceSnapshot) -> bool {
        self.authorizer.has_service_permission(
            PermissionLevel::Describe,
            snapshot.provider.model_ref(),
            &snapshot.provider.name,
            &snapshot.name,
        )
    }

    pub(crate) fn authorize_resource(&self, snapshot: &ResourceSnapshot) -> bool {
        self.authorizer.has_resource_permission(
            PermissionLevel::Describe,
            snapshot.provider.model_ref(),
            &snapshot.provider.name,
            &snapshot.service,
            &snapshot.name,
        )
    }

    /// Redacts the linked providers of `snapshot`. Services and resources
    /// are left untouched.
    pub(crate) fn authorized_links(&self, mut snapshot: ProviderSnapshot) -> ProviderSnapshot {
        snapshot.linked_providers = std::mem::take(&mut snapshot.linked_providers)
            .into_iter()
            .filter_map(|linked| self.redact_linked(linked))
            .collect();
        snapshot
    }

    /// Drops an invisible linked provider, and blanks each admin field the
    /// caller cannot read.
    fn redact_linked(&self, mut linked: LinkedProviderSnapshot) -> Option<LinkedProviderSnapshot> {
        if !self.can_describe_provider(&linked) {
            return None;
        }

        let hide_friendly_name =
            linked.friendly_name.is_some() && !self.can_read_admin(&linked, FRIENDLY_NAME);
        let hide_description =
            linked.description.is_some() && !self.can_read_admin(&linked, DESCRIPTION);
        let hide_icon = linked.icon.is_some() && !self.can_read_admin(&linked, ICON);
        let hide_location = linked.location.is_some() && !self.can_read_admin(&linked, LOCATION);

        if hide_friendly_name {
            linked.friendly_name = None;
        }
        if hide_description {
            linked.description = None;
        }
        if hide_icon {
            linked.icon = None;
        }
        if hide_location {
            linked.location = None;
        }
        Some(linked)
    }

    fn can_read_admin(&self, provider: &impl ProviderIdentity, resource: &str) -> bool {
        self.authorizer.has_resource_permission(
            PermissionLevel::Read,
            provider.model_ref(),
            provider.provider_name(),
            ADMIN_SERVICE,
            resource,
        )
    }
}
