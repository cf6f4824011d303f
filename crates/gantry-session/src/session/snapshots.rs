//! Snapshots, provider descriptions and provider links.
//!
//! Services and resources a caller cannot DESCRIBE are filtered out while
//! the snapshot is built. Linked providers are redacted afterwards.

use super::Session;
use crate::description::ProviderDescription;
use crate::SessionError;
use gantry_auth::PermissionLevel;
use gantry_twin::{
    execute, ProviderIdentity, ProviderSnapshot, ResourceSnapshot, ServiceSnapshot,
    SnapshotCriterion, SnapshotOption,
};
use gantry_types::{ModelRef, TwinPath};

impl Session {
    /// Snapshots a provider with the services and resources the caller
    /// can describe.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotPermitted`] without DESCRIBE access to the provider.
    pub async fn provider_snapshot(
        &self,
        provider: &str,
        options: &[SnapshotOption],
    ) -> Result<Option<ProviderSnapshot>, SessionError> {
        self.snapshot_provider(provider, true, options).await
    }

    async fn snapshot_provider(
        &self,
        provider: &str,
        include_resources: bool,
        options: &[SnapshotOption],
    ) -> Result<Option<ProviderSnapshot>, SessionError> {
        self.ensure_live()?;
        let level = PermissionLevel::Describe;
        let pre = self.pre_authorizer.pre_auth_provider(level, provider);
        if pre.is_denied() {
            return Err(self
                .guard
                .denied(level, TwinPath::provider_path(provider))
                .into());
        }

        let guard = self.guard.clone();
        let p = provider.to_owned();
        let options = options.to_vec();
        let snapshot = execute(
            self.executor.as_ref(),
            move |twin| -> Result<Option<ProviderSnapshot>, SessionError> {
                if pre.needs_authoritative_check() {
                    let Some(info) = twin.provider(&p) else {
                        guard.require_provider(level, ModelRef::UNKNOWN, &p)?;
                        return Ok(None);
                    };
                    guard.require_provider(level, info.id.model_ref(), &p)?;
                }
                let services = |s: &ServiceSnapshot| guard.authorize_service(s);
                let resources =
                    |r: &ResourceSnapshot| include_resources && guard.authorize_resource(r);
                Ok(twin.snapshot_provider(&p, &services, &resources, &options))
            },
        )
        .await??;

        Ok(snapshot.map(|s| self.guard.authorized_links(s)))
    }

    /// Snapshots a service with the resources the caller can describe.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotPermitted`] without DESCRIBE access to the service.
    pub async fn service_snapshot(
        &self,
        provider: &str,
        service: &str,
    ) -> Result<Option<ServiceSnapshot>, SessionError> {
        self.ensure_live()?;
        let level = PermissionLevel::Describe;
        let pre = self.pre_authorizer.pre_auth_service(level, provider, service);
        if pre.is_denied() {
            return Err(self
                .guard
                .denied(level, TwinPath::service(provider, service))
                .into());
        }

        let guard = self.guard.clone();
        let (p, s) = (provider.to_owned(), service.to_owned());
        execute(
            self.executor.as_ref(),
            move |twin| -> Result<Option<ServiceSnapshot>, SessionError> {
                if pre.needs_authoritative_check() {
                    let Some(info) = twin.provider(&p) else {
                        guard.require_service(level, ModelRef::UNKNOWN, &p, &s)?;
                        return Ok(None);
                    };
                    guard.require_service(level, info.id.model_ref(), &p, &s)?;
                }
                let resources = |r: &ResourceSnapshot| guard.authorize_resource(r);
                Ok(twin.snapshot_service(&p, &s, &resources))
            },
        )
        .await?
    }

    /// Snapshots a single resource.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotPermitted`] without DESCRIBE access to the resource.
    pub async fn resource_snapshot(
        &self,
        provider: &str,
        service: &str,
        resource: &str,
    ) -> Result<Option<ResourceSnapshot>, SessionError> {
        self.ensure_live()?;
        let level = PermissionLevel::Describe;
        let pre = self
            .pre_authorizer
            .pre_auth_resource(level, provider, service, resource);
        if pre.is_denied() {
            let path = TwinPath::resource(provider, service, resource);
            return Err(self.guard.denied(level, path).into());
        }

        let guard = self.guard.clone();
        let (p, s, r) = (provider.to_owned(), service.to_owned(), resource.to_owned());
        execute(
            self.executor.as_ref(),
            move |twin| -> Result<Option<ResourceSnapshot>, SessionError> {
                if pre.needs_authoritative_check() {
                    let Some(info) = twin.provider(&p) else {
                        guard.require_resource(level, ModelRef::UNKNOWN, &p, &s, &r)?;
                        return Ok(None);
                    };
                    guard.require_resource(level, info.id.model_ref(), &p, &s, &r)?;
                }
                Ok(twin.snapshot_resource(&p, &s, &r))
            },
        )
        .await?
    }

    /// Snapshots every provider the caller can describe, narrowed by
    /// `criterion`.
    ///
    /// The client filters are combined with the permission checks, never
    /// substituted for them. A location filter additionally requires READ
    /// access to `admin/location`. The resource value filter runs last, on
    /// the already filtered tree.
    ///
    /// # Errors
    ///
    /// Only the errors common to every data-plane call. Invisible
    /// providers are silently left out.
    pub async fn filtered_snapshot(
        &self,
        criterion: Option<&SnapshotCriterion>,
        options: &[SnapshotOption],
    ) -> Result<Vec<ProviderSnapshot>, SessionError> {
        self.ensure_live()?;
        let criterion = criterion.cloned().unwrap_or_default();
        let value_filter = criterion.resource_value_filter.clone();
        let guard = self.guard.clone();
        let options = options.to_vec();

        let mut snapshots = execute(self.executor.as_ref(), move |twin| {
            let use_location = criterion.location_filter.is_some();
            let providers = |ps: &ProviderSnapshot| {
                guard.authorize_provider(ps, use_location)
                    && criterion.provider_filter.as_ref().map_or(true, |f| f(ps))
            };
            let services = |ss: &ServiceSnapshot| {
                guard.authorize_service(ss)
                    && criterion.service_filter.as_ref().map_or(true, |f| f(ss))
            };
            let resources = |rs: &ResourceSnapshot| {
                guard.authorize_resource(rs)
                    && criterion.resource_filter.as_ref().map_or(true, |f| f(rs))
            };
            twin.filtered_snapshot(
                criterion.location_filter.as_ref(),
                &providers,
                &services,
                &resources,
                &options,
            )
        })
        .await?;

        if let Some(filter) = value_filter {
            snapshots.retain(|ps| {
                let resources: Vec<&ResourceSnapshot> = ps.resources().collect();
                filter(ps, &resources)
            });
        }

        Ok(snapshots
            .into_iter()
            .map(|ps| self.guard.authorized_links(ps))
            .collect())
    }

    // === Providers ===

    /// Describes a provider: its visible services and linked providers.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotPermitted`] without DESCRIBE access to the provider.
    pub async fn describe_provider(
        &self,
        provider: &str,
    ) -> Result<Option<ProviderDescription>, SessionError> {
        let snapshot = self
            .snapshot_provider(provider, false, &[SnapshotOption::IncludeLinkedProviderIds])
            .await?;
        Ok(snapshot.as_ref().map(ProviderDescription::from))
    }

    /// Describes every provider the caller can describe.
    ///
    /// Services and linked providers the caller cannot describe are left out.
    ///
    /// # Errors
    ///
    /// Only the errors common to every data-plane call.
    pub async fn list_providers(&self) -> Result<Vec<ProviderDescription>, SessionError> {
        self.ensure_live()?;
        let providers = execute(self.executor.as_ref(), |twin| twin.providers()).await?;

        Ok(providers
            .into_iter()
            .filter(|info| self.guard.can_describe_provider(&info.id))
            .map(|info| {
                let model = info.id.model_ref();
                let services = info
                    .services
                    .iter()
                    .filter(|s| {
                        self.authorizer.has_service_permission(
                            PermissionLevel::Describe,
                            model,
                            &info.id.name,
                            s,
                        )
                    })
                    .cloned()
                    .collect();
                let linked_providers = info
                    .linked_providers
                    .iter()
                    .filter(|linked| self.guard.can_describe_provider(*linked))
                    .map(|linked| linked.name.clone())
                    .collect();
                ProviderDescription {
                    provider: info.id.name.clone(),
                    model_package_uri: info.id.model_package_uri.clone(),
                    model_name: info.id.model_name.clone(),
                    services,
                    linked_providers,
                }
            })
            .collect())
    }

    /// Links `child` to `parent` and describes `parent` afterwards.
    ///
    /// `Ok(None)` if either provider does not exist.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotPermitted`] without UPDATE access to both providers.
    pub async fn link_providers(
        &self,
        parent: &str,
        child: &str,
    ) -> Result<Option<ProviderDescription>, SessionError> {
        self.update_link(parent, child, LinkChange::Link).await
    }

    /// Unlinks `child` from `parent` and describes `parent` afterwards.
    ///
    /// `Ok(None)` if either provider does not exist.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotPermitted`] without UPDATE access to both providers.
    pub async fn unlink_providers(
        &self,
        parent: &str,
        child: &str,
    ) -> Result<Option<ProviderDescription>, SessionError> {
        self.update_link(parent, child, LinkChange::Unlink).await
    }

    async fn update_link(
        &self,
        parent: &str,
        child: &str,
        change: LinkChange,
    ) -> Result<Option<ProviderDescription>, SessionError> {
        self.ensure_live()?;
        let level = PermissionLevel::Update;
        let pre_parent = self.pre_authorizer.pre_auth_provider(level, parent);
        let pre_child = self.pre_authorizer.pre_auth_provider(level, child);
        for (pre, name) in [(pre_parent, parent), (pre_child, child)] {
            if pre.is_denied() {
                return Err(self
                    .guard
                    .denied(level, TwinPath::provider_path(name))
                    .into());
            }
        }

        let guard = self.guard.clone();
        let (parent, child) = (parent.to_owned(), child.to_owned());
        let snapshot = execute(
            self.executor.as_ref(),
            move |twin| -> Result<Option<ProviderSnapshot>, SessionError> {
                let mut present = true;
                for (pre, name) in [(pre_parent, &parent), (pre_child, &child)] {
                    let info = twin.provider(name);
                    if pre.needs_authoritative_check() {
                        let model = info.as_ref().map_or(ModelRef::UNKNOWN, |i| i.id.model_ref());
                        guard.require_provider(level, model, name)?;
                    }
                    present &= info.is_some();
                }
                if !present {
                    return Ok(None);
                }

                match change {
                    LinkChange::Link => twin.add_linked_provider(&parent, &child)?,
                    LinkChange::Unlink => twin.remove_linked_provider(&parent, &child)?,
                }
                tracing::debug!(parent = %parent, child = %child, ?change, "Provider link updated");

                let services = |s: &ServiceSnapshot| guard.authorize_service(s);
                Ok(twin.snapshot_provider(
                    &parent,
                    &services,
                    &|_: &ResourceSnapshot| false,
                    &[SnapshotOption::IncludeLinkedProviderIds],
                ))
            },
        )
        .await??;

        Ok(snapshot
            .map(|s| self.guard.authorized_links(s))
            .as_ref()
            .map(ProviderDescription::from))
    }
}

#[derive(Debug, Clone, Copy)]
enum LinkChange {
    Link,
    Unlink,
}
