//! Point-in-time views of the twin.
//!
//! ```text
//! ProviderSnapshot
//!   ├── services: [ServiceSnapshot]
//!   │       └── resources: [ResourceSnapshot]
//!   └── linked_providers: [LinkedProviderSnapshot]   (only with IncludeLinkedProviderIds)
//! ```
//!
//! Snapshots are owned copies. They are built on the executor thread and
//! handed back to the caller, so they never borrow twin state.

use crate::{ContentType, ResourceType, TimedValue};
use chrono::{DateTime, Utc};
use gantry_types::ModelRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Name of the service every provider carries with its descriptive fields.
pub const ADMIN_SERVICE: &str = "admin";
/// Admin resource holding a human readable name.
pub const FRIENDLY_NAME: &str = "friendlyName";
/// Admin resource holding a free text description.
pub const DESCRIPTION: &str = "description";
/// Admin resource holding an icon reference.
pub const ICON: &str = "icon";
/// Admin resource holding a GeoJSON location.
pub const LOCATION: &str = "location";

/// Anything that identifies a provider and its model.
pub trait ProviderIdentity {
    /// Provider name.
    fn provider_name(&self) -> &str;

    /// Model identifiers of the provider.
    fn model_ref(&self) -> ModelRef<'_>;
}

/// Owned provider identity, carried by service and resource snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ProviderRef {
    /// Provider name.
    pub name: String,
    /// Model package URI.
    pub model_package_uri: Option<String>,
    /// Model name.
    pub model_name: Option<String>,
}

impl ProviderRef {
    /// Creates a provider identity.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        model_package_uri: Option<String>,
        model_name: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model_package_uri,
            model_name,
        }
    }
}

impl ProviderIdentity for ProviderRef {
    fn provider_name(&self) -> &str {
        &self.name
    }

    fn model_ref(&self) -> ModelRef<'_> {
        ModelRef::new(self.model_package_uri.as_deref(), self.model_name.as_deref())
    }
}

/// Options for provider snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotOption {
    /// Fill [`ProviderSnapshot::linked_providers`].
    IncludeLinkedProviderIds,
}

/// Snapshot of a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSnapshot {
    /// Model package URI.
    pub model_package_uri: Option<String>,
    /// Model name.
    pub model_name: Option<String>,
    /// Provider name.
    pub name: String,
    /// When the snapshot was taken.
    pub snapshot_time: DateTime<Utc>,
    /// Services that passed the service filter.
    pub services: Vec<ServiceSnapshot>,
    /// Providers linked to this one.
    pub linked_providers: Vec<LinkedProviderSnapshot>,
}

impl ProviderSnapshot {
    /// Looks up a service by name.
    #[must_use]
    pub fn service(&self, name: &str) -> Option<&ServiceSnapshot> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Iterates over every resource of every service.
    pub fn resources(&self) -> impl Iterator<Item = &ResourceSnapshot> {
        self.services.iter().flat_map(|s| s.resources.iter())
    }
}

impl ProviderIdentity for ProviderSnapshot {
    fn provider_name(&self) -> &str {
        &self.name
    }

    fn model_ref(&self) -> ModelRef<'_> {
        ModelRef::new(self.model_package_uri.as_deref(), self.model_name.as_deref())
    }
}

/// Snapshot of a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    /// Owning provider.
    pub provider: ProviderRef,
    /// Service name.
    pub name: String,
    /// When the snapshot was taken.
    pub snapshot_time: DateTime<Utc>,
    /// Resources that passed the resource filter.
    pub resources: Vec<ResourceSnapshot>,
}

impl ServiceSnapshot {
    /// Looks up a resource by name.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&ResourceSnapshot> {
        self.resources.iter().find(|r| r.name == name)
    }
}

/// Snapshot of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// Owning provider.
    pub provider: ProviderRef,
    /// Owning service name.
    pub service: String,
    /// Resource name.
    pub name: String,
    /// When the snapshot was taken.
    pub snapshot_time: DateTime<Utc>,
    /// Resource kind.
    pub resource_type: ResourceType,
    /// Declared value shape.
    pub content_type: ContentType,
    /// Current value. Always empty for actions.
    pub value: TimedValue,
    /// Current metadata values.
    pub metadata: Map<String, Value>,
}

/// Descriptive view of a provider linked to another one.
///
/// The four optional fields mirror the provider's `admin` resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedProviderSnapshot {
    /// Model package URI.
    pub model_package_uri: Option<String>,
    /// Model name.
    pub model_name: Option<String>,
    /// Provider name.
    pub name: String,
    /// `admin/friendlyName`.
    pub friendly_name: Option<String>,
    /// `admin/description`.
    pub description: Option<String>,
    /// `admin/icon`.
    pub icon: Option<String>,
    /// `admin/location` (GeoJSON).
    pub location: Option<Value>,
    /// When the snapshot was taken.
    pub snapshot_time: DateTime<Utc>,
}

impl ProviderIdentity for LinkedProviderSnapshot {
    fn provider_name(&self) -> &str {
        &self.name
    }

    fn model_ref(&self) -> ModelRef<'_> {
        ModelRef::new(self.model_package_uri.as_deref(), self.model_name.as_deref())
    }
}

/// Shared provider predicate.
pub type ProviderFilter = Arc<dyn Fn(&ProviderSnapshot) -> bool + Send + Sync>;
/// Shared service predicate.
pub type ServiceFilter = Arc<dyn Fn(&ServiceSnapshot) -> bool + Send + Sync>;
/// Shared resource predicate.
pub type ResourceFilter = Arc<dyn Fn(&ResourceSnapshot) -> bool + Send + Sync>;
/// Location predicate; receives the provider's `admin/location` value.
pub type LocationFilter = Arc<dyn Fn(&ProviderSnapshot, Option<&Value>) -> bool + Send + Sync>;
/// Post-filter over a provider and all of its retained resources.
pub type ResourceValueFilter =
    Arc<dyn Fn(&ProviderSnapshot, &[&ResourceSnapshot]) -> bool + Send + Sync>;

/// Client-supplied filters for a filtered snapshot.
///
/// Every filter is optional. They are combined with the caller's
/// permission checks, never replacing them.
///
/// # Example
///
/// ```
/// use gantry_twin::SnapshotCriterion;
///
/// let criterion = SnapshotCriterion::new()
///     .with_provider_filter(|p| p.name.starts_with("sensor"))
///     .with_resource_filter(|r| r.name != "secret");
/// assert!(criterion.provider_filter.is_some());
/// assert!(criterion.location_filter.is_none());
/// ```
#[derive(Clone, Default)]
pub struct SnapshotCriterion {
    /// Keeps providers whose location matches.
    pub location_filter: Option<LocationFilter>,
    /// Keeps matching providers. Sees the provider without its services.
    pub provider_filter: Option<ProviderFilter>,
    /// Keeps matching services.
    pub service_filter: Option<ServiceFilter>,
    /// Keeps matching resources.
    pub resource_filter: Option<ResourceFilter>,
    /// Applied last, to the already filtered tree.
    pub resource_value_filter: Option<ResourceValueFilter>,
}

impl SnapshotCriterion {
    /// Creates a criterion without any filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the location filter.
    #[must_use]
    pub fn with_location_filter(
        mut self,
        f: impl Fn(&ProviderSnapshot, Option<&Value>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.location_filter = Some(Arc::new(f));
        self
    }

    /// Sets the provider filter.
    #[must_use]
    pub fn with_provider_filter(
        mut self,
        f: impl Fn(&ProviderSnapshot) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.provider_filter = Some(Arc::new(f));
        self
    }

    /// Sets the service filter.
    #[must_use]
    pub fn with_service_filter(
        mut self,
        f: impl Fn(&ServiceSnapshot) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.service_filter = Some(Arc::new(f));
        self
    }

    /// Sets the resource filter.
    #[must_use]
    pub fn with_resource_filter(
        mut self,
        f: impl Fn(&ResourceSnapshot) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.resource_filter = Some(Arc::new(f));
        self
    }

    /// Sets the resource value filter.
    #[must_use]
    pub fn with_resource_value_filter(
        mut self,
        f: impl Fn(&ProviderSnapshot, &[&ResourceSnapshot]) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.resource_value_filter = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for SnapshotCriterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCriterion")
            .field("location_filter", &self.location_filter.is_some())
            .field("provider_filter", &self.provider_filter.is_some())
            .field("service_filter", &self.service_filter.is_some())
            .field("resource_filter", &self.resource_filter.is_some())
            .field("resource_value_filter", &self.resource_value_filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(service: &str, name: &str) -> ResourceSnapshot {
        ResourceSnapshot {
            provider: ProviderRef::new("p", None, None),
            service: service.into(),
            name: name.into(),
            snapshot_time: Utc::now(),
            resource_type: ResourceType::Sensor,
            content_type: ContentType::Any,
            value: TimedValue::default(),
            metadata: Map::new(),
        }
    }

    #[test]
    fn provider_snapshot_lookups() {
        let now = Utc::now();
        let snapshot = ProviderSnapshot {
            model_package_uri: Some("uri".into()),
            model_name: Some("Model".into()),
            name: "p".into(),
            snapshot_time: now,
            services: vec![ServiceSnapshot {
                provider: ProviderRef::new("p", None, None),
                name: "temp".into(),
                snapshot_time: now,
                resources: vec![resource("temp", "level"), resource("temp", "unit")],
            }],
            linked_providers: Vec::new(),
        };

        assert_eq!(snapshot.resources().count(), 2);
        let temp = snapshot.service("temp").expect("service present");
        assert!(temp.resource("unit").is_some());
        assert!(snapshot.service("admin").is_none());
        assert_eq!(snapshot.model_ref().name, Some("Model"));
    }

    #[test]
    fn criterion_debug_lists_filters() {
        let criterion = SnapshotCriterion::new().with_service_filter(|_| true);
        let dbg = format!("{criterion:?}");
        assert!(dbg.contains("service_filter: true"), "got: {dbg}");
        assert!(dbg.contains("provider_filter: false"), "got: {dbg}");
    }
}
