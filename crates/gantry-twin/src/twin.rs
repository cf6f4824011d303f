//! Digital twin contract.
//!
//! The session layer never owns twin state. It only sees the twin through
//! [`DigitalTwin`], and only from inside a command running on the
//! executor thread (see [`crate::TwinExecutor`]).

use crate::snapshot::{
    LocationFilter, ProviderRef, ProviderSnapshot, ResourceSnapshot, ServiceSnapshot,
    SnapshotOption,
};
use crate::{ContentType, GetLevel, ResourceType, TimedValue, TwinError};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Borrowed service predicate used while building snapshots.
pub type ServicePredicate<'a> = &'a dyn Fn(&ServiceSnapshot) -> bool;
/// Borrowed resource predicate used while building snapshots.
pub type ResourcePredicate<'a> = &'a dyn Fn(&ResourceSnapshot) -> bool;
/// Borrowed provider predicate used while building snapshots.
pub type ProviderPredicate<'a> = &'a dyn Fn(&ProviderSnapshot) -> bool;

/// Structural view of a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInfo {
    /// Provider identity.
    pub id: ProviderRef,
    /// Service names.
    pub services: Vec<String>,
    /// Identities of linked providers.
    pub linked_providers: Vec<ProviderRef>,
}

/// Structural view of a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    /// Owning provider.
    pub provider: ProviderRef,
    /// Service name.
    pub name: String,
    /// Resource names.
    pub resources: Vec<String>,
}

/// Structural view of a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    /// Owning provider.
    pub provider: ProviderRef,
    /// Owning service name.
    pub service: String,
    /// Resource name.
    pub name: String,
    /// Resource kind.
    pub resource_type: ResourceType,
    /// Declared value shape.
    pub content_type: ContentType,
    /// Action arguments as `(name, type)` pairs. Empty for non-actions.
    pub arguments: Vec<(String, String)>,
}

/// Access to the digital twin.
///
/// Lookups return `None` for absent elements. Value and metadata
/// operations on absent elements fail with [`TwinError::UnknownTarget`].
pub trait DigitalTwin: Send {
    /// Looks up a provider.
    fn provider(&self, provider: &str) -> Option<ProviderInfo>;

    /// Looks up a service.
    fn service(&self, provider: &str, service: &str) -> Option<ServiceInfo>;

    /// Looks up a resource.
    fn resource(&self, provider: &str, service: &str, resource: &str) -> Option<ResourceInfo>;

    /// Lists every provider.
    fn providers(&self) -> Vec<ProviderInfo>;

    /// Reads a resource value.
    fn get_value(
        &self,
        provider: &str,
        service: &str,
        resource: &str,
        level: GetLevel,
    ) -> Result<TimedValue, TwinError>;

    /// Writes a resource value. Updates older than the current value are ignored.
    fn set_value(
        &mut self,
        provider: &str,
        service: &str,
        resource: &str,
        value: Value,
        timestamp: DateTime<Utc>,
    ) -> Result<(), TwinError>;

    /// Reads every metadata value of a resource.
    fn metadata(
        &self,
        provider: &str,
        service: &str,
        resource: &str,
    ) -> Result<Map<String, Value>, TwinError>;

    /// Reads one metadata value. A missing key yields an empty [`TimedValue`].
    fn metadata_value(
        &self,
        provider: &str,
        service: &str,
        resource: &str,
        key: &str,
    ) -> Result<TimedValue, TwinError>;

    /// Writes one metadata value.
    fn set_metadata_value(
        &mut self,
        provider: &str,
        service: &str,
        resource: &str,
        key: &str,
        value: Value,
        timestamp: DateTime<Utc>,
    ) -> Result<(), TwinError>;

    /// Invokes an action resource.
    fn act(
        &mut self,
        provider: &str,
        service: &str,
        resource: &str,
        parameters: Map<String, Value>,
    ) -> Result<Value, TwinError>;

    /// Snapshots one provider, keeping the services and resources that
    /// pass the predicates.
    fn snapshot_provider(
        &self,
        provider: &str,
        service_filter: ServicePredicate<'_>,
        resource_filter: ResourcePredicate<'_>,
        options: &[SnapshotOption],
    ) -> Option<ProviderSnapshot>;

    /// Snapshots one service.
    fn snapshot_service(
        &self,
        provider: &str,
        service: &str,
        resource_filter: ResourcePredicate<'_>,
    ) -> Option<ServiceSnapshot>;

    /// Snapshots one resource.
    fn snapshot_resource(
        &self,
        provider: &str,
        service: &str,
        resource: &str,
    ) -> Option<ResourceSnapshot>;

    /// Snapshots every provider passing the predicates.
    ///
    /// The provider predicate is evaluated before the location filter. Both
    /// see a snapshot without services or linked providers, and services are
    /// only collected for providers passing them.
    fn filtered_snapshot(
        &self,
        location_filter: Option<&LocationFilter>,
        provider_filter: ProviderPredicate<'_>,
        service_filter: ServicePredicate<'_>,
        resource_filter: ResourcePredicate<'_>,
        options: &[SnapshotOption],
    ) -> Vec<ProviderSnapshot>;

    /// Links `child` to `parent`. Linking twice is a no-op.
    fn add_linked_provider(&mut self, parent: &str, child: &str) -> Result<(), TwinError>;

    /// Unlinks `child` from `parent`. Unlinking a missing link is a no-op.
    fn remove_linked_provider(&mut self, parent: &str, child: &str) -> Result<(), TwinError>;
}
