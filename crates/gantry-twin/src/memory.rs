//! In-memory digital twin.
//!
//! A complete [`DigitalTwin`] kept in ordered maps. Every provider gets an
//! `admin` service with `friendlyName`, `description`, `icon` and
//! `location` resources on creation. Changes are reported to an optional
//! notification sink, in the shape the session registry consumes.

use crate::snapshot::{
    LinkedProviderSnapshot, LocationFilter, ProviderRef, ProviderSnapshot, ResourceSnapshot,
    ServiceSnapshot, SnapshotOption, ADMIN_SERVICE, DESCRIPTION, FRIENDLY_NAME, ICON, LOCATION,
};
use crate::twin::{
    ProviderInfo, ProviderPredicate, ResourceInfo, ResourcePredicate, ServiceInfo,
    ServicePredicate,
};
use crate::{ContentType, DigitalTwin, GetLevel, ResourceType, TimedValue, TwinError};
use chrono::{DateTime, Utc};
use gantry_event::{LifecycleStatus, ResourceNotification};
use gantry_types::TwinPath;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Handler invoked by [`DigitalTwin::act`].
pub type ActionHandler =
    Box<dyn Fn(&Map<String, Value>) -> Result<Value, String> + Send + 'static>;

/// Receiver of twin change notifications.
pub type NotificationSink = Box<dyn Fn(&ResourceNotification) + Send + 'static>;

struct ResourceEntry {
    resource_type: ResourceType,
    content_type: ContentType,
    value: TimedValue,
    metadata: BTreeMap<String, TimedValue>,
    arguments: Vec<(String, String)>,
    handler: Option<ActionHandler>,
}

impl ResourceEntry {
    fn new(resource_type: ResourceType, content_type: ContentType) -> Self {
        Self {
            resource_type,
            content_type,
            value: TimedValue::default(),
            metadata: BTreeMap::new(),
            arguments: Vec::new(),
            handler: None,
        }
    }

    fn metadata_map(&self) -> Map<String, Value> {
        self.metadata
            .iter()
            .filter_map(|(k, tv)| tv.value.clone().map(|v| (k.clone(), v)))
            .collect()
    }
}

#[derive(Default)]
struct ServiceEntry {
    resources: BTreeMap<String, ResourceEntry>,
}

struct ProviderEntry {
    id: ProviderRef,
    services: BTreeMap<String, ServiceEntry>,
    linked: Vec<String>,
}

/// Reference twin implementation.
///
/// # Example
///
/// ```
/// use gantry_twin::{ContentType, DigitalTwin, GetLevel, InMemoryTwin, ResourceType};
/// use serde_json::json;
///
/// let mut twin = InMemoryTwin::new();
/// twin.add_provider("sensor1", Some("https://example.org/model"), Some("Sensor")).unwrap();
/// twin.add_resource("sensor1", "temp", "level", ResourceType::Sensor, ContentType::Number).unwrap();
/// twin.update_value("sensor1", "temp", "level", json!(21.5)).unwrap();
///
/// let tv = twin.get_value("sensor1", "temp", "level", GetLevel::Normal).unwrap();
/// assert_eq!(tv.value, Some(json!(21.5)));
/// ```
#[derive(Default)]
pub struct InMemoryTwin {
    providers: BTreeMap<String, ProviderEntry>,
    sink: Option<NotificationSink>,
}

impl InMemoryTwin {
    /// Creates an empty twin.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends every subsequent change to `sink`.
    pub fn on_notification(&mut self, sink: impl Fn(&ResourceNotification) + Send + 'static) {
        self.sink = Some(Box::new(sink));
    }

    /// Creates a provider with its `admin` service.
    ///
    /// # Errors
    ///
    /// [`TwinError::AlreadyExists`] if the provider exists.
    pub fn add_provider(
        &mut self,
        name: &str,
        model_package_uri: Option<&str>,
        model_name: Option<&str>,
    ) -> Result<(), TwinError> {
        if self.providers.contains_key(name) {
            return Err(TwinError::AlreadyExists {
                path: TwinPath::provider_path(name),
            });
        }
        let mut admin = ServiceEntry::default();
        for resource in [FRIENDLY_NAME, DESCRIPTION, ICON] {
            admin.resources.insert(
                resource.to_string(),
                ResourceEntry::new(ResourceType::Property, ContentType::String),
            );
        }
        admin.resources.insert(
            LOCATION.to_string(),
            ResourceEntry::new(ResourceType::Property, ContentType::Object),
        );

        let id = ProviderRef::new(
            name,
            model_package_uri.map(str::to_string),
            model_name.map(str::to_string),
        );
        let mut services = BTreeMap::new();
        services.insert(ADMIN_SERVICE.to_string(), admin);
        self.providers.insert(
            name.to_string(),
            ProviderEntry {
                id,
                services,
                linked: Vec::new(),
            },
        );
        self.emit(name, |p| {
            ResourceNotification::lifecycle(p, None, None, LifecycleStatus::ProviderCreated, None)
        });
        Ok(())
    }

    /// Removes a provider and every link pointing to it.
    ///
    /// # Errors
    ///
    /// [`TwinError::UnknownTarget`] if the provider does not exist.
    pub fn remove_provider(&mut self, name: &str) -> Result<(), TwinError> {
        if !self.providers.contains_key(name) {
            return Err(TwinError::unknown(TwinPath::provider_path(name)));
        }
        self.emit(name, |p| {
            ResourceNotification::lifecycle(p, None, None, LifecycleStatus::ProviderDeleted, None)
        });
        self.providers.remove(name);
        for entry in self.providers.values_mut() {
            entry.linked.retain(|l| l != name);
        }
        Ok(())
    }

    /// Creates a data resource, creating its service if needed.
    ///
    /// # Errors
    ///
    /// - [`TwinError::UnknownTarget`] if the provider does not exist
    /// - [`TwinError::AlreadyExists`] if the resource exists
    pub fn add_resource(
        &mut self,
        provider: &str,
        service: &str,
        resource: &str,
        resource_type: ResourceType,
        content_type: ContentType,
    ) -> Result<(), TwinError> {
        self.insert_resource(
            provider,
            service,
            resource,
            ResourceEntry::new(resource_type, content_type),
        )
    }

    /// Creates an action resource.
    ///
    /// # Errors
    ///
    /// Same as [`add_resource`](Self::add_resource).
    pub fn add_action(
        &mut self,
        provider: &str,
        service: &str,
        resource: &str,
        arguments: Vec<(String, String)>,
        handler: impl Fn(&Map<String, Value>) -> Result<Value, String> + Send + 'static,
    ) -> Result<(), TwinError> {
        let mut entry = ResourceEntry::new(ResourceType::Action, ContentType::Any);
        entry.arguments = arguments;
        entry.handler = Some(Box::new(handler));
        self.insert_resource(provider, service, resource, entry)
    }

    /// Sets a value stamped with the current time.
    ///
    /// # Errors
    ///
    /// Same as [`DigitalTwin::set_value`].
    pub fn update_value(
        &mut self,
        provider: &str,
        service: &str,
        resource: &str,
        value: Value,
    ) -> Result<(), TwinError> {
        self.set_value(provider, service, resource, value, Utc::now())
    }

    fn insert_resource(
        &mut self,
        provider: &str,
        service: &str,
        resource: &str,
        entry: ResourceEntry,
    ) -> Result<(), TwinError> {
        let p = self
            .providers
            .get_mut(provider)
            .ok_or_else(|| TwinError::unknown(TwinPath::provider_path(provider)))?;
        let new_service = !p.services.contains_key(service);
        let svc = p.services.entry(service.to_string()).or_default();
        if svc.resources.contains_key(resource) {
            return Err(TwinError::AlreadyExists {
                path: TwinPath::resource(provider, service, resource),
            });
        }
        svc.resources.insert(resource.to_string(), entry);

        if new_service {
            self.emit(provider, |p| {
                ResourceNotification::lifecycle(
                    p,
                    Some(service.to_string()),
                    None,
                    LifecycleStatus::ServiceCreated,
                    None,
                )
            });
        }
        self.emit(provider, |p| {
            ResourceNotification::lifecycle(
                p,
                Some(service.to_string()),
                Some(resource.to_string()),
                LifecycleStatus::ResourceCreated,
                None,
            )
        });
        Ok(())
    }

    fn emit(&self, provider: &str, build: impl FnOnce(&str) -> ResourceNotification) {
        let Some(sink) = &self.sink else {
            return;
        };
        let mut notification = build(provider);
        if let Some(entry) = self.providers.get(provider) {
            notification.model_package_uri = entry.id.model_package_uri.clone();
            notification.model = entry.id.model_name.clone();
        }
        sink(&notification);
    }

    fn entry(&self, provider: &str, service: &str, resource: &str) -> Result<&ResourceEntry, TwinError> {
        self.providers
            .get(provider)
            .and_then(|p| p.services.get(service))
            .and_then(|s| s.resources.get(resource))
            .ok_or_else(|| TwinError::unknown(TwinPath::resource(provider, service, resource)))
    }

    fn entry_mut(
        &mut self,
        provider: &str,
        service: &str,
        resource: &str,
    ) -> Result<&mut ResourceEntry, TwinError> {
        self.providers
            .get_mut(provider)
            .and_then(|p| p.services.get_mut(service))
            .and_then(|s| s.resources.get_mut(resource))
            .ok_or_else(|| TwinError::unknown(TwinPath::resource(provider, service, resource)))
    }

    fn admin_value(&self, provider: &ProviderEntry, resource: &str) -> Option<Value> {
        provider
            .services
            .get(ADMIN_SERVICE)
            .and_then(|s| s.resources.get(resource))
            .and_then(|r| r.value.value.clone())
            .filter(|v| !v.is_null())
    }

    fn admin_string(&self, provider: &ProviderEntry, resource: &str) -> Option<String> {
        self.admin_value(provider, resource)
            .and_then(|v| v.as_str().map(str::to_string))
    }

    fn resource_snapshot(
        id: &ProviderRef,
        service: &str,
        name: &str,
        entry: &ResourceEntry,
        now: DateTime<Utc>,
    ) -> ResourceSnapshot {
        ResourceSnapshot {
            provider: id.clone(),
            service: service.to_string(),
            name: name.to_string(),
            snapshot_time: now,
            resource_type: entry.resource_type,
            content_type: entry.content_type,
            value: entry.value.clone(),
            metadata: entry.metadata_map(),
        }
    }

    fn service_snapshot(
        id: &ProviderRef,
        name: &str,
        entry: &ServiceEntry,
        resource_filter: ResourcePredicate<'_>,
        now: DateTime<Utc>,
    ) -> ServiceSnapshot {
        let resources = entry
            .resources
            .iter()
            .map(|(r, e)| Self::resource_snapshot(id, name, r, e, now))
            .filter(|rs| resource_filter(rs))
            .collect();
        ServiceSnapshot {
            provider: id.clone(),
            name: name.to_string(),
            snapshot_time: now,
            resources,
        }
    }

    fn linked_snapshot(&self, entry: &ProviderEntry, now: DateTime<Utc>) -> LinkedProviderSnapshot {
        LinkedProviderSnapshot {
            model_package_uri: entry.id.model_package_uri.clone(),
            model_name: entry.id.model_name.clone(),
            name: entry.id.name.clone(),
            friendly_name: self.admin_string(entry, FRIENDLY_NAME),
            description: self.admin_string(entry, DESCRIPTION),
            icon: self.admin_string(entry, ICON),
            location: self.admin_value(entry, LOCATION),
            snapshot_time: now,
        }
    }

    fn provider_snapshot(
        &self,
        entry: &ProviderEntry,
        service_filter: ServicePredicate<'_>,
        resource_filter: ResourcePredicate<'_>,
        options: &[SnapshotOption],
        now: DateTime<Utc>,
    ) -> ProviderSnapshot {
        let services = entry
            .services
            .iter()
            .filter(|(name, _)| {
                // Evaluate the service predicate before collecting resources.
                let header = ServiceSnapshot {
                    provider: entry.id.clone(),
                    name: (*name).clone(),
                    snapshot_time: now,
                    resources: Vec::new(),
                };
                service_filter(&header)
            })
            .map(|(name, svc)| Self::service_snapshot(&entry.id, name, svc, resource_filter, now))
            .collect();

        let linked_providers = if options.contains(&SnapshotOption::IncludeLinkedProviderIds) {
            entry
                .linked
                .iter()
                .filter_map(|l| self.providers.get(l))
                .map(|l| self.linked_snapshot(l, now))
                .collect()
        } else {
            Vec::new()
        };

        ProviderSnapshot {
            services,
            linked_providers,
            ..Self::provider_header(entry, now)
        }
    }

    /// A provider snapshot without services or links.
    fn provider_header(entry: &ProviderEntry, now: DateTime<Utc>) -> ProviderSnapshot {
        ProviderSnapshot {
            model_package_uri: entry.id.model_package_uri.clone(),
            model_name: entry.id.model_name.clone(),
            name: entry.id.name.clone(),
            snapshot_time: now,
            services: Vec::new(),
            linked_providers: Vec::new(),
        }
    }

    fn info(&self, entry: &ProviderEntry) -> ProviderInfo {
        ProviderInfo {
            id: entry.id.clone(),
            services: entry.services.keys().cloned().collect(),
            linked_providers: entry
                .linked
                .iter()
                .filter_map(|l| self.providers.get(l))
                .map(|l| l.id.clone())
                .collect(),
        }
    }
}

impl DigitalTwin for InMemoryTwin {
    fn provider(&self, provider: &str) -> Option<ProviderInfo> {
        self.providers.get(provider).map(|p| self.info(p))
    }

    fn service(&self, provider: &str, service: &str) -> Option<ServiceInfo> {
        let p = self.providers.get(provider)?;
        let s = p.services.get(service)?;
        Some(ServiceInfo {
            provider: p.id.clone(),
            name: service.to_string(),
            resources: s.resources.keys().cloned().collect(),
        })
    }

    fn resource(&self, provider: &str, service: &str, resource: &str) -> Option<ResourceInfo> {
        let p = self.providers.get(provider)?;
        let r = p.services.get(service)?.resources.get(resource)?;
        Some(ResourceInfo {
            provider: p.id.clone(),
            service: service.to_string(),
            name: resource.to_string(),
            resource_type: r.resource_type,
            content_type: r.content_type,
            arguments: r.arguments.clone(),
        })
    }

    fn providers(&self) -> Vec<ProviderInfo> {
        self.providers.values().map(|p| self.info(p)).collect()
    }

    fn get_value(
        &self,
        provider: &str,
        service: &str,
        resource: &str,
        _level: GetLevel,
    ) -> Result<TimedValue, TwinError> {
        let entry = self.entry(provider, service, resource)?;
        if entry.resource_type.is_action() {
            return Err(TwinError::WrongResourceType {
                path: TwinPath::resource(provider, service, resource),
                actual: entry.resource_type,
            });
        }
        Ok(entry.value.clone())
    }

    fn set_value(
        &mut self,
        provider: &str,
        service: &str,
        resource: &str,
        value: Value,
        timestamp: DateTime<Utc>,
    ) -> Result<(), TwinError> {
        let entry = self.entry_mut(provider, service, resource)?;
        let path = || TwinPath::resource(provider, service, resource);
        if entry.resource_type.is_action() {
            return Err(TwinError::WrongResourceType {
                path: path(),
                actual: entry.resource_type,
            });
        }
        if !entry.content_type.accepts(&value) {
            return Err(TwinError::InvalidValue {
                path: path(),
                reason: format!("expected {}", entry.content_type),
            });
        }
        if entry.value.timestamp.is_some_and(|current| current > timestamp) {
            tracing::debug!(path = %path(), "ignoring out-of-date value");
            return Ok(());
        }
        let old = std::mem::replace(&mut entry.value, TimedValue::new(value, timestamp));
        let new = entry.value.value.clone();
        self.emit(provider, |p| {
            ResourceNotification::data(p, service, resource, old.value, new).at(timestamp)
        });
        Ok(())
    }

    fn metadata(
        &self,
        provider: &str,
        service: &str,
        resource: &str,
    ) -> Result<Map<String, Value>, TwinError> {
        Ok(self.entry(provider, service, resource)?.metadata_map())
    }

    fn metadata_value(
        &self,
        provider: &str,
        service: &str,
        resource: &str,
        key: &str,
    ) -> Result<TimedValue, TwinError> {
        let entry = self.entry(provider, service, resource)?;
        Ok(entry.metadata.get(key).cloned().unwrap_or_default())
    }

    fn set_metadata_value(
        &mut self,
        provider: &str,
        service: &str,
        resource: &str,
        key: &str,
        value: Value,
        timestamp: DateTime<Utc>,
    ) -> Result<(), TwinError> {
        let entry = self.entry_mut(provider, service, resource)?;
        let old = entry.metadata_map();
        entry
            .metadata
            .insert(key.to_string(), TimedValue::new(value, timestamp));
        let new = entry.metadata_map();
        self.emit(provider, |p| {
            ResourceNotification::metadata(p, service, resource, old, new).at(timestamp)
        });
        Ok(())
    }

    fn act(
        &mut self,
        provider: &str,
        service: &str,
        resource: &str,
        parameters: Map<String, Value>,
    ) -> Result<Value, TwinError> {
        let entry = self.entry(provider, service, resource)?;
        let path = || TwinPath::resource(provider, service, resource);
        let handler = match (&entry.handler, entry.resource_type) {
            (Some(handler), ResourceType::Action) => handler,
            _ => {
                return Err(TwinError::WrongResourceType {
                    path: path(),
                    actual: entry.resource_type,
                })
            }
        };
        let result = handler(&parameters).map_err(|reason| TwinError::ActionFailed {
            path: path(),
            reason,
        })?;
        self.emit(provider, |p| ResourceNotification::action(p, service, resource));
        Ok(result)
    }

    fn snapshot_provider(
        &self,
        provider: &str,
        service_filter: ServicePredicate<'_>,
        resource_filter: ResourcePredicate<'_>,
        options: &[SnapshotOption],
    ) -> Option<ProviderSnapshot> {
        let entry = self.providers.get(provider)?;
        Some(self.provider_snapshot(entry, service_filter, resource_filter, options, Utc::now()))
    }

    fn snapshot_service(
        &self,
        provider: &str,
        service: &str,
        resource_filter: ResourcePredicate<'_>,
    ) -> Option<ServiceSnapshot> {
        let p = self.providers.get(provider)?;
        let s = p.services.get(service)?;
        Some(Self::service_snapshot(&p.id, service, s, resource_filter, Utc::now()))
    }

    fn snapshot_resource(
        &self,
        provider: &str,
        service: &str,
        resource: &str,
    ) -> Option<ResourceSnapshot> {
        let p = self.providers.get(provider)?;
        let r = p.services.get(service)?.resources.get(resource)?;
        Some(Self::resource_snapshot(&p.id, service, resource, r, Utc::now()))
    }

    fn filtered_snapshot(
        &self,
        location_filter: Option<&LocationFilter>,
        provider_filter: ProviderPredicate<'_>,
        service_filter: ServicePredicate<'_>,
        resource_filter: ResourcePredicate<'_>,
        options: &[SnapshotOption],
    ) -> Vec<ProviderSnapshot> {
        let now = Utc::now();
        self.providers
            .values()
            .filter(|entry| {
                // Provider-level predicates see a header without services.
                let header = Self::provider_header(entry, now);
                provider_filter(&header)
                    && location_filter.map_or(true, |filter| {
                        filter(&header, self.admin_value(entry, LOCATION).as_ref())
                    })
            })
            .map(|entry| {
                self.provider_snapshot(entry, service_filter, resource_filter, options, now)
            })
            .collect()
    }

    fn add_linked_provider(&mut self, parent: &str, child: &str) -> Result<(), TwinError> {
        if !self.providers.contains_key(child) {
            return Err(TwinError::unknown(TwinPath::provider_path(child)));
        }
        let p = self
            .providers
            .get_mut(parent)
            .ok_or_else(|| TwinError::unknown(TwinPath::provider_path(parent)))?;
        if !p.linked.iter().any(|l| l == child) {
            p.linked.push(child.to_string());
        }
        Ok(())
    }

    fn remove_linked_provider(&mut self, parent: &str, child: &str) -> Result<(), TwinError> {
        let p = self
            .providers
            .get_mut(parent)
            .ok_or_else(|| TwinError::unknown(TwinPath::provider_path(parent)))?;
        p.linked.retain(|l| l != child);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryTwin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTwin")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    fn twin() -> InMemoryTwin {
        let mut twin = InMemoryTwin::new();
        twin.add_provider("sensor1", Some("uri"), Some("Sensor"))
            .expect("add provider");
        twin.add_resource("sensor1", "temp", "level", ResourceType::Sensor, ContentType::Number)
            .expect("add resource");
        twin.add_action(
            "sensor1",
            "control",
            "reset",
            vec![("delay".into(), "integer".into())],
            |params| Ok(json!({"echo": params.get("delay").cloned()})),
        )
        .expect("add action");
        twin
    }

    #[test]
    fn providers_get_admin_service() {
        let twin = twin();
        let info = twin.provider("sensor1").expect("provider exists");
        assert_eq!(info.services, vec!["admin", "control", "temp"]);
        let admin = twin.service("sensor1", "admin").expect("admin exists");
        assert_eq!(admin.resources, vec!["description", "friendlyName", "icon", "location"]);
    }

    #[test]
    fn duplicate_provider_rejected() {
        let mut twin = twin();
        let err = twin.add_provider("sensor1", None, None).expect_err("duplicate");
        assert_eq!(err.to_string(), "provider sensor1 already exists");
    }

    #[test]
    fn values_respect_content_type_and_time() {
        let mut twin = twin();
        let now = Utc::now();
        twin.set_value("sensor1", "temp", "level", json!(20), now)
            .expect("set value");

        let err = twin
            .set_value("sensor1", "temp", "level", json!("hot"), now)
            .expect_err("wrong content type");
        assert!(matches!(err, TwinError::InvalidValue { .. }));

        let older = now - chrono::Duration::seconds(5);
        twin.set_value("sensor1", "temp", "level", json!(10), older)
            .expect("stale update ignored");
        let tv = twin
            .get_value("sensor1", "temp", "level", GetLevel::Normal)
            .expect("get value");
        assert_eq!(tv.value, Some(json!(20)));
    }

    #[test]
    fn actions_have_no_value() {
        let mut twin = twin();
        let err = twin
            .get_value("sensor1", "control", "reset", GetLevel::Weak)
            .expect_err("action has no value");
        assert!(matches!(err, TwinError::WrongResourceType { .. }));

        let mut params = Map::new();
        params.insert("delay".into(), json!(3));
        let out = twin
            .act("sensor1", "control", "reset", params)
            .expect("act");
        assert_eq!(out, json!({"echo": 3}));

        let err = twin
            .act("sensor1", "temp", "level", Map::new())
            .expect_err("not an action");
        assert!(matches!(err, TwinError::WrongResourceType { .. }));
    }

    #[test]
    fn metadata_roundtrip() {
        let mut twin = twin();
        twin.set_metadata_value("sensor1", "temp", "level", "unit", json!("C"), Utc::now())
            .expect("set metadata");
        let all = twin.metadata("sensor1", "temp", "level").expect("metadata");
        assert_eq!(all.get("unit"), Some(&json!("C")));
        let missing = twin
            .metadata_value("sensor1", "temp", "level", "precision")
            .expect("metadata value");
        assert!(missing.is_empty());
    }

    #[test]
    fn links_and_linked_snapshots() {
        let mut twin = twin();
        twin.add_provider("gateway", None, None).expect("add provider");
        twin.update_value("sensor1", ADMIN_SERVICE, FRIENDLY_NAME, json!("Kitchen"))
            .expect("set friendly name");
        twin.add_linked_provider("gateway", "sensor1").expect("link");
        twin.add_linked_provider("gateway", "sensor1").expect("link twice");

        let snapshot = twin
            .snapshot_provider(
                "gateway",
                &|_| true,
                &|_| true,
                &[SnapshotOption::IncludeLinkedProviderIds],
            )
            .expect("snapshot");
        assert_eq!(snapshot.linked_providers.len(), 1);
        let linked = &snapshot.linked_providers[0];
        assert_eq!(linked.friendly_name.as_deref(), Some("Kitchen"));
        assert_eq!(linked.model_name.as_deref(), Some("Sensor"));
        assert!(linked.location.is_none());

        let without = twin
            .snapshot_provider("gateway", &|_| true, &|_| true, &[])
            .expect("snapshot");
        assert!(without.linked_providers.is_empty());

        twin.remove_provider("sensor1").expect("remove");
        assert!(twin.provider("gateway").expect("gateway").linked_providers.is_empty());
    }

    #[test]
    fn snapshot_predicates_prune_tree() {
        let twin = twin();
        let snapshot = twin
            .snapshot_provider("sensor1", &|s| s.name != "control", &|r| r.name != "icon", &[])
            .expect("snapshot");
        assert!(snapshot.service("control").is_none());
        let admin = snapshot.service("admin").expect("admin kept");
        assert!(admin.resource("icon").is_none());
        assert!(admin.resource("location").is_some());
    }

    #[test]
    fn filtered_snapshot_applies_location_after_provider() {
        let mut twin = twin();
        twin.add_provider("sensor2", None, None).expect("add provider");
        twin.update_value("sensor2", ADMIN_SERVICE, LOCATION, json!({"type": "Point"}))
            .expect("set location");

        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&calls);
        let location: LocationFilter = Arc::new(move |p, loc| {
            seen.lock().push(p.name.clone());
            loc.is_some()
        });

        let result = twin.filtered_snapshot(
            Some(&location),
            &|p| p.name != "sensor1",
            &|_| true,
            &|_| true,
            &[],
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "sensor2");
        assert_eq!(*calls.lock(), vec!["sensor2".to_string()]);
    }

    #[test]
    fn rejected_providers_are_not_walked() {
        let mut twin = twin();
        twin.add_provider("sensor2", None, None).expect("add provider");

        let services = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&services);
        let service_filter = move |s: &ServiceSnapshot| {
            seen.lock().push(s.provider.name.clone());
            true
        };
        let resources = Arc::new(Mutex::new(0usize));
        let counted = Arc::clone(&resources);
        let resource_filter = move |_: &ResourceSnapshot| {
            *counted.lock() += 1;
            true
        };

        let result = twin.filtered_snapshot(
            None,
            &|p| p.services.is_empty() && p.name == "sensor2",
            &service_filter,
            &resource_filter,
            &[],
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "sensor2");
        assert!(result[0].service(ADMIN_SERVICE).is_some());
        assert!(services.lock().iter().all(|p| p == "sensor2"));
        // sensor2 only has the four admin resources.
        assert_eq!(*resources.lock(), 4);
    }

    #[test]
    fn changes_are_notified() {
        let mut twin = InMemoryTwin::new();
        let topics = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&topics);
        twin.on_notification(move |n| sink.lock().push(n.topic()));

        twin.add_provider("p", Some("uri"), Some("M")).expect("add provider");
        twin.add_resource("p", "s", "r", ResourceType::Sensor, ContentType::Any)
            .expect("add resource");
        twin.update_value("p", "s", "r", json!(1)).expect("set value");

        assert_eq!(
            *topics.lock(),
            vec![
                "LIFECYCLE/p".to_string(),
                "LIFECYCLE/p/s".to_string(),
                "LIFECYCLE/p/s/r".to_string(),
                "DATA/p/s/r".to_string(),
            ]
        );
    }
}
