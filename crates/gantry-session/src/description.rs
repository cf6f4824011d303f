//! Descriptions returned by `describe_*` and `list_providers`.
//!
//! Descriptions are flat, serializable summaries meant for northbound
//! adapters. They carry names rather than nested snapshots.

use chrono::{DateTime, Utc};
use gantry_twin::{
    ContentType, ProviderSnapshot, ResourceInfo, ResourceType, ServiceInfo, TimedValue,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Full description of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescription {
    pub provider: String,
    pub service: String,
    pub resource: String,
    pub resource_type: ResourceType,
    pub content_type: ContentType,
    /// Current value. Always `None` for actions.
    pub value: Option<Value>,
    pub timestamp: Option<DateTime<Utc>>,
    pub metadata: Map<String, Value>,
    /// `(name, type)` pairs. Empty unless the resource is an action.
    pub action_arguments: Vec<(String, String)>,
}

impl ResourceDescription {
    pub(crate) fn new(info: ResourceInfo, value: TimedValue, metadata: Map<String, Value>) -> Self {
        Self {
            provider: info.provider.name,
            service: info.service,
            resource: info.name,
            resource_type: info.resource_type,
            content_type: info.content_type,
            value: value.value,
            timestamp: value.timestamp,
            metadata,
            action_arguments: info.arguments,
        }
    }
}

/// Shape of a resource, without its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceShortDescription {
    pub name: String,
    pub resource_type: ResourceType,
    pub content_type: ContentType,
    pub action_arguments: Vec<(String, String)>,
}

impl From<ResourceInfo> for ResourceShortDescription {
    fn from(info: ResourceInfo) -> Self {
        Self {
            name: info.name,
            resource_type: info.resource_type,
            content_type: info.content_type,
            action_arguments: info.arguments,
        }
    }
}

/// A service and the names of its resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescription {
    pub provider: String,
    pub service: String,
    pub resources: Vec<String>,
}

impl From<ServiceInfo> for ServiceDescription {
    fn from(info: ServiceInfo) -> Self {
        Self {
            provider: info.provider.name,
            service: info.name,
            resources: info.resources,
        }
    }
}

/// A provider, its visible services and its visible linked providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescription {
    pub provider: String,
    pub model_package_uri: Option<String>,
    pub model_name: Option<String>,
    pub services: Vec<String>,
    pub linked_providers: Vec<String>,
}

impl From<&ProviderSnapshot> for ProviderDescription {
    fn from(snapshot: &ProviderSnapshot) -> Self {
        Self {
            provider: snapshot.name.clone(),
            model_package_uri: snapshot.model_package_uri.clone(),
            model_name: snapshot.model_name.clone(),
            services: snapshot.services.iter().map(|s| s.name.clone()).collect(),
            linked_providers: snapshot
                .linked_providers
                .iter()
                .map(|l| l.name.clone())
                .collect(),
        }
    }
}
