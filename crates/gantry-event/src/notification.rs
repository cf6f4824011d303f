//! Twin notifications.

use crate::{LifecycleStatus, NotificationKind};
use chrono::{DateTime, Utc};
use gantry_types::ModelRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kind-specific content of a [`ResourceNotification`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationPayload {
    /// A resource value changed.
    Data {
        /// Previous value.
        old_value: Option<Value>,
        /// New value.
        new_value: Option<Value>,
    },
    /// Resource metadata changed.
    Metadata {
        /// Metadata before the change.
        old_metadata: Map<String, Value>,
        /// Metadata after the change.
        new_metadata: Map<String, Value>,
    },
    /// A twin element was created or deleted.
    Lifecycle {
        /// What happened.
        status: LifecycleStatus,
        /// Initial value of a created resource.
        initial_value: Option<Value>,
    },
    /// An action was invoked.
    Action,
}

/// A notification emitted by the twin.
///
/// `service` and `resource` are absent for provider (and service)
/// lifecycle notifications.
///
/// # Example
///
/// ```
/// use gantry_event::{NotificationKind, ResourceNotification};
/// use serde_json::json;
///
/// let n = ResourceNotification::data("sensor1", "temp", "level", None, Some(json!(21.5)));
/// assert_eq!(n.kind(), NotificationKind::Data);
/// assert_eq!(n.topic(), "DATA/sensor1/temp/level");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceNotification {
    /// Model package URI of the provider.
    pub model_package_uri: Option<String>,
    /// Model name of the provider.
    pub model: Option<String>,
    /// Provider name.
    pub provider: String,
    /// Service name.
    pub service: Option<String>,
    /// Resource name.
    pub resource: Option<String>,
    /// When the change happened.
    pub timestamp: DateTime<Utc>,
    /// Kind-specific content.
    pub payload: NotificationPayload,
}

impl ResourceNotification {
    fn new(
        provider: impl Into<String>,
        service: Option<String>,
        resource: Option<String>,
        payload: NotificationPayload,
    ) -> Self {
        Self {
            model_package_uri: None,
            model: None,
            provider: provider.into(),
            service,
            resource,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Value change notification.
    #[must_use]
    pub fn data(
        provider: impl Into<String>,
        service: impl Into<String>,
        resource: impl Into<String>,
        old_value: Option<Value>,
        new_value: Option<Value>,
    ) -> Self {
        Self::new(
            provider,
            Some(service.into()),
            Some(resource.into()),
            NotificationPayload::Data {
                old_value,
                new_value,
            },
        )
    }

    /// Metadata change notification.
    #[must_use]
    pub fn metadata(
        provider: impl Into<String>,
        service: impl Into<String>,
        resource: impl Into<String>,
        old_metadata: Map<String, Value>,
        new_metadata: Map<String, Value>,
    ) -> Self {
        Self::new(
            provider,
            Some(service.into()),
            Some(resource.into()),
            NotificationPayload::Metadata {
                old_metadata,
                new_metadata,
            },
        )
    }

    /// Lifecycle notification. Pass `None` for the levels below the element.
    #[must_use]
    pub fn lifecycle(
        provider: impl Into<String>,
        service: Option<String>,
        resource: Option<String>,
        status: LifecycleStatus,
        initial_value: Option<Value>,
    ) -> Self {
        Self::new(
            provider,
            service,
            resource,
            NotificationPayload::Lifecycle {
                status,
                initial_value,
            },
        )
    }

    /// Action notification.
    #[must_use]
    pub fn action(
        provider: impl Into<String>,
        service: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self::new(
            provider,
            Some(service.into()),
            Some(resource.into()),
            NotificationPayload::Action,
        )
    }

    /// Sets the provider's model identifiers.
    #[must_use]
    pub fn with_model(mut self, package_uri: impl Into<String>, model: impl Into<String>) -> Self {
        self.model_package_uri = Some(package_uri.into());
        self.model = Some(model.into());
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Borrowed model identifiers.
    #[must_use]
    pub fn model_ref(&self) -> ModelRef<'_> {
        ModelRef::new(self.model_package_uri.as_deref(), self.model.as_deref())
    }

    /// Service name, or `""` when absent.
    #[must_use]
    pub fn service_name(&self) -> &str {
        self.service.as_deref().unwrap_or_default()
    }

    /// Resource name, or `""` when absent.
    #[must_use]
    pub fn resource_name(&self) -> &str {
        self.resource.as_deref().unwrap_or_default()
    }

    /// Returns the notification kind.
    #[must_use]
    pub fn kind(&self) -> NotificationKind {
        match self.payload {
            NotificationPayload::Data { .. } => NotificationKind::Data,
            NotificationPayload::Metadata { .. } => NotificationKind::Metadata,
            NotificationPayload::Lifecycle { .. } => NotificationKind::Lifecycle,
            NotificationPayload::Action => NotificationKind::Action,
        }
    }

    /// Returns the lifecycle status of a lifecycle notification.
    #[must_use]
    pub fn lifecycle_status(&self) -> Option<LifecycleStatus> {
        match self.payload {
            NotificationPayload::Lifecycle { status, .. } => Some(status),
            _ => None,
        }
    }

    /// Returns the topic this notification is published on:
    /// `<KIND>/<provider>[/<service>[/<resource>]]`.
    #[must_use]
    pub fn topic(&self) -> String {
        let mut topic = format!("{}{}", self.kind().topic_prefix(), self.provider);
        if let Some(service) = &self.service {
            topic.push('/');
            topic.push_str(service);
            if let Some(resource) = &self.resource {
                topic.push('/');
                topic.push_str(resource);
            }
        }
        topic
    }
}
