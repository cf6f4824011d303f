//! Notification kinds and lifecycle statuses.
//!
//! Every twin notification is published on a topic whose first segment
//! names its kind:
//!
//! | Kind | Topic prefix | Permission checked on delivery |
//! |------|--------------|--------------------------------|
//! | `Data` | `DATA/` | READ on the resource |
//! | `Metadata` | `METADATA/` | READ on the resource |
//! | `Lifecycle` | `LIFECYCLE/` | DESCRIBE on the created/deleted element |
//! | `Action` | `ACTION/` | ACT on the resource |
//!
//! Listener tables key every registration by `prefix + topic`, so one
//! subscription topic such as `sensor1/*` is registered once per kind.

use serde::{Deserialize, Serialize};

/// Kind of a twin notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// Resource value changed.
    Data,
    /// Resource metadata changed.
    Metadata,
    /// Provider, service or resource created or deleted.
    Lifecycle,
    /// Action invoked on a resource.
    Action,
}

impl NotificationKind {
    /// All kinds, in declaration order.
    pub const ALL: [NotificationKind; 4] = [Self::Data, Self::Metadata, Self::Lifecycle, Self::Action];

    /// Returns the topic segment naming this kind ("DATA", ...).
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Data => "DATA",
            Self::Metadata => "METADATA",
            Self::Lifecycle => "LIFECYCLE",
            Self::Action => "ACTION",
        }
    }

    /// Returns the topic prefix for this kind, including the trailing `/`.
    ///
    /// # Example
    ///
    /// ```
    /// use gantry_event::NotificationKind;
    ///
    /// assert_eq!(NotificationKind::Data.topic_prefix(), "DATA/");
    /// ```
    #[must_use]
    pub fn topic_prefix(&self) -> &'static str {
        match self {
            Self::Data => "DATA/",
            Self::Metadata => "METADATA/",
            Self::Lifecycle => "LIFECYCLE/",
            Self::Action => "ACTION/",
        }
    }

    /// Returns the kind a full topic belongs to, if any.
    #[must_use]
    pub fn of_topic(topic: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| topic.starts_with(kind.topic_prefix()))
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What happened to a twin element in a lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleStatus {
    /// A provider appeared.
    ProviderCreated,
    /// A provider was removed.
    ProviderDeleted,
    /// A service appeared.
    ServiceCreated,
    /// A service was removed.
    ServiceDeleted,
    /// A resource appeared.
    ResourceCreated,
    /// A resource was removed.
    ResourceDeleted,
}

impl LifecycleStatus {
    /// Returns `true` for provider-level statuses.
    #[must_use]
    pub fn is_provider_level(&self) -> bool {
        matches!(self, Self::ProviderCreated | Self::ProviderDeleted)
    }

    /// Returns `true` for service-level statuses.
    #[must_use]
    pub fn is_service_level(&self) -> bool {
        matches!(self, Self::ServiceCreated | Self::ServiceDeleted)
    }

    /// Returns `true` for resource-level statuses.
    #[must_use]
    pub fn is_resource_level(&self) -> bool {
        matches!(self, Self::ResourceCreated | Self::ResourceDeleted)
    }
}
