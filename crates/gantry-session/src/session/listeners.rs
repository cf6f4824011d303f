//! Notification routing for one session.
//!
//! # Tables
//!
//! ```text
//! add_listener(["sensor1/*"], Listeners { data, lifecycle })
//!     │
//!     ├── by_wildcard["DATA/sensor1/"]      += Registration(Data)
//!     ├── by_wildcard["LIFECYCLE/sensor1/"] += Registration(Lifecycle)
//!     └── registrations[id] = ["sensor1/*"]
//! ```
//!
//! Subscription topics are relative to the notification kind. The router
//! prepends the kind prefix (`DATA/`, `METADATA/`, `LIFECYCLE/`,
//! `ACTION/`) before storing them, so published topics are always full.
//!
//! # Matching
//!
//! A published topic collects the exact bucket stored under it, plus every
//! wildcard bucket whose key is a prefix of it. Wildcard keys live in a
//! sorted map; candidates are found by walking keys `<= topic` downwards.
//! A key that is not a prefix lets the walk jump straight to the longest
//! common prefix of that key and the topic, since nothing in between can
//! be a prefix.

use gantry_auth::{Authorizer, PermissionLevel};
use gantry_event::{NotificationKind, ResourceNotification, TopicPattern};
use gantry_types::SubscriptionId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Bound;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, warn};

/// Callback receiving the published topic and the notification.
pub type NotificationCallback = Arc<dyn Fn(&str, &ResourceNotification) + Send + Sync>;

/// Callbacks of one subscription, at most one per notification kind.
///
/// # Example
///
/// ```
/// use gantry_session::Listeners;
///
/// let listeners = Listeners::new()
///     .on_data(|topic, _| println!("data on {topic}"))
///     .on_lifecycle(|topic, _| println!("lifecycle on {topic}"));
/// assert!(!listeners.is_empty());
/// ```
#[derive(Clone, Default)]
pub struct Listeners {
    data: Option<NotificationCallback>,
    metadata: Option<NotificationCallback>,
    lifecycle: Option<NotificationCallback>,
    action: Option<NotificationCallback>,
}

impl Listeners {
    /// Creates an empty set of callbacks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value-change callback.
    #[must_use]
    pub fn on_data(mut self, f: impl Fn(&str, &ResourceNotification) + Send + Sync + 'static) -> Self {
        self.data = Some(Arc::new(f));
        self
    }

    /// Sets the metadata-change callback.
    #[must_use]
    pub fn on_metadata(
        mut self,
        f: impl Fn(&str, &ResourceNotification) + Send + Sync + 'static,
    ) -> Self {
        self.metadata = Some(Arc::new(f));
        self
    }

    /// Sets the lifecycle callback.
    #[must_use]
    pub fn on_lifecycle(
        mut self,
        f: impl Fn(&str, &ResourceNotification) + Send + Sync + 'static,
    ) -> Self {
        self.lifecycle = Some(Arc::new(f));
        self
    }

    /// Sets the action callback.
    #[must_use]
    pub fn on_action(
        mut self,
        f: impl Fn(&str, &ResourceNotification) + Send + Sync + 'static,
    ) -> Self {
        self.action = Some(Arc::new(f));
        self
    }

    /// Returns `true` if no callback is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks().next().is_none()
    }

    fn callbacks(&self) -> impl Iterator<Item = (NotificationKind, &NotificationCallback)> {
        [
            (NotificationKind::Data, self.data.as_ref()),
            (NotificationKind::Metadata, self.metadata.as_ref()),
            (NotificationKind::Lifecycle, self.lifecycle.as_ref()),
            (NotificationKind::Action, self.action.as_ref()),
        ]
        .into_iter()
        .filter_map(|(kind, cb)| cb.map(|cb| (kind, cb)))
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("data", &self.data.is_some())
            .field("metadata", &self.metadata.is_some())
            .field("lifecycle", &self.lifecycle.is_some())
            .field("action", &self.action.is_some())
            .finish()
    }
}

/// One callback bound to one notification kind.
pub(crate) struct Registration {
    subscription_id: SubscriptionId,
    kind: NotificationKind,
    authorizer: Arc<dyn Authorizer>,
    callback: NotificationCallback,
}

impl Registration {
    /// Checks the caller may see this notification.
    ///
    /// READ for data and metadata, DESCRIBE for lifecycle at the level
    /// the event concerns, ACT for actions.
    fn is_authorized(&self, event: &ResourceNotification) -> bool {
        let model = event.model_ref();
        let provider = event.provider.as_str();
        let service = event.service_name();
        let resource = event.resource_name();
        let auth = self.authorizer.as_ref();

        match self.kind {
            NotificationKind::Data | NotificationKind::Metadata => {
                auth.has_resource_permission(PermissionLevel::Read, model, provider, service, resource)
            }
            NotificationKind::Action => {
                auth.has_resource_permission(PermissionLevel::Act, model, provider, service, resource)
            }
            NotificationKind::Lifecycle => match event.lifecycle_status() {
                Some(status) if status.is_provider_level() => {
                    auth.has_provider_permission(PermissionLevel::Describe, model, provider)
                }
                Some(status) if status.is_service_level() => {
                    auth.has_service_permission(PermissionLevel::Describe, model, provider, service)
                }
                Some(_) => auth.has_resource_permission(
                    PermissionLevel::Describe,
                    model,
                    provider,
                    service,
                    resource,
                ),
                None => false,
            },
        }
    }

    /// Delivers `event` if it matches this registration's kind and the
    /// caller is allowed to see it. Callback panics are logged.
    pub(crate) fn deliver(&self, topic: &str, event: &ResourceNotification) {
        if event.kind() != self.kind {
            warn!(
                subscription = %self.subscription_id,
                topic = %topic,
                expected = %self.kind,
                actual = %event.kind(),
                "Notification kind does not match its topic, dropped"
            );
            return;
        }

        if !self.is_authorized(event) {
            return;
        }

        if catch_unwind(AssertUnwindSafe(|| (self.callback)(topic, event))).is_err() {
            error!(
                subscription = %self.subscription_id,
                topic = %topic,
                "Listener panicked while handling notification"
            );
        }
    }
}

type Bucket = Vec<Arc<Registration>>;

/// Listener tables of one session. Guarded by the session lock.
#[derive(Default)]
pub(crate) struct ListenerTable {
    by_topic: HashMap<String, Bucket>,
    by_wildcard: BTreeMap<String, Bucket>,
    registrations: HashMap<SubscriptionId, Vec<String>>,
}

impl ListenerTable {
    /// Registers every callback of `listeners` on every topic.
    pub(crate) fn add(
        &mut self,
        id: SubscriptionId,
        topics: Vec<String>,
        listeners: &Listeners,
        authorizer: &Arc<dyn Authorizer>,
    ) {
        for (kind, callback) in listeners.callbacks() {
            let registration = Arc::new(Registration {
                subscription_id: id,
                kind,
                authorizer: Arc::clone(authorizer),
                callback: Arc::clone(callback),
            });
            for topic in &topics {
                let bucket = match TopicPattern::parse_with_prefix(kind.topic_prefix(), topic) {
                    TopicPattern::Exact(key) => self.by_topic.entry(key).or_default(),
                    TopicPattern::Prefix(key) => self.by_wildcard.entry(key).or_default(),
                };
                bucket.push(Arc::clone(&registration));
            }
        }
        self.registrations.insert(id, topics);
    }

    /// Drops every registration of `id`. Returns `false` if unknown.
    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let Some(topics) = self.registrations.remove(&id) else {
            return false;
        };

        for kind in NotificationKind::ALL {
            for topic in &topics {
                match TopicPattern::parse_with_prefix(kind.topic_prefix(), topic) {
                    TopicPattern::Exact(key) => {
                        if self.by_topic.get_mut(&key).is_some_and(|b| drain(b, id)) {
                            self.by_topic.remove(&key);
                        }
                    }
                    TopicPattern::Prefix(key) => {
                        if self.by_wildcard.get_mut(&key).is_some_and(|b| drain(b, id)) {
                            self.by_wildcard.remove(&key);
                        }
                    }
                }
            }
        }
        true
    }

    /// Subscription ids and the topics they were registered with.
    pub(crate) fn active(&self) -> HashMap<SubscriptionId, Vec<String>> {
        self.registrations.clone()
    }

    pub(crate) fn clear(&mut self) {
        self.by_topic.clear();
        self.by_wildcard.clear();
        self.registrations.clear();
    }

    /// Registrations matching a published topic.
    pub(crate) fn matching(&self, topic: &str) -> Vec<Arc<Registration>> {
        let mut matched: Vec<Arc<Registration>> =
            self.by_topic.get(topic).cloned().unwrap_or_default();

        let mut upper = Bound::Included(topic);
        while let Some((key, bucket)) = self
            .by_wildcard
            .range::<str, _>((Bound::Unbounded, upper))
            .next_back()
        {
            if topic.starts_with(key.as_str()) {
                matched.extend(bucket.iter().cloned());
                upper = Bound::Excluded(&topic[..key.len()]);
            } else {
                upper = Bound::Included(&topic[..common_prefix_len(key, topic)]);
            }
        }
        matched
    }
}

/// Removes the registrations of `id`; returns `true` once the bucket is empty.
fn drain(bucket: &mut Bucket, id: SubscriptionId) -> bool {
    bucket.retain(|r| r.subscription_id != id);
    bucket.is_empty()
}

/// Byte length of the longest common prefix, on a char boundary of `topic`.
fn common_prefix_len(key: &str, topic: &str) -> usize {
    let mut len = key
        .bytes()
        .zip(topic.bytes())
        .take_while(|(a, b)| a == b)
        .count();
    while !topic.is_char_boundary(len) {
        len -= 1;
    }
    len
}
