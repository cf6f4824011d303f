//! Authorization-aware sessions for the gantry northbound layer.
//!
//! Northbound adapters (REST, MQTT, WebSocket bridges) never talk to the
//! digital twin directly. They obtain a [`Session`] for the calling user
//! from the [`SessionRegistry`] and go through it for every read, write,
//! action, snapshot and subscription.
//!
//! # Architecture
//!
//! ```text
//!   northbound adapters
//!          │
//!          ▼
//! ┌──────────────────────┐  set/unset_authorization  ┌─────────────────────┐
//! │   SessionRegistry    │ ◄──────────────────────── │ AuthorizationEngine │
//! │  default sessions    │                           └─────────────────────┘
//! │  per-user index      │ ── notify(topic, event) ──┐
//! └──────────┬───────────┘                           │
//!            │ creates                               ▼
//!            ▼                                 ┌───────────┐
//! ┌──────────────────────┐                     │ Listeners │ (per session,
//! │       Session        │ ──── owns ────────► │  by topic │  filtered by
//! │  PreAuthorizer       │                     └───────────┘  Authorizer)
//! │  Authorizer          │
//! │  expiry              │
//! └──────────┬───────────┘
//!            │ execute(|twin| ..)
//!            ▼
//! ┌──────────────────────┐
//! │ TwinExecutor         │  single gateway thread
//! │   └── DigitalTwin    │
//! └──────────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | [`SessionManagerConfig`](config::SessionManagerConfig) and its loader |
//! | `session` | [`Session`]: data plane, snapshots, listeners, expiry |
//! | `registry` | [`SessionRegistry`]: creation, lookup, engine swap, fan-out |
//! | `activity` | [`ActivityChecker`] and the liveness monitor |
//! | `description` | Serializable `describe_*` results |
//!
//! # Example
//!
//! ```
//! use gantry_session::config::SessionManagerConfig;
//! use gantry_session::SessionRegistry;
//! use gantry_auth::DefaultAuthPolicy;
//! use gantry_twin::{ContentType, GatewayThread, InMemoryTwin, ResourceType};
//! use gantry_types::UserInfo;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let mut twin = InMemoryTwin::new();
//! twin.add_provider("sensor1", None, None).unwrap();
//! twin.add_resource("sensor1", "temp", "level", ResourceType::Sensor, ContentType::Number)
//!     .unwrap();
//! twin.update_value("sensor1", "temp", "level", json!(21.5)).unwrap();
//!
//! let gateway = Arc::new(GatewayThread::spawn(twin).unwrap());
//! let config = SessionManagerConfig {
//!     auth_policy: DefaultAuthPolicy::AllowAll,
//!     ..SessionManagerConfig::default()
//! };
//! let registry = SessionRegistry::new(config, gateway);
//!
//! let session = registry.get_default_session(&UserInfo::new("alice")).unwrap();
//! let level: Option<f64> = session
//!     .get_resource_value("sensor1", "temp", "level")
//!     .await
//!     .unwrap();
//! assert_eq!(level, Some(21.5));
//! # });
//! ```

pub mod config;

mod activity;
mod description;
mod error;
mod registry;
mod session;

pub use activity::{start_activity_monitor, ActivityChecker};
pub use description::{
    ProviderDescription, ResourceDescription, ResourceShortDescription, ServiceDescription,
};
pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::{ExpirationListener, Listeners, NotificationCallback, Session};
