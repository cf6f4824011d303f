//! Digital twin contract and single-writer executor.
//!
//! The twin itself lives outside the session layer. This crate defines what
//! the session layer needs from it:
//!
//! | Item | Role |
//! |------|------|
//! | [`DigitalTwin`] | Lookups, values, metadata, actions, snapshots, links |
//! | [`TwinExecutor`] | Serializes every twin access |
//! | [`execute`] | Submit a closure, await its result |
//! | [`GatewayThread`] | Thread-backed executor owning a twin |
//! | [`InMemoryTwin`] | Reference twin used by tests and demos |
//!
//! # Crate Architecture
//!
//! ```text
//! gantry-types   gantry-event
//!      ↑              ↑
//!      └── gantry-twin ◄── THIS CRATE
//!              ↑
//!        gantry-session
//! ```

pub mod error;
pub mod executor;
pub mod memory;
pub mod snapshot;
pub mod twin;
pub mod value;

pub use error::{ExecutorError, TwinError};
pub use executor::{execute, GatewayThread, TwinCommand, TwinExecutor};
pub use memory::{ActionHandler, InMemoryTwin, NotificationSink};
pub use snapshot::{
    LinkedProviderSnapshot, LocationFilter, ProviderFilter, ProviderIdentity, ProviderRef,
    ProviderSnapshot, ResourceFilter, ResourceSnapshot, ResourceValueFilter, ServiceFilter,
    ServiceSnapshot, SnapshotCriterion, SnapshotOption, ADMIN_SERVICE, DESCRIPTION, FRIENDLY_NAME,
    ICON, LOCATION,
};
pub use twin::{
    DigitalTwin, ProviderInfo, ProviderPredicate, ResourceInfo, ResourcePredicate, ServiceInfo,
    ServicePredicate,
};
pub use value::{ContentType, GetLevel, ResourceType, TimedValue};
