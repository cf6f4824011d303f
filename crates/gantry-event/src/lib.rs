//! Notification types for the gantry session layer.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  gantry-types   : UserInfo, ids, TwinPath, ErrorCode        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  gantry-auth    : PermissionLevel, PreAuth, Authorizer      │
//! │  gantry-event   : topics, ResourceNotification  ◄── HERE    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  gantry-twin    : DigitalTwin contract, GatewayThread       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  gantry-session : Session, SessionRegistry                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Notification Flow
//!
//! ```text
//! DigitalTwin ──ResourceNotification──► SessionRegistry::notify(topic, n)
//!                                              │ fan out to live sessions
//!                                              ▼
//!                                       Session::notify(topic, n)
//!                                              │ exact + wildcard match
//!                                              ▼
//!                                 per-registration permission check
//!                                              │
//!                                              ▼
//!                                        user callback
//! ```
//!
//! Topics are shaped `<KIND>/<provider>/<service>/<resource>`, see
//! [`NotificationKind`] and [`TopicPattern`].

pub mod kind;
pub mod notification;
pub mod topic;

pub use kind::{LifecycleStatus, NotificationKind};
pub use notification::{NotificationPayload, ResourceNotification};
pub use topic::TopicPattern;
