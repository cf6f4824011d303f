//! Core types for the gantry northbound session layer.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  gantry-types   : UserInfo, ids, TwinPath, ErrorCode ◄── HERE│
//! ├─────────────────────────────────────────────────────────────┤
//! │  gantry-auth    : PermissionLevel, PreAuth, Authorizer      │
//! │  gantry-event   : topics, ResourceNotification              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  gantry-twin    : DigitalTwin contract, GatewayThread       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  gantry-session : Session, SessionRegistry                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! This crate has no knowledge of permissions or of the twin itself. It
//! only names *who* is calling ([`UserInfo`]), *which* session or
//! subscription is meant ([`SessionId`], [`SubscriptionId`]) and *what*
//! element of the twin is targeted ([`TwinPath`], [`ModelRef`]).
//!
//! # Example
//!
//! ```
//! use gantry_types::{SessionId, TwinPath, UserInfo};
//!
//! let user = UserInfo::new("alice");
//! let session = SessionId::new();
//! let target = TwinPath::resource("sensor1", "temp", "level");
//!
//! assert_eq!(user.user_id(), "alice");
//! assert_eq!(target.to_string(), "sensor1/temp/level");
//! assert_ne!(session, SessionId::new());
//! ```

mod error;
mod id;
mod model;
mod user;

pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use id::{SessionId, SubscriptionId};
pub use model::{ModelRef, TwinPath};
pub use user::{UserInfo, ANONYMOUS_USER_ID};
