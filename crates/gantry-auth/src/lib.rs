//! Authorization primitives for the gantry session layer.
//!
//! # Two-Phase Model
//!
//! ```text
//! request ──► PreAuthorizer ──Deny──► NotPermitted (twin never consulted)
//!                 │
//!                 ├──Allow──► twin operation
//!                 │
//!                 └──Unknown──► look up model ──► Authorizer ──► twin operation
//! ```
//!
//! | Type | Role |
//! |------|------|
//! | [`PermissionLevel`] | What kind of access is asked |
//! | [`PreAuth`] | Three-valued pre-authorization result |
//! | [`PreAuthorizer`] | Model-unaware pre-check |
//! | [`Authorizer`] | Authoritative, model-aware check |
//! | [`AuthorizationEngine`] | Builds both for a user |
//! | [`PolicyEngine`] | Built-in engine driven by [`DefaultAuthPolicy`] |
//!
//! # Crate Architecture
//!
//! ```text
//! gantry-types  (UserInfo, TwinPath, ModelRef)
//!     ↑
//! gantry-auth  ◄── THIS CRATE
//!     ↑
//! gantry-session (Session, SessionRegistry)
//! ```

pub mod authorizer;
pub mod engine;
pub mod error;
pub mod level;
pub mod policy;
pub mod preauth;

pub use authorizer::{Authorizer, PassThroughPreAuthorizer, PreAuthorizer};
pub use engine::{pre_authorizer_for, AuthorizationEngine};
pub use error::NotPermitted;
pub use level::PermissionLevel;
pub use policy::{DefaultAuthPolicy, PolicyAuthorizer, PolicyEngine};
pub use preauth::PreAuth;
