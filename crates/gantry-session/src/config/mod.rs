//! Session registry configuration.
//!
//! # Config File
//!
//! ```toml
//! expiry_secs = 600
//! auth_policy = "DENY_ALL"
//! max_create_retries = 8
//!
//! [activity_check]
//! interval_secs = 60
//! threshold_secs = 10
//! extension_secs = -1
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Field | Type |
//! |----------|-------|------|
//! | `GANTRY_SESSION_EXPIRY` | `expiry_secs` | seconds |
//! | `GANTRY_AUTH_POLICY` | `auth_policy` | `ALLOW_ALL`, `DENY_ALL`, `AUTHENTICATED_ONLY` |
//! | `GANTRY_ACTIVITY_CHECK_INTERVAL` | `activity_check.interval_secs` | seconds |

mod error;
mod loader;
mod types;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use types::{ActivityCheckConfig, SessionManagerConfig};
