//! Configuration types.
//!
//! All types implement [`Default`] for compile-time fallback values.

use chrono::Duration;
use gantry_auth::DefaultAuthPolicy;
use serde::{Deserialize, Serialize};

/// Session registry configuration.
///
/// Fields with `#[serde(default)]` are optional in the config file.
///
/// # Example
///
/// ```
/// use gantry_session::config::SessionManagerConfig;
///
/// let config = SessionManagerConfig::from_toml(
///     r#"
/// expiry_secs = 120
/// auth_policy = "AUTHENTICATED_ONLY"
/// "#,
/// )
/// .unwrap();
/// assert_eq!(config.expiry_secs, 120);
/// assert_eq!(config.activity_check.interval_secs, 60);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionManagerConfig {
    /// Session lifetime in seconds. Zero or negative means sessions never expire.
    pub expiry_secs: i64,

    /// Policy applied while no authorization engine is registered.
    pub auth_policy: DefaultAuthPolicy,

    /// How many times session creation is retried when the
    /// authorization engine changes under it.
    pub max_create_retries: u32,

    /// Activity monitor settings.
    pub activity_check: ActivityCheckConfig,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            expiry_secs: 600,
            auth_policy: DefaultAuthPolicy::default(),
            max_create_retries: 8,
            activity_check: ActivityCheckConfig::default(),
        }
    }
}

impl SessionManagerConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes to TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserializes from TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if the TOML is invalid.
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Session lifetime, or `None` when sessions never expire.
    #[must_use]
    pub fn expiry(&self) -> Option<Duration> {
        positive_secs(self.expiry_secs)
    }

    /// Returns `true` when the activity monitor should run.
    ///
    /// The monitor needs a finite expiry and an interval shorter than it.
    #[must_use]
    pub fn activity_check_enabled(&self) -> bool {
        let interval = self.activity_check.interval_secs;
        self.expiry_secs > 0 && interval > 0 && interval < self.expiry_secs
    }

    /// Remaining lifetime under which a session gets its activity checked.
    #[must_use]
    pub fn activity_threshold(&self) -> Duration {
        positive_secs(self.activity_check.threshold_secs)
            .or_else(|| Duration::try_seconds(ActivityCheckConfig::DEFAULT_THRESHOLD_SECS))
            .unwrap_or_else(Duration::zero)
    }

    /// Lifetime granted to a session found active. Falls back to the expiry.
    #[must_use]
    pub fn activity_extension(&self) -> Option<Duration> {
        positive_secs(self.activity_check.extension_secs).or_else(|| self.expiry())
    }
}

/// Activity monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ActivityCheckConfig {
    /// Seconds between two liveness sweeps. Zero or negative disables the monitor.
    pub interval_secs: i64,

    /// Sessions expiring within this many seconds are checked.
    pub threshold_secs: i64,

    /// Seconds added to an active session. Zero or negative means the session expiry.
    pub extension_secs: i64,
}

impl ActivityCheckConfig {
    /// Threshold used when the configured one is not positive.
    pub const DEFAULT_THRESHOLD_SECS: i64 = 10;
}

impl Default for ActivityCheckConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            threshold_secs: Self::DEFAULT_THRESHOLD_SECS,
            extension_secs: -1,
        }
    }
}

fn positive_secs(secs: i64) -> Option<Duration> {
    if secs > 0 {
        Duration::try_seconds(secs)
    } else {
        None
    }
}
