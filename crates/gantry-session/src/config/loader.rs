//! Configuration loader.
//!
//! # Load Order
//!
//! 1. Default values (compile-time)
//! 2. Config file (when one is given and exists)
//! 3. Environment variables (`GANTRY_*`)
//!
//! Each layer overrides the previous.

use super::{ConfigError, SessionManagerConfig};
use gantry_auth::DefaultAuthPolicy;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Helper macro for parsing integer environment variables.
macro_rules! parse_env_secs {
    ($field:expr, $var:literal) => {
        if let Ok(val) = std::env::var($var) {
            $field = val
                .trim()
                .parse::<i64>()
                .map_err(|_| ConfigError::invalid_env_var($var, "expected a number of seconds"))?;
        }
    };
}

/// Configuration loader with builder pattern.
///
/// # Example
///
/// ```
/// use gantry_session::config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .skip_env_vars() // For testing
///     .load()
///     .unwrap();
/// assert_eq!(config.expiry_secs, 600);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    /// Config file path.
    config_path: Option<PathBuf>,

    /// Skip environment variable loading.
    skip_env: bool,
}

impl ConfigLoader {
    /// Creates a new loader with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the config file to read.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Skips environment variable loading.
    ///
    /// Useful for testing with deterministic config.
    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Loads configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file exists but cannot be
    /// parsed, or if an environment variable holds an invalid value.
    /// A missing config file is silently ignored.
    pub fn load(&self) -> Result<SessionManagerConfig, ConfigError> {
        let mut config = SessionManagerConfig::default();

        if let Some(ref path) = self.config_path {
            if let Some(file_config) = self.load_file(path)? {
                debug!(path = %path.display(), "Loaded session config");
                config = file_config;
            }
        }

        if !self.skip_env {
            self.apply_env_vars(&mut config)?;
        }

        Ok(config)
    }

    /// Loads a config file, returning None if it doesn't exist.
    fn load_file(&self, path: &Path) -> Result<Option<SessionManagerConfig>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;

        let config = SessionManagerConfig::from_toml(&content)
            .map_err(|e| ConfigError::parse_toml(path, e))?;

        Ok(Some(config))
    }

    /// Applies environment variable overrides.
    fn apply_env_vars(&self, config: &mut SessionManagerConfig) -> Result<(), ConfigError> {
        parse_env_secs!(config.expiry_secs, "GANTRY_SESSION_EXPIRY");
        parse_env_secs!(
            config.activity_check.interval_secs,
            "GANTRY_ACTIVITY_CHECK_INTERVAL"
        );

        if let Ok(val) = std::env::var("GANTRY_AUTH_POLICY") {
            config.auth_policy = DefaultAuthPolicy::parse(&val).ok_or_else(|| {
                ConfigError::invalid_env_var(
                    "GANTRY_AUTH_POLICY",
                    "expected ALLOW_ALL, DENY_ALL or AUTHENTICATED_ONLY",
                )
            })?;
        }

        Ok(())
    }
}
