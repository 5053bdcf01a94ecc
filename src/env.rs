//! Environment variable names used by this crate for convenient
//! configuration of the sink from services.
//!
//! These are purely helpers; [`LokiConfig`] and [`LayerConfig`] remain
//! usable without touching the environment.

use crate::error::ConfigError;
use crate::init::LayerConfig;
use crate::loki::LokiConfig;
use std::collections::HashMap;
use std::time::Duration;

/// Loki base URL, e.g. `http://localhost:3100`.
pub const LOKI_URL_ENV: &str = "LOKI_URL";

/// Value of the `environment` label.
pub const LOKI_ENVIRONMENT_ENV: &str = "LOKI_ENVIRONMENT";

/// Value of the `application` label.
pub const LOKI_APPLICATION_ENV: &str = "LOKI_APPLICATION";

/// Value of the `host` label.
pub const LOKI_HOST_ENV: &str = "LOKI_HOST";

/// Optional tenant sent as `X-Scope-OrgID`.
pub const LOKI_TENANT_ENV: &str = "LOKI_TENANT";

/// Optional basic-auth user name.
pub const LOKI_USER_ENV: &str = "LOKI_USER";

/// Optional basic-auth password (API key on Grafana Cloud).
pub const LOKI_PASSWORD_ENV: &str = "LOKI_PASSWORD";

/// Request timeout in whole seconds.
pub const LOKI_TIMEOUT_SECS_ENV: &str = "LOKI_TIMEOUT_SECS";

/// Most verbose level shipped, e.g. `info`.
pub const LOKI_MIN_LEVEL_ENV: &str = "LOKI_MIN_LEVEL";

impl LokiConfig {
    /// Build a config from `LOKI_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&std::env::vars().collect())
    }

    /// Same as [`LokiConfig::from_env`] over an explicit variable map.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str, default: &str| {
            vars.get(key).cloned().unwrap_or_else(|| default.to_string())
        };

        let mut config = LokiConfig::new(
            get(LOKI_URL_ENV, "http://localhost:3100"),
            get(LOKI_ENVIRONMENT_ENV, "dev"),
            get(LOKI_APPLICATION_ENV, "rust"),
            get(LOKI_HOST_ENV, "localhost"),
        );
        config.tenant = vars.get(LOKI_TENANT_ENV).cloned();
        config.user = vars.get(LOKI_USER_ENV).cloned();
        config.password = vars.get(LOKI_PASSWORD_ENV).cloned();

        if let Some(raw) = vars.get(LOKI_TIMEOUT_SECS_ENV) {
            let secs = raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: LOKI_TIMEOUT_SECS_ENV,
                value: raw.clone(),
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

impl LayerConfig {
    /// Build a layer config, reading the threshold from `LOKI_MIN_LEVEL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&std::env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = LayerConfig::default();
        if let Some(raw) = vars.get(LOKI_MIN_LEVEL_ENV) {
            config.min_level = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: LOKI_MIN_LEVEL_ENV,
                value: raw.clone(),
            })?;
        }
        Ok(config)
    }
}
