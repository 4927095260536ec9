use crate::lifecycle::{LifecycleError, Result};
use dashmap::DashMap;
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Key for [`LifecycleConfig::shutdown_timeout`], in milliseconds
pub const SHUTDOWN_TIMEOUT_KEY: &str = "RUNLEVEL_SHUTDOWN_TIMEOUT_MS";
/// Key for [`LifecycleConfig::exit_warning_delay`], in milliseconds
pub const EXIT_WARNING_DELAY_KEY: &str = "RUNLEVEL_EXIT_WARNING_DELAY_MS";

/// Configuration service
#[derive(Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    /// Service preloaded with the process environment
    pub fn from_env() -> Self {
        let service = Self::default();
        for (key, value) in env::vars() {
            service.set(&key, &value);
        }
        service
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }

    /// Parse a value, `Ok(None)` if the key is absent
    pub fn parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|raw| {
                raw.trim()
                    .parse::<T>()
                    .map_err(|e| LifecycleError::config(key, format!("{raw:?}: {e}")))
            })
            .transpose()
    }
}

/// Timing knobs for the lifecycle engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// How long a shutdown may take before the process is forced to exit
    pub shutdown_timeout: Duration,
    /// Delay after `stop` completes before warning that the process is still alive
    pub exit_warning_delay: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(10),
            exit_warning_delay: Duration::from_secs(5),
        }
    }
}

impl LifecycleConfig {
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn exit_warning_delay(mut self, delay: Duration) -> Self {
        self.exit_warning_delay = delay;
        self
    }

    /// Read overrides from `config`, keeping defaults for absent keys
    pub fn from_service(config: &ConfigService) -> Result<Self> {
        let mut lifecycle = Self::default();
        if let Some(ms) = config.parse::<u64>(SHUTDOWN_TIMEOUT_KEY)? {
            lifecycle.shutdown_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = config.parse::<u64>(EXIT_WARNING_DELAY_KEY)? {
            lifecycle.exit_warning_delay = Duration::from_millis(ms);
        }
        Ok(lifecycle)
    }
}
