//! # Server Configuration
//!
//! HTTP server settings loaded from environment variables.

use super::{env_var_or_default, process_env};
use crate::constants::{
    DEFAULT_METRICS_PORT, DEFAULT_SERVER_POLL_INTERVAL_MS, DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
};
use std::time::Duration;

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// HTTP server port for metrics and health probes
    pub metrics_port: u16,
    /// How long to wait for the server to be ready before giving up (seconds)
    pub startup_timeout_secs: u64,
    /// How often to check readiness during startup (milliseconds)
    pub poll_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            startup_timeout_secs: DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_SERVER_POLL_INTERVAL_MS,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(process_env)
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            metrics_port: env_var_or_default(&lookup, "METRICS_PORT", DEFAULT_METRICS_PORT),
            startup_timeout_secs: env_var_or_default(
                &lookup,
                "SERVER_STARTUP_TIMEOUT_SECS",
                DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            ),
            poll_interval_ms: env_var_or_default(
                &lookup,
                "SERVER_POLL_INTERVAL_MS",
                DEFAULT_SERVER_POLL_INTERVAL_MS,
            ),
        }
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(ServerConfig::from_lookup(|_| None), ServerConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(|key| match key {
            "METRICS_PORT" => Some("9100".to_string()),
            "SERVER_POLL_INTERVAL_MS" => Some("250".to_string()),
            _ => None,
        });
        assert_eq!(config.metrics_port, 9100);
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(
            config.startup_timeout(),
            Duration::from_secs(DEFAULT_SERVER_STARTUP_TIMEOUT_SECS)
        );
    }
}
