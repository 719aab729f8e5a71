//! # Controller Configuration
//!
//! Reconciler settings loaded from environment variables.
//!
//! Intervals use Kubernetes duration notation (`30s`, `5m`, `1h`). An unset
//! variable falls back to its default; a malformed one is a startup error.

use super::{env_var_or_default, parse_kubernetes_duration, process_env};
use crate::constants::*;
use crate::crd::ConditionType;
use anyhow::{Context, Result};
use std::time::Duration;

/// Which token types the controller validates
///
/// Unchecked types are still recorded, as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPolicy {
    pub check_paas_token: bool,
    pub check_api_token: bool,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            check_paas_token: true,
            check_api_token: false,
        }
    }
}

impl TokenPolicy {
    /// Whether `condition_type` is validated under this policy
    pub fn checks(&self, condition_type: &ConditionType) -> bool {
        match condition_type {
            ConditionType::PaaSToken => self.check_paas_token,
            ConditionType::ApiToken => self.check_api_token,
            ConditionType::Other(_) => false,
        }
    }
}

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Restrict the watch to one namespace, all namespaces when `None`
    pub watch_namespace: Option<String>,
    /// Timeout for a single Dynatrace API call
    pub api_timeout: Duration,
    /// Requeue after a successful reconciliation
    pub resync_interval: Duration,
    /// Requeue after a transient API failure
    pub transient_requeue_interval: Duration,
    /// Requeue after a rejected token or missing scope
    pub rejected_requeue_interval: Duration,
    /// Fetch-and-write attempts before a status conflict becomes an error
    pub max_conflict_retries: u32,
    pub token_policy: TokenPolicy,
    /// Fibonacci backoff bounds for operator errors, in seconds
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            watch_namespace: None,
            api_timeout: Duration::from_secs(DEFAULT_API_TIMEOUT_SECS),
            resync_interval: Duration::from_secs(DEFAULT_RESYNC_INTERVAL_SECS),
            transient_requeue_interval: Duration::from_secs(
                DEFAULT_TRANSIENT_REQUEUE_INTERVAL_SECS,
            ),
            rejected_requeue_interval: Duration::from_secs(DEFAULT_REJECTED_REQUEUE_INTERVAL_SECS),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            token_policy: TokenPolicy::default(),
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    ///
    /// # Errors
    ///
    /// Returns an error if a duration variable is set but malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(process_env)
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let duration = |key: &str, default: Duration| -> Result<Duration> {
            match lookup(key) {
                Some(value) if !value.trim().is_empty() => parse_kubernetes_duration(&value)
                    .with_context(|| format!("Invalid value for {key}")),
                _ => Ok(default),
            }
        };

        let backoff_min_secs =
            env_var_or_default(&lookup, "BACKOFF_MIN_SECS", defaults.backoff_min_secs).max(1);
        let backoff_max_secs =
            env_var_or_default(&lookup, "BACKOFF_MAX_SECS", defaults.backoff_max_secs)
                .max(backoff_min_secs);

        Ok(Self {
            watch_namespace: lookup("WATCH_NAMESPACE")
                .map(|ns| ns.trim().to_string())
                .filter(|ns| !ns.is_empty()),
            api_timeout: duration("DT_API_TIMEOUT", defaults.api_timeout)?,
            resync_interval: duration("RESYNC_INTERVAL", defaults.resync_interval)?,
            transient_requeue_interval: duration(
                "TRANSIENT_REQUEUE_INTERVAL",
                defaults.transient_requeue_interval,
            )?,
            rejected_requeue_interval: duration(
                "REJECTED_REQUEUE_INTERVAL",
                defaults.rejected_requeue_interval,
            )?,
            max_conflict_retries: env_var_or_default(
                &lookup,
                "MAX_CONFLICT_RETRIES",
                defaults.max_conflict_retries,
            )
            .max(1),
            token_policy: TokenPolicy {
                check_paas_token: env_var_or_default(
                    &lookup,
                    "CHECK_PAAS_TOKEN",
                    defaults.token_policy.check_paas_token,
                ),
                check_api_token: env_var_or_default(
                    &lookup,
                    "CHECK_API_TOKEN",
                    defaults.token_policy.check_api_token,
                ),
            },
            backoff_min_secs,
            backoff_max_secs,
        })
    }
}
