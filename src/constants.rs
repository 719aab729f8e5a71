//! # Constants
//!
//! Default values shared across the controller.

/// Field manager recorded on status writes
pub const FIELD_MANAGER: &str = "oneagent-apm-controller";

/// Default port for the metrics and probe server
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// How long to wait for the HTTP server to bind (seconds)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// How often to poll the HTTP server during startup (milliseconds)
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Per-call timeout for Dynatrace API requests (seconds)
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 10;

/// Periodic resync after a successful reconciliation (seconds)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 30 * 60;

/// Requeue after a transient Dynatrace API failure (seconds)
pub const DEFAULT_TRANSIENT_REQUEUE_INTERVAL_SECS: u64 = 30;

/// Requeue after a token was rejected or lacks scopes (seconds)
pub const DEFAULT_REJECTED_REQUEUE_INTERVAL_SECS: u64 = 15 * 60;

/// Status write attempts before a version conflict is reported
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 5;

/// Fibonacci backoff bounds for operator errors (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 60;
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 600;

/// Fallback requeue when backoff state is unavailable (seconds)
pub const DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS: u64 = 60;

/// Delay before the watch restarts after an unexpected stream error (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Secret key holding the PaaS token
pub const PAAS_TOKEN_KEY: &str = "paasToken";

/// Secret key holding the API token
pub const API_TOKEN_KEY: &str = "apiToken";
