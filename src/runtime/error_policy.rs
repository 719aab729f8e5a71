//! # Error Policy
//!
//! Handling of reconciliation errors and controller stream errors.

use crate::constants;
use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::{ObjectKey, OneAgentApm};
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Requeue a failed reconciliation with per-resource Fibonacci backoff
pub fn error_policy(agent: Arc<OneAgentApm>, error: &ReconcilerError, ctx: Arc<Reconciler>) -> Action {
    let key = ObjectKey::from_resource(agent.as_ref());

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = %key.name,
        resource.namespace = %key.namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}: {:?}", key, error);
    ctx.metrics().increment_reconciliation_errors();

    let (backoff_seconds, error_count) = match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states
                .entry(key.to_string())
                .or_insert_with(|| ctx.new_backoff_state());
            let backoff = state.next_after_error();
            (backoff.as_secs(), state.error_count)
        }
        Err(e) => {
            warn!("Failed to lock backoff_states: {}, using default backoff", e);
            (constants::DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS, 0)
        }
    };

    info!(
        "Retrying with Fibonacci backoff: {}s (error count: {}, trigger source: error-backoff)",
        backoff_seconds, error_count
    );

    ctx.metrics().increment_requeues_total("error-backoff");
    Action::requeue(Duration::from_secs(backoff_seconds))
}

/// Broad class of a controller stream error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    /// RBAC revoked or credentials expired
    Unauthorized,
    /// Resource version too old, the watcher relists
    Expired,
    /// API server throttling or reinitializing storage
    Throttled,
    /// Object vanished between event and reconcile
    NotFound,
    Other,
}

/// Classify a controller stream error by its rendered message
pub fn classify_watch_error(error_string: &str) -> WatchErrorKind {
    if error_string.contains("401") || error_string.contains("Unauthorized") {
        WatchErrorKind::Unauthorized
    } else if error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone")
    {
        WatchErrorKind::Expired
    } else if error_string.contains("429")
        || error_string.contains("storage is (re)initializing")
        || error_string.contains("TooManyRequests")
    {
        WatchErrorKind::Throttled
    } else if error_string.contains("ObjectNotFound")
        || (error_string.contains("404") && error_string.contains("not found"))
    {
        WatchErrorKind::NotFound
    } else {
        WatchErrorKind::Other
    }
}

/// Log a controller stream error at the level its class deserves
pub fn handle_watch_stream_error(error_string: &str) -> WatchErrorKind {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        error = %error_string
    );
    let _error_guard = error_span.enter();

    let kind = classify_watch_error(error_string);
    match kind {
        WatchErrorKind::Unauthorized => {
            error!("Watch authentication failed (401 Unauthorized), RBAC may have been revoked or the token expired");
            error!("Verify the controller can still list OneAgentAPM resources:");
            error!("  kubectl auth can-i list oneagentapms.dynatrace.com --as=system:serviceaccount:<namespace>:oneagent-apm-controller");
        }
        WatchErrorKind::Expired => {
            warn!(error_type = "410", "Watch resource version expired, watch will relist");
        }
        WatchErrorKind::Throttled => {
            warn!(error_type = "429", "API server throttling watch requests");
        }
        WatchErrorKind::NotFound => {
            warn!("Resource not found (likely deleted), continuing watch");
        }
        WatchErrorKind::Other => {
            error!("Controller stream error: {}", error_string);
        }
    }
    kind
}
