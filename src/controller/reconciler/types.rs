//! # Reconciler Types
//!
//! Reconciler context, outcome and error types.

use crate::config::ControllerConfig;
use crate::controller::backoff::BackoffState;
use crate::dtclient::ClientFactory;
use crate::observability::Metrics;
use crate::store::{ObjectStore, StoreError};
use kube_runtime::controller::Action;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Reconciler context shared by every reconciliation
#[derive(Debug, Clone)]
pub struct Reconciler {
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) clients: ClientFactory,
    pub(crate) config: ControllerConfig,
    pub(crate) metrics: Arc<Metrics>,
    /// Per-resource backoff state, keyed by "namespace/name"
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        clients: ClientFactory,
        config: ControllerConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            clients,
            config,
            metrics,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub(crate) fn new_backoff_state(&self) -> BackoffState {
        BackoffState::new(self.config.backoff_min_secs, self.config.backoff_max_secs)
    }
}

/// Infrastructure failures surfaced to the controller runtime
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("object store error: {0}")]
    Store(#[from] StoreError),
    #[error("status of {key} still conflicting after {attempts} attempts")]
    ConflictRetriesExhausted { key: String, attempts: u32 },
}

/// Why a reconciliation asked (or did not ask) to run again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequeueReason {
    /// Everything checked out, periodic resync
    Resync,
    /// Dynatrace API unreachable or failing
    Transient,
    /// A token was rejected or lacks scopes
    Rejected,
    /// Secret or token key missing, retried with backoff
    OperatorError,
    /// Spec cannot work as written, wait for it to change
    ConfigError,
    /// Resource no longer exists
    Deleted,
}

impl RequeueReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequeueReason::Resync => "resync",
            RequeueReason::Transient => "transient",
            RequeueReason::Rejected => "rejected",
            RequeueReason::OperatorError => "operator-error",
            RequeueReason::ConfigError => "config-error",
            RequeueReason::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for RequeueReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a reconciliation that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Delay before the next reconciliation, `None` to wait for a change
    pub requeue_after: Option<Duration>,
    pub reason: RequeueReason,
}

impl ReconcileOutcome {
    pub fn after(requeue_after: Duration, reason: RequeueReason) -> Self {
        Self {
            requeue_after: Some(requeue_after),
            reason,
        }
    }

    pub fn await_change(reason: RequeueReason) -> Self {
        Self {
            requeue_after: None,
            reason,
        }
    }

    pub fn requeue(&self) -> bool {
        self.requeue_after.is_some()
    }

    /// Outcome that runs again first; ties keep `self`
    pub fn earliest(self, other: Self) -> Self {
        match (self.requeue_after, other.requeue_after) {
            (Some(mine), Some(theirs)) if theirs < mine => other,
            (None, Some(_)) => other,
            _ => self,
        }
    }
}

impl From<ReconcileOutcome> for Action {
    fn from(outcome: ReconcileOutcome) -> Self {
        match outcome.requeue_after {
            Some(after) => Action::requeue(after),
            None => Action::await_change(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_earliest_prefers_shorter_requeue() {
        let resync = ReconcileOutcome::after(Duration::from_secs(1800), RequeueReason::Resync);
        let transient = ReconcileOutcome::after(Duration::from_secs(30), RequeueReason::Transient);
        assert_eq!(resync.earliest(transient), transient);
        assert_eq!(transient.earliest(resync), transient);
    }

    #[test]
    fn test_earliest_treats_no_requeue_as_never() {
        let config = ReconcileOutcome::await_change(RequeueReason::ConfigError);
        let rejected = ReconcileOutcome::after(Duration::from_secs(900), RequeueReason::Rejected);
        assert_eq!(config.earliest(rejected), rejected);
        assert_eq!(rejected.earliest(config), rejected);
        assert!(!config.earliest(config).requeue());
    }

    #[test]
    fn test_into_action() {
        let outcome = ReconcileOutcome::after(Duration::from_secs(30), RequeueReason::Transient);
        assert_eq!(
            Action::from(outcome),
            Action::requeue(Duration::from_secs(30))
        );
        assert_eq!(
            Action::from(ReconcileOutcome::await_change(RequeueReason::Deleted)),
            Action::await_change()
        );
    }
}
