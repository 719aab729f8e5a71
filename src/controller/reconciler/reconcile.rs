//! # Reconcile
//!
//! Fetch, resolve secret, validate, persist, decide.
//!
//! Status writes carry the resource version read at fetch time. A conflicting
//! write restarts the whole pass from a fresh fetch, up to
//! `max_conflict_retries` times.

use super::status::compute_status;
use super::tokens::{CheckClass, TokenCheck};
use super::types::{ReconcileOutcome, Reconciler, ReconcilerError, RequeueReason};
use crate::crd::{ObjectKey, OneAgentApm};
use kube_runtime::controller::Action;
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn, Instrument};

/// Entry point for `kube_runtime::Controller`
pub async fn reconcile(
    agent: Arc<OneAgentApm>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let key = ObjectKey::from_resource(agent.as_ref());
    ctx.reconcile_key(&key).await.map(Action::from)
}

impl Reconciler {
    /// Drive the resource identified by `key` toward its desired status
    ///
    /// # Errors
    ///
    /// Returns an error for object store failures and when the status write
    /// keeps conflicting.
    pub async fn reconcile_key(&self, key: &ObjectKey) -> Result<ReconcileOutcome, ReconcilerError> {
        let span = tracing::span!(
            tracing::Level::INFO,
            "controller.reconcile",
            resource.name = %key.name,
            resource.namespace = %key.namespace
        );

        let start = Instant::now();
        self.metrics.increment_reconciliations();

        let result = self
            .reconcile_with_retries(key)
            .instrument(span.clone())
            .await;
        let _guard = span.enter();

        self.metrics
            .observe_reconciliation_duration(start.elapsed().as_secs_f64());
        if let Ok(outcome) = &result {
            self.metrics.increment_requeues_total(outcome.reason.as_str());
            info!(
                reason = %outcome.reason,
                requeue_after_secs = outcome.requeue_after.map(|d| d.as_secs()),
                "Reconciliation finished"
            );
        }
        result
    }

    async fn reconcile_with_retries(
        &self,
        key: &ObjectKey,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        let attempts = self.config.max_conflict_retries.max(1);

        for attempt in 1..=attempts {
            let Some(agent) = self.store.get_agent(key).await? else {
                info!("Resource no longer exists, nothing to do");
                self.clear_backoff(key);
                return Ok(ReconcileOutcome::await_change(RequeueReason::Deleted));
            };

            let checks = if agent.spec.update_token_policy {
                Some(self.check_tokens(&agent).await?)
            } else {
                debug!("Token validation disabled for this resource");
                None
            };

            let status = compute_status(&agent, checks.as_deref());
            if agent.status.as_ref() != Some(&status) {
                let mut updated = agent.clone();
                updated.status = Some(status);

                match self.store.replace_status(&updated).await {
                    Ok(()) => {
                        self.metrics.increment_status_writes();
                        debug!("Status updated");
                    }
                    Err(e) if e.is_conflict() => {
                        self.metrics.increment_status_conflicts();
                        warn!(attempt, error = %e, "Status write conflicted, refetching");
                        continue;
                    }
                    Err(e) if e.is_not_found() => {
                        info!("Resource deleted before status could be written");
                        self.clear_backoff(key);
                        return Ok(ReconcileOutcome::await_change(RequeueReason::Deleted));
                    }
                    Err(e) => return Err(e.into()),
                }
            } else {
                debug!("Status unchanged, skipping write");
            }

            return Ok(self.decide(key, checks.as_deref().unwrap_or_default()));
        }

        Err(ReconcilerError::ConflictRetriesExhausted {
            key: key.to_string(),
            attempts,
        })
    }

    /// Combine per-token results into one requeue decision
    fn decide(&self, key: &ObjectKey, checks: &[TokenCheck]) -> ReconcileOutcome {
        let operator_error = checks
            .iter()
            .any(|c| c.class == CheckClass::OperatorError);
        let backoff = if operator_error {
            Some(self.next_backoff(key))
        } else {
            self.clear_backoff(key);
            None
        };

        let resync = ReconcileOutcome::after(self.config.resync_interval, RequeueReason::Resync);
        let mut outcomes = checks.iter().map(|check| match check.class {
            CheckClass::Ready => resync,
            CheckClass::Transient => ReconcileOutcome::after(
                self.config.transient_requeue_interval,
                RequeueReason::Transient,
            ),
            CheckClass::Rejected => ReconcileOutcome::after(
                self.config.rejected_requeue_interval,
                RequeueReason::Rejected,
            ),
            CheckClass::OperatorError => ReconcileOutcome::after(
                backoff.unwrap_or(self.config.transient_requeue_interval),
                RequeueReason::OperatorError,
            ),
            CheckClass::ConfigError => ReconcileOutcome::await_change(RequeueReason::ConfigError),
        });

        match outcomes.next() {
            Some(first) => outcomes.fold(first, ReconcileOutcome::earliest),
            None => resync,
        }
    }

    fn next_backoff(&self, key: &ObjectKey) -> Duration {
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let state = states
            .entry(key.to_string())
            .or_insert_with(|| self.new_backoff_state());
        let backoff = state.next_after_error();
        info!(
            error_count = state.error_count,
            backoff_secs = backoff.as_secs(),
            "Operator error, retrying with Fibonacci backoff"
        );
        backoff
    }

    fn clear_backoff(&self, key: &ObjectKey) {
        self.backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key.to_string());
    }
}
