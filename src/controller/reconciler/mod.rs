//! # Reconciler
//!
//! Validates the tokens referenced by a `OneAgentAPM` resource and records the
//! result as status conditions.
//!
//! A pass runs Fetching → Resolving-Secret → Validating → Persisting → Done:
//!
//! - `tokens` - secret resolution and per-token validation
//! - `status` - folds token checks into the resource status
//! - `reconcile` - the pass itself, conflict retries and requeue policy
//! - `types` - context, outcome and error types

mod reconcile;
mod status;
mod tokens;
mod types;

pub use reconcile::reconcile;
pub use types::{ReconcileOutcome, Reconciler, ReconcilerError, RequeueReason};
