//! # Controller
//!
//! Reconciliation logic, retry backoff and the metrics/probe server.

pub mod backoff;
pub mod reconciler;
pub mod server;
