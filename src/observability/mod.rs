//! # Observability
//!
//! Prometheus metrics for the controller.

pub mod metrics;

pub use metrics::Metrics;
