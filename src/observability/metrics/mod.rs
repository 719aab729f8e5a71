//! # Metrics
//!
//! Controller metrics held in an owned Prometheus registry.
//!
//! A [`Metrics`] value is built once at startup and shared by `Arc` between
//! the reconciler and the HTTP server. Tests build their own.

use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Controller metrics and the registry they are registered with
#[derive(Debug, Clone)]
pub struct Metrics {
    registry: Registry,
    reconciliations_total: IntCounter,
    reconciliation_errors_total: IntCounter,
    reconciliation_duration: Histogram,
    requeues_total: IntCounterVec,
    token_validations_total: IntCounterVec,
    status_writes_total: IntCounter,
    status_conflicts_total: IntCounter,
}

impl Metrics {
    /// Create all metrics and register them with a fresh registry
    ///
    /// # Errors
    ///
    /// Returns an error if a metric definition is invalid or registered twice.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let reconciliations_total = IntCounter::new(
            "oneagent_apm_reconciliations_total",
            "Total number of reconciliations",
        )?;
        let reconciliation_errors_total = IntCounter::new(
            "oneagent_apm_reconciliation_errors_total",
            "Total number of reconciliation errors",
        )?;
        let reconciliation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "oneagent_apm_reconciliation_duration_seconds",
                "Duration of reconciliation in seconds",
            )
            .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        )?;
        let requeues_total = IntCounterVec::new(
            Opts::new(
                "oneagent_apm_requeues_total",
                "Total number of reconciliation requeues",
            ),
            &["reason"],
        )?;
        let token_validations_total = IntCounterVec::new(
            Opts::new(
                "oneagent_apm_token_validations_total",
                "Token validations by token type and result",
            ),
            &["token", "result"],
        )?;
        let status_writes_total = IntCounter::new(
            "oneagent_apm_status_writes_total",
            "Total number of status updates written",
        )?;
        let status_conflicts_total = IntCounter::new(
            "oneagent_apm_status_conflicts_total",
            "Total number of status writes refused because of a version conflict",
        )?;

        registry.register(Box::new(reconciliations_total.clone()))?;
        registry.register(Box::new(reconciliation_errors_total.clone()))?;
        registry.register(Box::new(reconciliation_duration.clone()))?;
        registry.register(Box::new(requeues_total.clone()))?;
        registry.register(Box::new(token_validations_total.clone()))?;
        registry.register(Box::new(status_writes_total.clone()))?;
        registry.register(Box::new(status_conflicts_total.clone()))?;

        Ok(Self {
            registry,
            reconciliations_total,
            reconciliation_errors_total,
            reconciliation_duration,
            requeues_total,
            token_validations_total,
            status_writes_total,
            status_conflicts_total,
        })
    }

    pub fn increment_reconciliations(&self) {
        self.reconciliations_total.inc();
    }

    pub fn increment_reconciliation_errors(&self) {
        self.reconciliation_errors_total.inc();
    }

    pub fn observe_reconciliation_duration(&self, seconds: f64) {
        self.reconciliation_duration.observe(seconds);
    }

    pub fn increment_requeues_total(&self, reason: &str) {
        self.requeues_total.with_label_values(&[reason]).inc();
    }

    pub fn increment_token_validations(&self, token: &str, result: &str) {
        self.token_validations_total
            .with_label_values(&[token, result])
            .inc();
    }

    pub fn increment_status_writes(&self) {
        self.status_writes_total.inc();
    }

    pub fn increment_status_conflicts(&self) {
        self.status_conflicts_total.inc();
    }

    pub fn reconciliations(&self) -> u64 {
        self.reconciliations_total.get()
    }

    pub fn reconciliation_errors(&self) -> u64 {
        self.reconciliation_errors_total.get()
    }

    pub fn requeues(&self, reason: &str) -> u64 {
        self.requeues_total.with_label_values(&[reason]).get()
    }

    pub fn token_validations(&self, token: &str, result: &str) -> u64 {
        self.token_validations_total
            .with_label_values(&[token, result])
            .get()
    }

    pub fn status_writes(&self) -> u64 {
        self.status_writes_total.get()
    }

    pub fn status_conflicts(&self) -> u64 {
        self.status_conflicts_total.get()
    }

    /// Render all metrics in the Prometheus text exposition format
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
