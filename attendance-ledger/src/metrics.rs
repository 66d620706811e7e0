//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `attendance_registrations_total` - Successful registrations
//! - `attendance_marks_total` - Self-marked attendance writes
//! - `attendance_overrides_total` - Administrator attendance overrides
//! - `attendance_evictions_total` - Eviction requests accepted
//! - `attendance_rejections_total{reason}` - Mutations rejected by the writer, by error code
//! - `attendance_operation_duration_seconds` - Writer-side operation latency
//!
//! Each ledger owns its own [`Registry`]; nothing is registered globally.

use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Successful registrations
    pub registrations_total: IntCounter,

    /// Self-marked attendance writes
    pub marks_total: IntCounter,

    /// Administrator overrides
    pub overrides_total: IntCounter,

    /// Evictions accepted
    pub evictions_total: IntCounter,

    /// Rejections by reason
    pub rejections_total: IntCounterVec,

    /// Operation duration histogram
    pub operation_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let registrations_total = IntCounter::new(
            "attendance_registrations_total",
            "Total number of successful registrations",
        )?;
        registry.register(Box::new(registrations_total.clone()))?;

        let marks_total = IntCounter::new(
            "attendance_marks_total",
            "Total number of self-marked attendance writes",
        )?;
        registry.register(Box::new(marks_total.clone()))?;

        let overrides_total = IntCounter::new(
            "attendance_overrides_total",
            "Total number of administrator attendance overrides",
        )?;
        registry.register(Box::new(overrides_total.clone()))?;

        let evictions_total = IntCounter::new(
            "attendance_evictions_total",
            "Total number of accepted eviction requests",
        )?;
        registry.register(Box::new(evictions_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new(
                "attendance_rejections_total",
                "Total number of rejected mutations",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let operation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "attendance_operation_duration_seconds",
                "Histogram of writer-side operation latencies",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.010, 0.050, 0.100, 0.500]),
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        Ok(Self {
            registrations_total,
            marks_total,
            overrides_total,
            evictions_total,
            rejections_total,
            operation_duration,
            registry,
        })
    }

    /// Record a rejected mutation
    pub fn record_rejection(&self, reason: &str) {
        self.rejections_total.with_label_values(&[reason]).inc();
    }

    /// Record operation duration
    pub fn record_duration(&self, duration_seconds: f64) {
        self.operation_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("registrations_total", &self.registrations_total.get())
            .field("marks_total", &self.marks_total.get())
            .field("overrides_total", &self.overrides_total.get())
            .field("evictions_total", &self.evictions_total.get())
            .finish_non_exhaustive()
    }
}
