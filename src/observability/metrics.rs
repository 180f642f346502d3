//! # Metrics Collection
//!
//! Sanitizer and sync-cycle counters recorded through the `metrics` facade.
//! No exporter is installed here; the embedding binary picks one.

use std::sync::OnceLock;

use ::tracing::info;
use metrics::{counter, describe_counter, Unit};

use crate::config::ObservabilityConfig;

pub const ROUTES_REPLACED_TOTAL: &str = "flowplane_sanitizer_routes_replaced_total";
pub const SANITIZER_RUNS_TOTAL: &str = "flowplane_sanitizer_runs_total";
pub const SYNC_CYCLES_TOTAL: &str = "flowplane_sync_cycles_total";

/// Result label attached to run and cycle counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Ran and changed the snapshot
    Repaired,
    /// Activation condition not met, or nothing to change
    Skipped,
    /// Published a new snapshot
    Published,
    /// Content unchanged since the last publish
    Unchanged,
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Repaired => "repaired",
            Outcome::Skipped => "skipped",
            Outcome::Published => "published",
            Outcome::Unchanged => "unchanged",
            Outcome::Failed => "failed",
        }
    }
}

/// Metrics recorder that tracks sanitizer activity
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Record route references pointed at the fallback cluster
    pub fn record_routes_replaced(&self, sanitizer: &str, count: usize) {
        let labels = [("sanitizer", sanitizer.to_string())];
        counter!(ROUTES_REPLACED_TOTAL, &labels).increment(count as u64);
    }

    pub fn record_sanitizer_run(&self, sanitizer: &str, outcome: Outcome) {
        let labels =
            [("sanitizer", sanitizer.to_string()), ("outcome", outcome.as_str().to_string())];
        counter!(SANITIZER_RUNS_TOTAL, &labels).increment(1);
    }

    pub fn record_sync_cycle(&self, outcome: Outcome) {
        let labels = [("outcome", outcome.as_str().to_string())];
        counter!(SYNC_CYCLES_TOTAL, &labels).increment(1);
    }

    pub fn register_sanitizer_metrics(&self) {
        describe_counter!(
            ROUTES_REPLACED_TOTAL,
            Unit::Count,
            "Route cluster references replaced with the fallback cluster"
        );
        describe_counter!(SANITIZER_RUNS_TOTAL, Unit::Count, "Sanitizer invocations by outcome");
        describe_counter!(SYNC_CYCLES_TOTAL, Unit::Count, "Sync cycles by outcome");
    }
}

/// Global metrics recorder instance
static METRICS: OnceLock<MetricsRecorder> = OnceLock::new();

/// Enable metric recording. Later calls are no-ops.
pub fn init_metrics(config: &ObservabilityConfig) {
    if !config.enable_metrics {
        return;
    }

    let mut registered = false;
    let recorder = METRICS.get_or_init(|| {
        registered = true;
        MetricsRecorder::new()
    });

    if registered {
        recorder.register_sanitizer_metrics();
        info!("Sanitizer metrics initialized");
    }
}

/// Get the global metrics recorder
pub fn get_metrics() -> Option<&'static MetricsRecorder> {
    METRICS.get()
}

pub fn record_routes_replaced(sanitizer: &str, count: usize) {
    if let Some(metrics) = get_metrics() {
        metrics.record_routes_replaced(sanitizer, count);
    }
}

pub fn record_sanitizer_run(sanitizer: &str, outcome: Outcome) {
    if let Some(metrics) = get_metrics() {
        metrics.record_sanitizer_run(sanitizer, outcome);
    }
}

pub fn record_sync_cycle(outcome: Outcome) {
    if let Some(metrics) = get_metrics() {
        metrics.record_sync_cycle(outcome);
    }
}
