//! Startup metrics.
//!
//! # Metrics
//! - `startup_methods_resolved_total` (counter): resolved convention methods by role
//! - `startup_filters_applied_total` (counter): filters wrapped around a pipeline, by pipeline
//! - `startup_phase_total` (counter): startup phases by phase and outcome
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; the application chooses the exporter
//! - Label values are static strings
//! - Recording can be switched off process-wide from configuration

use std::sync::atomic::{AtomicBool, Ordering};

static ENABLED: AtomicBool = AtomicBool::new(true);

/// Turn recording on or off for the whole process.
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// A convention method was bound for `role`.
pub fn record_method_resolved(role: &'static str) {
    if !is_enabled() {
        return;
    }
    ::metrics::counter!("startup_methods_resolved_total", "role" => role).increment(1);
}

/// `count` filters were applied around `pipeline` (services, container, configure).
pub fn record_filters_applied(pipeline: &'static str, count: usize) {
    if count == 0 || !is_enabled() {
        return;
    }
    ::metrics::counter!("startup_filters_applied_total", "pipeline" => pipeline).increment(count as u64);
}

/// A startup phase finished with `outcome` (`ok` or `error`).
pub fn record_phase(phase: &'static str, outcome: &'static str) {
    if !is_enabled() {
        return;
    }
    ::metrics::counter!("startup_phase_total", "phase" => phase, "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_method_resolved("configure");
        record_filters_applied("services", 0);
        record_filters_applied("services", 2);
        record_phase("configure", "ok");

        set_enabled(false);
        assert!(!is_enabled());
        record_phase("configure", "error");
        set_enabled(true);
        assert!(is_enabled());
    }
}
