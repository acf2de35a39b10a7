// Probe and lifecycle metrics recorded through the `metrics` facade.

pub const PROBE_TOTAL: &str = "livewatch_probe_total";
pub const PROBE_CONSECUTIVE_FAILURES: &str = "livewatch_probe_consecutive_failures";
pub const ESCALATIONS_TOTAL: &str = "livewatch_escalations_total";
pub const SERVICE_RESTARTS_TOTAL: &str = "livewatch_service_restarts_total";

/// Records one completed probe attempt.
pub fn record_probe(healthy: bool, consecutive_failures: u32) {
    let outcome = if healthy { "healthy" } else { "unhealthy" };
    metrics::counter!(PROBE_TOTAL, "outcome" => outcome).increment(1);
    metrics::gauge!(PROBE_CONSECUTIVE_FAILURES).set(consecutive_failures as f64);
}

/// Records a crossed failure threshold.
pub fn record_escalation() {
    metrics::counter!(ESCALATIONS_TOTAL).increment(1);
}

/// Records a service relaunch issued by the restart policy.
pub fn record_restart() {
    metrics::counter!(SERVICE_RESTARTS_TOTAL).increment(1);
}
