// Consecutive-failure accounting for liveness probes.

use std::time::{Duration, Instant};

/// Outcome of a single probe attempt.
///
/// The contract makes no distinction between "service down" and "service
/// erroring": connection refusal, timeout and non-success statuses all
/// collapse into `Unhealthy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Healthy,
    Unhealthy,
}

impl ProbeOutcome {
    pub fn is_healthy(self) -> bool {
        matches!(self, ProbeOutcome::Healthy)
    }
}

/// Ephemeral record produced by every observation. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeRecord {
    pub at: Instant,
    pub outcome: ProbeOutcome,
    /// Failures counted since the last healthy result (post grace window).
    pub consecutive_failures: u32,
    /// Set on the exact observation that crossed the retries threshold.
    pub crossed_threshold: bool,
    /// The observation fell inside the start grace window.
    pub in_grace_window: bool,
}

/// Externally-driven liveness observer.
///
/// Owned by the supervising orchestrator, never by the service itself. Probe
/// failures inside the grace window after (re)start do not count; afterwards
/// each unhealthy result increments the counter by exactly one and any
/// healthy result resets it to zero. The process is marked failed exactly
/// while the counter has reached the retries threshold: a healthy result
/// returns it to healthy, the way a passing container health check does,
/// which also re-arms escalation for a later failure episode.
#[derive(Debug)]
pub struct HealthObserver {
    started_at: Instant,
    start_period: Duration,
    retries: u32,
    consecutive_failures: u32,
    failed: bool,
}

impl HealthObserver {
    pub fn new(started_at: Instant, start_period: Duration, retries: u32) -> Self {
        Self {
            started_at,
            start_period,
            retries,
            consecutive_failures: 0,
            failed: false,
        }
    }

    /// Feeds one probe outcome into the observer.
    ///
    /// Mutates nothing but the observer's own counter, so observing the same
    /// service state repeatedly always yields the same classification.
    pub fn observe(&mut self, at: Instant, outcome: ProbeOutcome) -> ProbeRecord {
        let in_grace_window = at < self.started_at + self.start_period;
        let mut crossed_threshold = false;

        match outcome {
            ProbeOutcome::Healthy => {
                self.consecutive_failures = 0;
                self.failed = false;
            }
            ProbeOutcome::Unhealthy if in_grace_window => {
                // Startup tolerance: failures here never count.
            }
            ProbeOutcome::Unhealthy => {
                self.consecutive_failures += 1;
                if !self.failed && self.consecutive_failures >= self.retries {
                    self.failed = true;
                    crossed_threshold = true;
                }
            }
        }

        ProbeRecord {
            at,
            outcome,
            consecutive_failures: self.consecutive_failures,
            crossed_threshold,
            in_grace_window,
        }
    }

    /// True while the current failure episode has crossed the retries
    /// threshold. Cleared by any healthy result or by `reset`.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Re-arms the observer after a restart, opening a fresh grace window.
    pub fn reset(&mut self, started_at: Instant) {
        self.started_at = started_at;
        self.consecutive_failures = 0;
        self.failed = false;
    }
}
