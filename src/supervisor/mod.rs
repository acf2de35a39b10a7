// Package supervisor runs the periodic liveness probe loop.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub mod observer;
pub mod prober;


pub use observer::{HealthObserver, ProbeOutcome, ProbeRecord};
pub use prober::{HttpProber, Prober};

use crate::config::ProbeParams;

/// Emitted once per failure episode when the retries threshold is crossed.
/// What happens next (restart, shutdown) is deployment policy, decided by
/// the receiver.
#[derive(Debug, Clone, Copy)]
pub struct Escalation {
    pub at: Instant,
    pub consecutive_failures: u32,
}

/// Periodic probe scheduler owning the liveness observer.
///
/// The observer state lives here, external to the probed service; the service
/// never mutates its own health classification.
pub struct Supervisor {
    params: ProbeParams,
    prober: Arc<dyn Prober>,
    observer: Mutex<HealthObserver>,
    escalation_tx: mpsc::Sender<Escalation>,
}

impl Supervisor {
    pub fn new(
        params: ProbeParams,
        prober: Arc<dyn Prober>,
        escalation_tx: mpsc::Sender<Escalation>,
    ) -> Self {
        let observer = HealthObserver::new(Instant::now(), params.start_period, params.retries);
        Self {
            params,
            prober,
            observer: Mutex::new(observer),
            escalation_tx,
        }
    }

    /// Re-arms the observer after the service was relaunched. Failures do not
    /// count again until the fresh grace window has elapsed.
    pub async fn mark_restarted(&self) {
        self.observer.lock().await.reset(Instant::now());
        info!(
            component = "supervisor",
            event = "observer_reset",
            start_period = %humantime::format_duration(self.params.start_period),
            "observer re-armed with a fresh grace window"
        );
    }

    pub async fn is_failed(&self) -> bool {
        self.observer.lock().await.is_failed()
    }

    /// Runs the probe loop until the token is cancelled.
    ///
    /// One probe is in flight at a time; config validation guarantees the
    /// probe timeout is shorter than the tick interval.
    pub async fn run(&self, shutdown_token: CancellationToken) {
        let mut tick = interval(self.params.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // The first interval tick fires immediately; the grace window makes
        // that probe harmless while the service is still coming up.
        let mut last_outcome: Option<ProbeOutcome> = None;

        info!(
            component = "supervisor",
            event = "started",
            interval = %humantime::format_duration(self.params.interval),
            timeout = %humantime::format_duration(self.params.timeout),
            start_period = %humantime::format_duration(self.params.start_period),
            retries = self.params.retries,
            "probe loop started"
        );

        loop {
            tokio::select! {
                _ = shutdown_token.cancelled() => {
                    info!(
                        component = "supervisor",
                        event = "stopped",
                        "probe loop stopped"
                    );
                    return;
                }
                _ = tick.tick() => {
                    let outcome = self.prober.probe().await;
                    let record = self.observer.lock().await.observe(Instant::now(), outcome);
                    self.account(record, &mut last_outcome).await;
                }
            }
        }
    }

    /// Logs transitions, updates metrics and escalates threshold crossings.
    async fn account(&self, record: ProbeRecord, last_outcome: &mut Option<ProbeOutcome>) {
        crate::metrics::record_probe(record.outcome.is_healthy(), record.consecutive_failures);

        let changed = *last_outcome != Some(record.outcome);
        *last_outcome = Some(record.outcome);

        match record.outcome {
            ProbeOutcome::Healthy if changed => {
                info!(
                    component = "supervisor",
                    event = "service_healthy",
                    "service answered the liveness probe"
                );
            }
            ProbeOutcome::Unhealthy if record.in_grace_window => {
                info!(
                    component = "supervisor",
                    event = "probe_failed_in_grace_window",
                    "probe failure ignored during startup grace window"
                );
            }
            ProbeOutcome::Unhealthy => {
                warn!(
                    component = "supervisor",
                    event = "probe_failed",
                    consecutive_failures = record.consecutive_failures,
                    retries = self.params.retries,
                    "liveness probe failed"
                );
            }
            _ => {}
        }

        if record.crossed_threshold {
            crate::metrics::record_escalation();
            warn!(
                component = "supervisor",
                event = "service_marked_failed",
                consecutive_failures = record.consecutive_failures,
                "failure threshold crossed, escalating"
            );
            let escalation = Escalation {
                at: record.at,
                consecutive_failures: record.consecutive_failures,
            };
            if self.escalation_tx.send(escalation).await.is_err() {
                warn!(
                    component = "supervisor",
                    event = "escalation_dropped",
                    "no escalation receiver, failure episode not acted on"
                );
            }
        }
    }
}
