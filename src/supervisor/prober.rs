// Probe execution against the service's liveness endpoint.

use anyhow::{Context, Result};
use hyper::Uri;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use super::observer::ProbeOutcome;
use crate::http::client::hyper_client::HyperClient;

/// Executes a single bounded liveness probe.
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    /// Runs one probe attempt. Must resolve within the configured timeout.
    async fn probe(&self) -> ProbeOutcome;
}

/// HTTP GET prober against the loopback liveness endpoint.
///
/// The target always uses the same port the server binds; there is no
/// separate probe-port setting that could drift out of sync.
pub struct HttpProber {
    client: HyperClient,
    target: Uri,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(client: HyperClient, port: u16, path: &str, probe_timeout: Duration) -> Result<Self> {
        let target: Uri = format!("http://127.0.0.1:{}{}", port, path)
            .parse()
            .with_context(|| format!("invalid probe target for port {} path {:?}", port, path))?;

        Ok(Self {
            client,
            target,
            timeout: probe_timeout,
        })
    }

    pub fn target(&self) -> &Uri {
        &self.target
    }
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn probe(&self) -> ProbeOutcome {
        // Connection refusal, transport errors, non-success statuses and
        // deadline overruns all classify the same way.
        match timeout(self.timeout, self.client.get(self.target.clone())).await {
            Ok(Ok(response)) if response.status().is_success() => ProbeOutcome::Healthy,
            Ok(Ok(response)) => {
                debug!(
                    component = "prober",
                    event = "probe_bad_status",
                    status = %response.status(),
                    target = %self.target,
                    "probe returned non-success status"
                );
                ProbeOutcome::Unhealthy
            }
            Ok(Err(e)) => {
                debug!(
                    component = "prober",
                    event = "probe_transport_error",
                    error = %e,
                    target = %self.target,
                    "probe failed to complete"
                );
                ProbeOutcome::Unhealthy
            }
            Err(_) => {
                debug!(
                    component = "prober",
                    event = "probe_deadline_exceeded",
                    timeout = %humantime::format_duration(self.timeout),
                    target = %self.target,
                    "probe deadline exceeded"
                );
                ProbeOutcome::Unhealthy
            }
        }
    }
}
