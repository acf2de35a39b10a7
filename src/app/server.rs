// HTTP server assembly for the service process.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::controller;
use crate::http::{Controller, HttpServer};

/// Attempts to re-acquire the port after a restart; the aborted task's
/// listener may take a moment to release it.
const BIND_ATTEMPTS: u32 = 5;
const BIND_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Wraps the HTTP server with its controller set and an alive flag.
///
/// The flag tracks whether the serve future is currently running; the
/// supervisor uses it to tell "server task gone" apart from "serving but
/// failing probes" when a failure episode escalates.
pub struct ServiceServer {
    server: Arc<HttpServer>,
    is_server_alive: Arc<AtomicBool>,
}

impl ServiceServer {
    pub fn new(ctx: CancellationToken, name: &str, port: u16) -> Result<Self> {
        let server = HttpServer::new(ctx, name, port, Self::controllers(name))?;
        Ok(Self {
            server,
            is_server_alive: Arc::new(AtomicBool::new(false)),
        })
    }

    /// True while the serve future is running.
    pub fn is_alive(&self) -> bool {
        self.is_server_alive.load(Ordering::Relaxed)
    }

    /// Binds the listener, retrying briefly so a relaunch can win the port
    /// back from a just-aborted predecessor.
    pub async fn bind(&self) -> Result<(TcpListener, SocketAddr)> {
        let mut attempt = 1;
        loop {
            match self.server.bind().await {
                Ok(bound) => return Ok(bound),
                Err(e) if attempt < BIND_ATTEMPTS => {
                    warn!(
                        component = "server",
                        event = "bind_retry",
                        attempt = attempt,
                        error = %e,
                        "bind failed, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(BIND_RETRY_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Serves on a bound listener until shutdown (blocking call).
    pub async fn serve(&self, listener: TcpListener, addr: SocketAddr) -> Result<()> {
        self.is_server_alive.store(true, Ordering::Relaxed);
        let result = self.server.serve(listener, addr).await;
        self.is_server_alive.store(false, Ordering::Relaxed);
        result
    }

    /// Returns the controllers exposed by the service.
    fn controllers(name: &str) -> Vec<Box<dyn Controller>> {
        vec![
            // Liveness endpoint probed by the orchestrator
            Box::new(controller::HealthController::new(name)),
            // Prometheus metrics endpoint
            Box::new(controller::PrometheusMetricsController::new()),
        ]
    }
}
