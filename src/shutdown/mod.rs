// Package shutdown provides graceful shutdown functionality.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
#[error("graceful shutdown timeout exceeded")]
pub struct TimeoutError;

/// Graceful shutdown handler: a cancellation token paired with a
/// semaphore-based wait group for in-flight tasks.
#[derive(Clone)]
pub struct GracefulShutdown {
    shutdown_token: CancellationToken,
    timeout: Arc<tokio::sync::RwLock<Duration>>,
    registered: Arc<std::sync::atomic::AtomicUsize>,
    completions: Arc<tokio::sync::Semaphore>,
}

impl GracefulShutdown {
    pub fn new(shutdown_token: CancellationToken) -> Self {
        Self {
            shutdown_token,
            timeout: Arc::new(tokio::sync::RwLock::new(Duration::from_secs(10))),
            registered: Arc::new(std::sync::atomic::AtomicUsize::new(0)),
            completions: Arc::new(tokio::sync::Semaphore::new(0)),
        }
    }

    /// Sets the drain timeout applied after cancellation.
    pub async fn set_graceful_timeout(&self, timeout: Duration) {
        *self.timeout.write().await = timeout;
    }

    /// Registers `n` tasks that must report back before shutdown completes.
    pub fn add(&self, n: usize) {
        self.registered
            .fetch_add(n, std::sync::atomic::Ordering::SeqCst);
    }

    /// Marks one registered task as done.
    pub fn done(&self) {
        self.completions.add_permits(1);
    }

    /// Waits for an OS stop signal or token cancellation, then drains.
    ///
    /// Orchestrators stop containers with SIGTERM; SIGINT covers manual runs.
    pub async fn await_shutdown(&self) -> Result<()> {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

        tokio::select! {
            _ = signal::ctrl_c() => {
                info!(
                    component = "graceful-shutdown",
                    event = "os_signal",
                    signal = "SIGINT",
                    "cancellation started"
                );
            }
            _ = sigterm.recv() => {
                info!(
                    component = "graceful-shutdown",
                    event = "os_signal",
                    signal = "SIGTERM",
                    "cancellation started"
                );
            }
            _ = self.shutdown_token.cancelled() => {
                info!(
                    component = "graceful-shutdown",
                    event = "ctx_done",
                    "cancellation started"
                );
            }
        }

        self.cancel_and_await_with_timeout().await
    }

    async fn cancel_and_await_with_timeout(&self) -> Result<()> {
        self.shutdown_token.cancel();

        let timeout_duration = *self.timeout.read().await;

        match timeout(timeout_duration, self.wait_for_completion()).await {
            Ok(_) => {
                info!(
                    component = "graceful-shutdown",
                    event = "shutdown_success",
                    "service was gracefully shut down"
                );
                Ok(())
            }
            Err(_) => {
                warn!(
                    component = "graceful-shutdown",
                    event = "shutdown_timeout",
                    timeout_secs = timeout_duration.as_secs(),
                    "not all tasks were closed within timeout"
                );
                Err(TimeoutError.into())
            }
        }
    }

    async fn wait_for_completion(&self) {
        // Every registered task posts one permit through done(); draining is
        // complete once all of them have reported back.
        let registered = self.registered.load(std::sync::atomic::Ordering::SeqCst) as u32;
        let _ = self.completions.acquire_many(registered).await;
    }
}
