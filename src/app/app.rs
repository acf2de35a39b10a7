// Application wiring: service process plus its liveness supervisor.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{Config, ConfigTrait, OnFailed};
use crate::supervisor::{Escalation, HttpProber, Supervisor};

use super::server::ServiceServer;

const DEFAULT_SERVICE_NAME: &str = "livewatch";

/// Encapsulates the service process and its supervising probe loop.
///
/// The port is resolved exactly once and shared between the server bind and
/// the probe target, so the two can never disagree.
pub struct App {
    shutdown_token: CancellationToken,
    on_failed: OnFailed,
    server: Arc<ServiceServer>,
    supervisor: Arc<Supervisor>,
    escalation_rx: Mutex<Option<mpsc::Receiver<Escalation>>>,
}

impl App {
    pub async fn new(shutdown_token: CancellationToken, cfg: Config) -> Result<Self> {
        let port = cfg.resolve_port().context("failed to resolve bind port")?;
        let params = cfg.probe_params();
        let name = cfg
            .api()
            .and_then(|api| api.name.clone())
            .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string());

        let server = Arc::new(ServiceServer::new(shutdown_token.clone(), &name, port)?);

        let client = crate::http::client::create_client();
        let prober = Arc::new(HttpProber::new(client, port, &params.path, params.timeout)?);
        info!(
            component = "app",
            event = "probe_target_resolved",
            target = %prober.target(),
            "probe targets the same port the server binds"
        );

        let (escalation_tx, escalation_rx) = mpsc::channel::<Escalation>(4);
        let on_failed = params.on_failed;
        let supervisor = Arc::new(Supervisor::new(params, prober, escalation_tx));

        Ok(Self {
            shutdown_token,
            on_failed,
            server,
            supervisor,
            escalation_rx: Mutex::new(Some(escalation_rx)),
        })
    }

    /// Starts the server, the probe loop and the escalation handler.
    ///
    /// Registers two drain points with the graceful shutdown handler: the
    /// server task and the supervisor loop.
    pub async fn serve(&self, gsh: Arc<crate::shutdown::GracefulShutdown>) -> Result<()> {
        gsh.add(2);

        let server_handle = Arc::new(Mutex::new(Some(Self::spawn_server(self.server.clone()))));

        // Drain point 1: await the (possibly relaunched) server task once
        // cancellation fires.
        {
            let shutdown_token = self.shutdown_token.clone();
            let server_handle = server_handle.clone();
            let gsh = gsh.clone();
            tokio::task::spawn(async move {
                shutdown_token.cancelled().await;
                let handle = server_handle.lock().await.take();
                if let Some(handle) = handle {
                    let _ = handle.await;
                }
                gsh.done();
            });
        }

        // Drain point 2: the probe loop.
        {
            let supervisor = self.supervisor.clone();
            let shutdown_token = self.shutdown_token.clone();
            let gsh = gsh.clone();
            tokio::task::spawn(async move {
                supervisor.run(shutdown_token).await;
                gsh.done();
            });
        }

        // Escalation handler: applies the configured deployment policy when
        // the supervisor marks the service failed.
        let escalation_rx = self
            .escalation_rx
            .lock()
            .await
            .take()
            .context("app already serving")?;
        self.spawn_escalation_handler(escalation_rx, server_handle);

        info!(
            component = "app",
            event = "started",
            policy = ?self.on_failed,
            "application lifecycle"
        );

        Ok(())
    }

    fn spawn_server(server: Arc<ServiceServer>) -> JoinHandle<()> {
        tokio::task::spawn(async move {
            let (listener, addr) = match server.bind().await {
                Ok(bound) => bound,
                Err(e) => {
                    error!(
                        component = "app",
                        scope = "server",
                        event = "bind_failed",
                        error = %e,
                        "server failed to bind"
                    );
                    return;
                }
            };
            if let Err(e) = server.serve(listener, addr).await {
                error!(
                    component = "app",
                    scope = "server",
                    event = "serve_failed",
                    error = %e,
                    "server failed to serve"
                );
            }
        })
    }

    fn spawn_escalation_handler(
        &self,
        mut escalation_rx: mpsc::Receiver<Escalation>,
        server_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
    ) {
        let shutdown_token = self.shutdown_token.clone();
        let on_failed = self.on_failed;
        let server = self.server.clone();
        let supervisor = self.supervisor.clone();

        tokio::task::spawn(async move {
            loop {
                let escalation = tokio::select! {
                    _ = shutdown_token.cancelled() => return,
                    received = escalation_rx.recv() => match received {
                        Some(escalation) => escalation,
                        None => return,
                    },
                };

                warn!(
                    component = "app",
                    scope = "escalation",
                    event = "service_failed",
                    consecutive_failures = escalation.consecutive_failures,
                    server_task_alive = server.is_alive(),
                    policy = ?on_failed,
                    "service marked failed, applying policy"
                );

                match on_failed {
                    OnFailed::Observe => {
                        // Stay marked failed; the counter keeps the episode
                        // from re-escalating until the service is restarted.
                    }
                    OnFailed::Shutdown => {
                        shutdown_token.cancel();
                        return;
                    }
                    OnFailed::Restart => {
                        crate::metrics::record_restart();
                        let old = server_handle.lock().await.take();
                        if let Some(old) = old {
                            old.abort();
                            let _ = old.await;
                        }
                        info!(
                            component = "app",
                            scope = "escalation",
                            event = "service_restarting",
                            "relaunching server task"
                        );
                        *server_handle.lock().await = Some(Self::spawn_server(server.clone()));
                        // Fresh grace window: the relaunched server gets the
                        // same startup tolerance as the first launch.
                        supervisor.mark_restarted().await;
                    }
                }
            }
        });
    }
}
