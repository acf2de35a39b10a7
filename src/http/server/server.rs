//! HTTP server implementation.

use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::controller::controller::Controller;

/// Upper bound on a single request; the liveness endpoint answers in
/// microseconds, anything hanging longer is broken.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP server bound to all interfaces on the configured port.
pub struct HttpServer {
    shutdown_token: CancellationToken,
    name: String,
    addr: SocketAddr,
    router: Router,
}

impl HttpServer {
    /// Creates a new HTTP server. The router is fully built here, before any
    /// listener exists: once the port answers, the service is ready.
    pub fn new(
        shutdown_token: CancellationToken,
        name: impl Into<String>,
        port: u16,
        controllers: Vec<Box<dyn Controller>>,
    ) -> Result<Arc<Self>> {
        let router = Self::build_router(controllers);
        let addr: SocketAddr = format!("0.0.0.0:{}", port)
            .parse()
            .context("failed to parse server address")?;

        Ok(Arc::new(Self {
            shutdown_token,
            name: name.into(),
            addr,
            router,
        }))
    }

    /// Binds the listener. Split from `serve` so callers can learn the
    /// actual address when the configured port is 0.
    pub async fn bind(&self) -> Result<(TcpListener, SocketAddr)> {
        let listener = TcpListener::bind(&self.addr)
            .await
            .with_context(|| format!("failed to bind TCP listener on {}", self.addr))?;
        let local_addr = listener
            .local_addr()
            .context("failed to read bound address")?;
        Ok((listener, local_addr))
    }

    /// Serves on an already-bound listener until the shutdown token fires.
    pub async fn serve(&self, listener: TcpListener, addr: SocketAddr) -> Result<()> {
        info!(
            component = "server",
            event = "started",
            name = %self.name,
            addr = %addr,
            "server started"
        );

        let shutdown_token = self.shutdown_token.clone();
        let serve_future =
            axum::serve(listener, self.router.clone()).with_graceful_shutdown(async move {
                shutdown_token.cancelled().await;
            });

        if let Err(e) = serve_future.await {
            error!(
                component = "server",
                event = "listen_and_serve_failed",
                name = %self.name,
                addr = %addr,
                error = %e,
                "server failed to listen and serve"
            );
            return Err(e.into());
        }

        info!(
            component = "server",
            event = "stopped",
            name = %self.name,
            addr = %addr,
            "server stopped"
        );

        Ok(())
    }

    /// Builds the router with all controllers.
    fn build_router(controllers: Vec<Box<dyn Controller>>) -> Router {
        let mut router = Router::new();
        for controller in controllers {
            router = controller.add_route(router);
        }
        router
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
    }
}
