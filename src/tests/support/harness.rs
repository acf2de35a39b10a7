// Integration test harness: boots the real service server on loopback.

use axum::http::StatusCode;
use axum::{routing::get, Router};
use std::sync::Once;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::app::server::ServiceServer;

static METRICS_INIT: Once = Once::new();

/// Installs the Prometheus recorder once per test process.
pub fn init_metrics() {
    METRICS_INIT.call_once(|| {
        let _ = crate::controller::metrics::init_prometheus_exporter();
    });
}

/// Reserves an ephemeral port with nothing listening on it afterwards.
pub async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Starts the real service server on the given port and waits until its
/// liveness endpoint answers. Cancel the returned token to stop it.
pub async fn spawn_service(port: u16) -> CancellationToken {
    let token = CancellationToken::new();
    let server = ServiceServer::new(token.clone(), "livewatch-test", port).unwrap();

    tokio::spawn(async move {
        let (listener, addr) = server.bind().await.unwrap();
        let _ = server.serve(listener, addr).await;
    });

    wait_until_serving(port).await;
    token
}

/// Occupies the given port with a server that answers 503 on the root path.
///
/// Stands in for a degraded process holding the service's port: probes reach
/// it and fail, and the real server cannot bind until it is cancelled.
pub async fn spawn_unhealthy_occupant(port: u16) -> CancellationToken {
    let token = CancellationToken::new();
    let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    let router = Router::new().route(
        "/",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "degraded") }),
    );

    let shutdown = token.clone();
    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
            })
            .await
            .unwrap();
    });

    token
}

/// Polls the liveness endpoint until the service answers.
pub async fn wait_until_serving(port: u16) {
    let url = format!("http://127.0.0.1:{}/", port);
    for _ in 0..200 {
        if let Ok(response) = reqwest::get(&url).await {
            if response.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("service on port {} never became ready", port);
}

/// Waits until connections to the port are refused again.
pub async fn wait_until_stopped(port: u16) {
    let url = format!("http://127.0.0.1:{}/", port);
    for _ in 0..200 {
        if reqwest::get(&url).await.is_err() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("service on port {} never stopped", port);
}
