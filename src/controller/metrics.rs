//! Prometheus metrics controller.

use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use std::sync::OnceLock;

use crate::http::Controller;

pub const PROMETHEUS_METRICS_PATH: &str = "/metrics";

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Process metrics collector, refreshed at every scrape.
static PROCESS_COLLECTOR: OnceLock<metrics_process::Collector> = OnceLock::new();

/// Initializes the Prometheus metrics exporter.
/// Must be called BEFORE the tokio runtime starts to avoid runtime conflicts
/// inside the recorder installation.
pub fn init_prometheus_exporter() -> anyhow::Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {}", e))?;

    let collector = metrics_process::Collector::default();
    collector.describe();

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| anyhow::anyhow!("Prometheus handle already initialized"))?;
    PROCESS_COLLECTOR
        .set(collector)
        .map_err(|_| anyhow::anyhow!("process collector already initialized"))?;

    Ok(())
}

/// PrometheusMetricsController renders the metrics registry on scrape.
pub struct PrometheusMetricsController;

impl PrometheusMetricsController {
    pub fn new() -> Self {
        Self
    }

    async fn render() -> impl IntoResponse {
        if let Some(collector) = PROCESS_COLLECTOR.get() {
            collector.collect();
        }
        match PROMETHEUS_HANDLE.get() {
            Some(handle) => (StatusCode::OK, handle.render()).into_response(),
            None => (
                StatusCode::SERVICE_UNAVAILABLE,
                "metrics exporter is not initialized",
            )
                .into_response(),
        }
    }
}

impl Default for PrometheusMetricsController {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller for PrometheusMetricsController {
    fn add_route(&self, router: Router) -> Router {
        router.route(PROMETHEUS_METRICS_PATH, get(Self::render))
    }
}
