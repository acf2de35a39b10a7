// Liveness endpoint probed by the orchestrator.

use axum::{response::IntoResponse, routing::get, Json, Router};
use serde_json::json;

use crate::http::Controller;

pub const HEALTH_PATH: &str = "/";

/// HealthController answers the liveness probe on the service root path.
///
/// A 200 here means the process is fully initialized and serving; there is
/// no partial-availability state. The route is registered only after the
/// whole router is built, so the first successful answer already implies
/// readiness.
#[derive(Clone)]
pub struct HealthController {
    service_name: String,
}

impl HealthController {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    async fn status(&self) -> impl IntoResponse {
        Json(json!({
            "status": "healthy",
            "service": self.service_name,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }))
    }
}

impl Controller for HealthController {
    fn add_route(&self, router: Router) -> Router {
        let controller = self.clone();
        router.route(
            HEALTH_PATH,
            get(move || {
                let controller = controller.clone();
                async move { controller.status().await }
            }),
        )
    }
}
