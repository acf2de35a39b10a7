// HTTP API controllers for the service surface.

pub mod controller;
pub mod health;
pub mod metrics;

// Re-export controller types for convenience
pub use health::HealthController;
pub use metrics::PrometheusMetricsController;
