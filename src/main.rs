// Main entrypoint for the livewatch service.

mod app;
mod config;
mod controller;
mod http;
mod metrics;
mod shutdown;
mod supervisor;

use crate::config::{Config, ConfigTrait};
use crate::shutdown::GracefulShutdown;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const CONFIG_PATH: &str = "cfg/livewatch.cfg.yaml";
const CONFIG_PATH_LOCAL: &str = "cfg/livewatch.cfg.local.yaml";

/// Livewatch - HTTP service process with a built-in liveness supervisor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, value_name = "FILE")]
    cfg: Option<PathBuf>,
}

/// Logs thread parallelism settings.
/// Tokio's runtime already uses all available cores when num_cpus is 0.
fn set_max_num_cpus(cfg: &Config) {
    let cores = cfg.runtime().map(|r| r.num_cpus).unwrap_or(0);
    if cores == 0 {
        let cores = num_cpus::get();
        info!(
            component = "main",
            event = "num_cpus_configured",
            num_cpus = cores,
            "available cores value configured (using all available cores)"
        );
    } else {
        warn!(
            component = "main",
            event = "num_cpus_configured",
            num_cpus = cores,
            "available cores value configured"
        );
    }
}

/// Loads the configuration struct from YAML file.
/// Tries local config first, then falls back to default config.
fn load_cfg(path: Option<PathBuf>) -> Result<Config> {
    if let Some(custom_path) = path {
        let cfg = Config::load(&custom_path)
            .with_context(|| format!("failed to load custom config from {:?}", custom_path))?;
        info!(
            component = "config",
            event = "load_success",
            path = ?custom_path,
            "config loaded"
        );
        return Ok(cfg);
    }

    // Try local config first
    match Config::load(PathBuf::from(CONFIG_PATH_LOCAL)) {
        Ok(cfg) => {
            info!(
                component = "config",
                event = "load_success",
                path = CONFIG_PATH_LOCAL,
                "config loaded"
            );
            Ok(cfg)
        }
        Err(_) => {
            // Fall back to default config
            let cfg = Config::load(PathBuf::from(CONFIG_PATH))
                .with_context(|| format!("failed to load config from {}", CONFIG_PATH))?;
            info!(
                component = "config",
                event = "load_success",
                path = CONFIG_PATH,
                "config loaded"
            );
            Ok(cfg)
        }
    }
}

/// Configures structured logging based on configuration.
fn configure_logger(cfg: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let log_level = cfg
        .logs()
        .and_then(|logs| logs.level.as_ref())
        .map(|s| s.as_str())
        .unwrap_or("info");

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if cfg.is_prod() {
        // Production: JSON format
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        // Development: Pretty console format
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .init();
    }
}

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    // Initialize Prometheus metrics exporter BEFORE the tokio runtime starts,
    // the recorder installation must not happen inside an async context.
    match crate::controller::metrics::init_prometheus_exporter() {
        Ok(_) => {
            eprintln!("Info: Prometheus metrics exporter initialized successfully");
        }
        Err(e) => {
            eprintln!("Warning: failed to initialize Prometheus metrics exporter: {}", e);
            eprintln!("Metrics endpoint will not be available");
        }
    }

    tokio::runtime::Runtime::new()
        .context("failed to create tokio runtime")?
        .block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    // Create cancellation token for graceful shutdown
    let shutdown_token = CancellationToken::new();

    // Load configuration
    let cfg = load_cfg(args.cfg)?;

    // Configure logger (must be done after config is loaded)
    configure_logger(&cfg);

    set_max_num_cpus(&cfg);

    // Setup graceful shutdown handler
    let graceful_shutdown = GracefulShutdown::new(shutdown_token.clone());
    graceful_shutdown
        .set_graceful_timeout(Duration::from_secs(30))
        .await;

    // Initialize the service process and its liveness supervisor
    let app = app::App::new(shutdown_token.clone(), cfg).await?;

    if let Err(e) = app.serve(Arc::new(graceful_shutdown.clone())).await {
        error!(
            component = "main",
            scope = "app",
            event = "start_failed",
            error = %e,
            "failed to start app"
        );
        return Err(e);
    }

    // Block until an OS signal or internal cancellation, then drain
    graceful_shutdown.await_shutdown().await
}
