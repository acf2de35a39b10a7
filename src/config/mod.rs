// Configuration loading and management.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const PROD: &str = "prod";
#[allow(dead_code)]
pub const DEV: &str = "dev";
#[allow(dead_code)]
pub const DEBUG: &str = "debug";
#[allow(dead_code)]
pub const TEST: &str = "test";

/// Environment variable carrying the bind port, takes precedence over YAML.
pub const PORT_ENV: &str = "PORT";

/// Contract default when neither PORT nor YAML provide one.
pub const DEFAULT_PORT: u16 = 8000;

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_START_PERIOD: Duration = Duration::from_secs(5);
pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_PROBE_PATH: &str = "/";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Service {
    #[serde(rename = "service")]
    pub service: ServiceBox,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceBox {
    pub env: String,
    pub logs: Option<Logs>,
    pub runtime: Option<Runtime>,
    pub api: Option<Api>,
    pub probe: Option<Probe>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Logs {
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Runtime {
    #[serde(rename = "num_cpus", default)]
    pub num_cpus: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Api {
    pub name: Option<String>,
    /// Bind port as written in YAML. Overridden by the PORT env var.
    pub port: Option<String>,
}

/// What the app does once the failure threshold is crossed.
/// The probe contract itself ends at "marked failed"; this is deployment policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OnFailed {
    /// Relaunch the server task and re-enter the start grace window.
    Restart,
    /// Cancel the shutdown token and let the outer orchestrator restart us.
    Shutdown,
    /// Log the transition and keep probing.
    Observe,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Probe {
    /// How often a probe fires.
    #[serde(with = "humantime_serde", default)]
    pub interval: Option<Duration>,
    /// Max wait per probe attempt.
    #[serde(with = "humantime_serde", default)]
    pub timeout: Option<Duration>,
    /// Grace window after (re)start during which failures do not count.
    #[serde(rename = "start_period", with = "humantime_serde", default)]
    pub start_period: Option<Duration>,
    /// Consecutive failures tolerated before the process is marked failed.
    pub retries: Option<u32>,
    /// Path probed on the service, relative to the bind port.
    pub path: Option<String>,
    #[serde(rename = "on_failed")]
    pub on_failed: Option<OnFailed>,
}

/// Fully resolved probe timing parameters, defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeParams {
    pub interval: Duration,
    pub timeout: Duration,
    pub start_period: Duration,
    pub retries: u32,
    pub path: String,
    pub on_failed: OnFailed,
}

impl Default for ProbeParams {
    fn default() -> Self {
        Self {
            interval: DEFAULT_PROBE_INTERVAL,
            timeout: DEFAULT_PROBE_TIMEOUT,
            start_period: DEFAULT_START_PERIOD,
            retries: DEFAULT_RETRIES,
            path: DEFAULT_PROBE_PATH.to_string(),
            on_failed: OnFailed::Restart,
        }
    }
}

// Config type alias for convenience
pub type Config = Service;

/// Read-only accessors over the loaded configuration.
pub trait ConfigTrait {
    fn env(&self) -> &str;
    fn is_prod(&self) -> bool;
    fn logs(&self) -> Option<&Logs>;
    fn runtime(&self) -> Option<&Runtime>;
    fn api(&self) -> Option<&Api>;
    /// Bind port: PORT env var, then YAML, then the contract default.
    fn resolve_port(&self) -> Result<u16>;
    /// Probe parameters with defaults applied.
    fn probe_params(&self) -> ProbeParams;
}

impl ConfigTrait for Config {
    fn env(&self) -> &str {
        &self.service.env
    }

    fn is_prod(&self) -> bool {
        self.service.env == PROD
    }

    fn logs(&self) -> Option<&Logs> {
        self.service.logs.as_ref()
    }

    fn runtime(&self) -> Option<&Runtime> {
        self.service.runtime.as_ref()
    }

    fn api(&self) -> Option<&Api> {
        self.service.api.as_ref()
    }

    fn resolve_port(&self) -> Result<u16> {
        if let Ok(raw) = std::env::var(PORT_ENV) {
            return raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("invalid {} value {:?}", PORT_ENV, raw));
        }
        if let Some(raw) = self.api().and_then(|api| api.port.as_deref()) {
            // Accept the ":8000" spelling as well.
            let raw = raw.trim().trim_start_matches(':');
            return raw
                .parse::<u16>()
                .with_context(|| format!("invalid api.port value {:?}", raw));
        }
        Ok(DEFAULT_PORT)
    }

    fn probe_params(&self) -> ProbeParams {
        let defaults = ProbeParams::default();
        let Some(probe) = self.service.probe.as_ref() else {
            return defaults;
        };
        ProbeParams {
            interval: probe.interval.unwrap_or(defaults.interval),
            timeout: probe.timeout.unwrap_or(defaults.timeout),
            start_period: probe.start_period.unwrap_or(defaults.start_period),
            retries: probe.retries.unwrap_or(defaults.retries),
            path: probe.path.clone().unwrap_or_else(|| defaults.path.clone()),
            on_failed: probe.on_failed.unwrap_or(defaults.on_failed),
        }
    }
}

impl Config {
    /// Loads and validates configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        let cfg: Config = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {:?}", path))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects configurations that cannot satisfy the probe contract.
    pub fn validate(&self) -> Result<()> {
        let params = self.probe_params();
        if params.interval.is_zero() {
            bail!("probe.interval must be greater than zero");
        }
        if params.timeout.is_zero() {
            bail!("probe.timeout must be greater than zero");
        }
        // One probe must resolve before the next tick fires.
        if params.timeout >= params.interval {
            bail!(
                "probe.timeout ({}) must be shorter than probe.interval ({})",
                humantime::format_duration(params.timeout),
                humantime::format_duration(params.interval),
            );
        }
        if params.retries == 0 {
            bail!("probe.retries must be at least 1");
        }
        if !params.path.starts_with('/') {
            bail!("probe.path must start with '/': {:?}", params.path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test_config;
#[cfg(test)]
pub use test_config::new_test_config;

/// Serializes tests that touch the PORT environment variable.
#[cfg(test)]
pub(crate) fn port_env_lock() -> &'static std::sync::Mutex<()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    &LOCK
}
