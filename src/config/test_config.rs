use super::{Api, Config, Logs, OnFailed, Probe, Runtime, ServiceBox};
use std::time::Duration;

/// Creates a new test configuration with short probe timings.
pub fn new_test_config() -> Config {
    Config {
        service: ServiceBox {
            env: super::TEST.to_string(),
            logs: Some(Logs {
                level: Some("debug".to_string()),
            }),
            runtime: Some(Runtime { num_cpus: 0 }),
            api: Some(Api {
                name: Some("livewatch-test".to_string()),
                port: Some("0".to_string()),
            }),
            probe: Some(Probe {
                interval: Some(Duration::from_millis(50)),
                timeout: Some(Duration::from_millis(20)),
                start_period: Some(Duration::from_millis(0)),
                retries: Some(3),
                path: Some("/".to_string()),
                on_failed: Some(OnFailed::Observe),
            }),
        },
    }
}
