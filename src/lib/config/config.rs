use std::time::Duration;

use crate::lib::monitor::types::DEFAULT_INTERVAL;
use crate::lib::registry::types::DEFAULT_TAG;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
const MIN_MONITOR_INTERVAL_MS: u64 = 100;
const DEFAULT_ENGINE_CALL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_HUB_CAPACITY: usize = 256;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_address: String,
    pub port: u16,
    /// Empty means the platform's local engine socket or pipe.
    pub docker_endpoint: String,
    pub container_tag: String,
    pub monitor_interval: Duration,
    pub engine_call_timeout: Duration,
    pub pull_timeout: Option<Duration>,
    pub hub_capacity: usize,
}

/// Unparsed values, as they come out of the environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawConfig<'a> {
    pub bind_address: Option<&'a str>,
    pub port: Option<&'a str>,
    pub docker_endpoint: Option<&'a str>,
    pub container_tag: Option<&'a str>,
    pub monitor_interval_ms: Option<&'a str>,
    pub engine_call_timeout_secs: Option<&'a str>,
    pub pull_timeout_secs: Option<&'a str>,
    pub hub_capacity: Option<&'a str>,
}

impl Config {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok();

        let bind_address = var("BIND_ADDRESS");
        let port = var("PORT");
        let docker_endpoint = var("DOCKER_ENDPOINT");
        let container_tag = var("CONTAINER_TAG");
        let monitor_interval_ms = var("MONITOR_INTERVAL_MS");
        let engine_call_timeout_secs = var("ENGINE_CALL_TIMEOUT_SECS");
        let pull_timeout_secs = var("PULL_TIMEOUT_SECS");
        let hub_capacity = var("HUB_CAPACITY");

        Self::from_raw_values(RawConfig {
            bind_address: bind_address.as_deref(),
            port: port.as_deref(),
            docker_endpoint: docker_endpoint.as_deref(),
            container_tag: container_tag.as_deref(),
            monitor_interval_ms: monitor_interval_ms.as_deref(),
            engine_call_timeout_secs: engine_call_timeout_secs.as_deref(),
            pull_timeout_secs: pull_timeout_secs.as_deref(),
            hub_capacity: hub_capacity.as_deref(),
        })
    }

    /// Build a Config from raw string values. Used directly in tests to avoid
    /// mutating process-global environment.
    pub fn from_raw_values(raw: RawConfig<'_>) -> Self {
        let non_empty = |v: Option<&str>| v.map(str::trim).filter(|s| !s.is_empty()).map(String::from);

        let port = raw
            .port
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let monitor_interval_ms = raw
            .monitor_interval_ms
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_INTERVAL.as_millis() as u64)
            .max(MIN_MONITOR_INTERVAL_MS);

        let engine_call_timeout_secs = raw
            .engine_call_timeout_secs
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_ENGINE_CALL_TIMEOUT_SECS);

        let pull_timeout = raw
            .pull_timeout_secs
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let hub_capacity = raw
            .hub_capacity
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_HUB_CAPACITY);

        Config {
            bind_address: non_empty(raw.bind_address)
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            port,
            docker_endpoint: non_empty(raw.docker_endpoint).unwrap_or_default(),
            container_tag: non_empty(raw.container_tag).unwrap_or_else(|| DEFAULT_TAG.to_string()),
            monitor_interval: Duration::from_millis(monitor_interval_ms),
            engine_call_timeout: Duration::from_secs(engine_call_timeout_secs),
            pull_timeout,
            hub_capacity,
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}
