use serde::Deserialize;
use std::time::Duration;

use crate::poller::PollerConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub logs: LogsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Backend root, e.g. "http://localhost:9733/api".
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_services_path")]
    pub services_path: String,
    #[serde(default = "default_containers_path")]
    pub containers_path: String,
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_services_path() -> String {
    "services".into()
}

fn default_containers_path() -> String {
    "containers".into()
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout_ms: default_request_timeout_ms(),
            services_path: default_services_path(),
            containers_path: default_containers_path(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub service_list_interval_ms: u64,
    pub service_detail_interval_ms: u64,
    pub container_list_interval_ms: u64,
    pub container_detail_interval_ms: u64,
    /// Automatic retries after a failed fetch.
    pub retries: u32,
    pub retry_delay_ms: u64,
    /// When false, only the initial fetch and manual refreshes run.
    pub enabled: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            service_list_interval_ms: 10_000,
            service_detail_interval_ms: 5_000,
            container_list_interval_ms: 10_000,
            container_detail_interval_ms: 10_000,
            retries: 3,
            retry_delay_ms: 1_000,
            enabled: true,
        }
    }
}

impl PollingConfig {
    fn poller(&self, interval_ms: u64) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(interval_ms),
            enabled: self.enabled,
            retries: self.retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn service_list(&self) -> PollerConfig {
        self.poller(self.service_list_interval_ms)
    }

    pub fn service_detail(&self) -> PollerConfig {
        self.poller(self.service_detail_interval_ms)
    }

    pub fn container_list(&self) -> PollerConfig {
        self.poller(self.container_list_interval_ms)
    }

    pub fn container_detail(&self) -> PollerConfig {
        self.poller(self.container_detail_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
    /// Initial `lines` requested when a log stream opens.
    pub default_lines: u32,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self { default_lines: 100 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Points kept per CPU / memory series.
    pub max_data_points: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            max_data_points: crate::metrics_history::DEFAULT_MAX_DATA_POINTS,
        }
    }
}

/// Entities the binary follows with detail polling, metrics and log tailing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub services: Vec<String>,
    pub containers: Vec<String>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://"),
            "api.base_url must be an http(s) URL, got {:?}",
            self.api.base_url
        );
        anyhow::ensure!(
            self.api.request_timeout_ms > 0,
            "api.request_timeout_ms must be > 0, got {}",
            self.api.request_timeout_ms
        );
        anyhow::ensure!(
            !self.api.services_path.is_empty() && !self.api.containers_path.is_empty(),
            "api.services_path and api.containers_path must be non-empty"
        );
        for (name, value) in [
            (
                "polling.service_list_interval_ms",
                self.polling.service_list_interval_ms,
            ),
            (
                "polling.service_detail_interval_ms",
                self.polling.service_detail_interval_ms,
            ),
            (
                "polling.container_list_interval_ms",
                self.polling.container_list_interval_ms,
            ),
            (
                "polling.container_detail_interval_ms",
                self.polling.container_detail_interval_ms,
            ),
        ] {
            anyhow::ensure!(value > 0, "{} must be > 0, got {}", name, value);
        }
        anyhow::ensure!(
            self.logs.default_lines > 0,
            "logs.default_lines must be > 0, got {}",
            self.logs.default_lines
        );
        anyhow::ensure!(
            self.metrics.max_data_points > 0,
            "metrics.max_data_points must be > 0, got {}",
            self.metrics.max_data_points
        );
        Ok(())
    }
}
