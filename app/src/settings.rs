use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use infrastructure::{HttpServerConfig, MonitoringConfig, MqttConfig};
use serde::Deserialize;

use crate::adapter::homeassistant::HomeAssistant;
use crate::dawarich::DawarichSettings;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub monitoring: MonitoringConfig,
    pub mqtt: MqttConfig,
    pub http_server: HttpServerConfig,
    pub homeassistant: HomeAssistant,
    pub dawarich: DawarichSettings,
    #[serde(default)]
    pub polling: PollingSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let builder = Config::builder().add_source(File::with_name("config.toml")).add_source(
            Environment::with_prefix("DAWARICH_BRIDGE")
                .prefix_separator("__")
                .separator("__"),
        );

        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollingSettings {
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
    #[serde(default = "default_version_interval_secs")]
    pub version_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_stats_interval_secs() -> u64 {
    30
}

fn default_version_interval_secs() -> u64 {
    3600
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            stats_interval_secs: default_stats_interval_secs(),
            version_interval_secs: default_version_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

//tokio intervals must not be zero
impl PollingSettings {
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs.max(1))
    }

    pub fn version_interval(&self) -> Duration {
        Duration::from_secs(self.version_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
