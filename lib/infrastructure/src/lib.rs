mod http;
mod monitoring;
mod mqtt;

pub use monitoring::{Monitoring, MonitoringConfig};

pub use http::client::HttpClientConfig;
pub use http::server::HttpServerConfig;
pub use mqtt::{Mqtt, MqttConfig, MqttInMessage, MqttSender, MqttSubscription, topic_matches};

pub mod meter {
    pub use super::monitoring::meter::{increment, set};
}
