mod client;
mod receiver;
mod sender;

pub use client::{Mqtt, topic_matches};
pub use receiver::{MqttInMessage, MqttSubscription};
pub use sender::MqttSender;

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct MqttConfig {
    host: String,
    port: u16,
    client_id: String,
    username: Option<String>,
    password: Option<String>,
}

impl MqttConfig {
    pub fn new_client(&self) -> Mqtt {
        let credentials = self
            .username
            .as_ref()
            .map(|user| (user.clone(), self.password.clone().unwrap_or_default()));

        Mqtt::connect(&self.host, self.port, &self.client_id, credentials)
    }
}
