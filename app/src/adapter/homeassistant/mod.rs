mod discovery;
mod incoming;
mod outgoing;

use std::collections::HashMap;
use std::sync::Arc;

pub use incoming::HaEventListener;
pub use outgoing::SensorExporter;

use anyhow::Context;
use chrono::{DateTime, Utc};
use infrastructure::{Mqtt, MqttSender};
use serde::Deserialize;
use serde_json::Value;

use crate::sensor::SensorRegistry;

#[derive(Debug, Deserialize, Clone)]
pub struct HomeAssistant {
    pub topic_event: String,
    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,
    #[serde(default = "default_base_topic")]
    pub base_topic: String,
}

fn default_discovery_prefix() -> String {
    "homeassistant".to_owned()
}

fn default_base_topic() -> String {
    "dawarich".to_owned()
}

impl HomeAssistant {
    pub async fn new_state_change_source(&self, mqtt: &mut Mqtt) -> anyhow::Result<HaEventListener> {
        let rx = mqtt
            .subscribe(self.topic_event.clone())
            .await
            .context("Error subscribing to Home Assistant event topic")?;

        Ok(HaEventListener::new(rx))
    }

    pub fn new_sensor_exporter(&self, sender: MqttSender, registry: Arc<SensorRegistry>) -> SensorExporter {
        SensorExporter::new(self, sender, registry)
    }
}

//Payload of mqtt_eventstream
#[derive(Deserialize, Debug)]
#[serde(tag = "event_type", content = "event_data")]
enum HaEvent {
    #[serde(rename = "state_changed")]
    StateChanged {
        entity_id: String,
        new_state: Option<StateChangedEvent>,
    },
    #[serde(untagged)]
    Unknown { event_type: String },
}

#[derive(Deserialize, Debug)]
struct StateChangedEvent {
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
    pub last_updated: Option<DateTime<Utc>>,
}
