use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use infrastructure::{MqttSender, meter};
use tokio_util::sync::CancellationToken;

use super::HomeAssistant;
use super::discovery::{SensorDiscovery, Topics};
use crate::sensor::{SensorRegistry, SensorSource, SensorValue};

const ONLINE: &str = "online";
const OFFLINE: &str = "offline";

/// Publishes discovery configs once, then sensor states and availability whenever a coordinator or
/// the tracker reports a new outcome.
pub struct SensorExporter {
    topics: Topics,
    sender: MqttSender,
    registry: Arc<SensorRegistry>,
    sent: SentCache,
}

impl SensorExporter {
    pub fn new(config: &HomeAssistant, sender: MqttSender, registry: Arc<SensorRegistry>) -> Self {
        Self {
            topics: Topics::new(config, registry.device()),
            sender,
            registry,
            sent: SentCache::default(),
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        if let Err(e) = self.announce().await {
            tracing::error!("Error announcing sensors to Home Assistant: {:?}", e);
        }

        let mut changes = self.registry.changes();
        let mut timer = tokio::time::interval(Duration::from_secs(60));

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = changes.changed() => {},
                _ = timer.tick() => {},
            }

            self.export().await;
        }

        if let Err(e) = self
            .sender
            .send_retained(self.topics.bridge_availability(), OFFLINE)
            .await
        {
            tracing::error!("Error publishing offline status: {:?}", e);
        }

        tracing::info!("Stopped sensor export");
    }

    async fn announce(&self) -> anyhow::Result<()> {
        for sensor in self.registry.sensors() {
            let payload = serde_json::to_string(&SensorDiscovery::new(sensor, self.registry.device(), &self.topics))?;
            self.sender.send_retained(self.topics.config(sensor), payload).await?;
        }

        tracing::info!("Announced {} sensors to Home Assistant", self.registry.sensors().len());

        self.sender
            .send_retained(self.topics.bridge_availability(), ONLINE)
            .await
    }

    async fn export(&mut self) {
        record_statistics(&self.registry);

        for (topic, payload) in state_messages(&self.registry, &self.topics) {
            if !self.sent.is_new(&topic, &payload) {
                continue;
            }

            match self.sender.send_retained(topic.clone(), payload.clone()).await {
                Ok(()) => self.sent.record(topic, payload),
                Err(e) => tracing::error!("Error exporting sensor state to {}: {:?}", topic, e),
            }
        }
    }
}

fn availability(available: bool) -> String {
    let status = if available { ONLINE } else { OFFLINE };
    status.to_owned()
}

//sensors without data publish nothing, Home Assistant keeps them unknown
fn state_messages(registry: &SensorRegistry, topics: &Topics) -> Vec<(String, String)> {
    let mut messages = vec![
        (topics.stats_availability(), availability(registry.stats().last_update_success())),
        (topics.version_availability(), availability(registry.version().last_update_success())),
    ];

    for sensor in registry.sensors() {
        if let Some(state) = sensor.state() {
            messages.push((topics.state(sensor), state.to_string()));
        }

        if let Some(attributes) = sensor.attributes() {
            messages.push((topics.attributes(sensor), attributes.to_string()));
        }
    }

    messages
}

fn record_statistics(registry: &SensorRegistry) {
    for sensor in registry.sensors() {
        if let (SensorSource::Statistic(_), Some(SensorValue::Number(value))) = (sensor.source(), sensor.state()) {
            meter::set("dawarich_statistic", value, &[("key", sensor.key())]);
        }
    }
}

#[derive(Default)]
struct SentCache {
    last_sent: HashMap<String, String>,
}

impl SentCache {
    fn is_new(&self, topic: &str, payload: &str) -> bool {
        self.last_sent.get(topic).map(String::as_str) != Some(payload)
    }

    fn record(&mut self, topic: String, payload: String) {
        self.last_sent.insert(topic, payload);
    }
}
