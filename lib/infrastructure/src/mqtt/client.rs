use rumqttc::v5::Event::Incoming;
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::mqttbytes::v5::{ConnectProperties, Packet, Publish};
use rumqttc::v5::{AsyncClient, EventLoop, MqttOptions};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::*;

pub struct Mqtt {
    client: AsyncClient,
    event_loop: EventLoop,
    subscriptions: Vec<MqttSubscriptionHandle>,
}

struct MqttSubscriptionHandle {
    filter: String,
    tx: mpsc::Sender<MqttInMessage>,
}

impl Mqtt {
    pub fn connect(host: &str, port: u16, client_id: &str, credentials: Option<(String, String)>) -> Self {
        let mut mqttoptions = MqttOptions::new(client_id, host, port);
        mqttoptions.set_keep_alive(std::time::Duration::from_secs(5));
        mqttoptions.set_clean_start(false);

        if let Some((username, password)) = credentials {
            mqttoptions.set_credentials(username, password);
        }

        let mut connect_props = ConnectProperties::new();
        connect_props.session_expiry_interval = 60.into();
        connect_props.max_packet_size = Some(1024 * 1024);
        mqttoptions.set_connect_properties(connect_props);

        let (client, event_loop) = AsyncClient::new(mqttoptions, 32);

        Mqtt {
            client,
            event_loop,
            subscriptions: vec![],
        }
    }

    pub async fn subscribe(&mut self, filter: impl Into<String>) -> anyhow::Result<MqttSubscription> {
        let filter = filter.into();
        let (tx, rx) = mpsc::channel::<MqttInMessage>(256);

        tracing::info!("Subscribing to MQTT topic {}", filter);

        self.client.subscribe(filter.clone(), QoS::AtLeastOnce).await?;
        self.subscriptions.push(MqttSubscriptionHandle { filter, tx });

        Ok(MqttSubscription::new(rx))
    }

    pub fn sender(&self) -> MqttSender {
        MqttSender::new(self.client.clone())
    }

    pub async fn run(mut self) {
        loop {
            match self.event_loop.poll().await {
                Ok(Incoming(Packet::Publish(publish))) => {
                    self.forward(publish);
                }
                Ok(Incoming(Packet::ConnAck(_))) => {
                    tracing::info!("Connected to MQTT broker");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("MQTT error: {}", e);
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                }
            }
        }
    }

    fn forward(&mut self, publish: Publish) {
        let message: MqttInMessage = match (&publish).try_into() {
            Ok(m) => m,
            Err(e) => {
                tracing::error!("Error parsing MQTT message: {}", e);
                return;
            }
        };

        tracing::trace!("Received MQTT message on topic {}", message.topic);

        dispatch(&mut self.subscriptions, message);
    }
}

//must not block the event loop
fn dispatch(subscriptions: &mut Vec<MqttSubscriptionHandle>, message: MqttInMessage) {
    subscriptions.retain(|sub| {
        if !topic_matches(&sub.filter, &message.topic) {
            return true;
        }

        match sub.tx.try_send(message.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Subscriber {} is lagging behind, dropping MQTT message", sub.filter);
                true
            }
            Err(TrySendError::Closed(_)) => {
                tracing::info!("Subscriber {} is gone, no longer forwarding", sub.filter);
                false
            }
        }
    });
}

/// Matches a topic against a subscription filter with `+` and `#` wildcards.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
