use chrono::Utc;
use infrastructure::MqttSubscription;

use super::{HaEvent, StateChangedEvent};
use crate::tracker::{EntityState, StateChange, StateChangeSource};

pub struct HaEventListener {
    rx: MqttSubscription,
}

impl HaEventListener {
    pub fn new(rx: MqttSubscription) -> Self {
        Self { rx }
    }
}

impl StateChangeSource for HaEventListener {
    async fn recv(&mut self) -> Option<StateChange> {
        loop {
            let msg = self.rx.recv().await?;

            match serde_json::from_str::<HaEvent>(&msg.payload) {
                Ok(HaEvent::StateChanged { entity_id, new_state }) => {
                    return Some(StateChange {
                        entity_id,
                        new_state: new_state.map(EntityState::from),
                    });
                }
                Ok(HaEvent::Unknown { event_type }) if event_type == "state_changed" => {
                    tracing::warn!("Skipping malformed state_changed event {}", msg.payload);
                }
                Ok(HaEvent::Unknown { event_type }) => {
                    tracing::trace!("Received unsupported {} event on topic {}", event_type, msg.topic);
                }
                Err(e) => {
                    tracing::error!("Error parsing Home Assistant event {}: {:?}", msg.payload, e);
                }
            }
        }
    }
}

impl From<StateChangedEvent> for EntityState {
    fn from(event: StateChangedEvent) -> Self {
        EntityState {
            attributes: event.attributes,
            last_updated: event.last_updated.unwrap_or_else(Utc::now),
        }
    }
}
