mod point;

pub use point::Attributes;
use point::to_tracked_point;

use chrono::{DateTime, Utc};
use infrastructure::meter;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::dawarich::{DawarichApi, TrackedPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, derive_more::Display)]
pub enum TrackerStatus {
    #[default]
    #[display("unknown")]
    Unknown,
    #[display("success")]
    Success,
    #[display("error")]
    Error,
}

impl TrackerStatus {
    pub const ALL: [TrackerStatus; 3] = [TrackerStatus::Unknown, TrackerStatus::Success, TrackerStatus::Error];
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerState {
    pub status: TrackerStatus,
    pub last_point: Option<TrackedPoint>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StateChange {
    pub entity_id: String,
    pub new_state: Option<EntityState>,
}

#[derive(Debug, Clone)]
pub struct EntityState {
    pub attributes: Attributes,
    pub last_updated: DateTime<Utc>,
}

pub trait StateChangeSource {
    /// Next state change of any entity. `None` once the stream is closed.
    async fn recv(&mut self) -> Option<StateChange>;
}

/// Relays location updates of one device tracker entity to Dawarich.
pub struct LocationTracker<A: DawarichApi> {
    name: String,
    entity_id: String,
    api: A,
    state_tx: watch::Sender<TrackerState>,
}

impl<A: DawarichApi> LocationTracker<A> {
    pub fn new(name: String, entity_id: String, api: A) -> Self {
        let (state_tx, _) = watch::channel(TrackerState::default());

        Self {
            name,
            entity_id,
            api,
            state_tx,
        }
    }

    pub fn handle(&self) -> TrackerHandle {
        TrackerHandle {
            rx: self.state_tx.subscribe(),
        }
    }

    pub async fn run(self, mut events: impl StateChangeSource, cancel: CancellationToken) {
        tracing::info!("Tracking location of {}", self.entity_id);

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => event,
            };

            let Some(event) = event else {
                tracing::error!("State change stream closed, no longer tracking {}", self.entity_id);
                break;
            };

            if event.entity_id != self.entity_id {
                continue;
            }

            match event.new_state {
                Some(state) => self.on_state_change(&state.attributes, state.last_updated).await,
                None => tracing::error!("No new state found for {}", self.entity_id),
            }
        }

        tracing::info!("Stopped tracking {}", self.entity_id);
    }

    /// Submits the location found in the attributes. Failures only end up in the tracker state.
    #[tracing::instrument(skip_all, fields(entity_id = %self.entity_id))]
    pub async fn on_state_change(&self, attributes: &Attributes, timestamp: DateTime<Utc>) {
        let Some(point) = to_tracked_point(&self.name, attributes, timestamp) else {
            tracing::debug!("No valid coordinates in state of {}, skipping", self.entity_id);
            return;
        };

        tracing::debug!("State change detected for {}, updating Dawarich", self.entity_id);

        match self.api.add_one_point(&point).await {
            Ok(response) if response.success => {
                tracing::debug!("Location of {} sent to Dawarich", self.entity_id);
                meter::increment("dawarich_points_submitted", &[("result", "success")]);

                self.state_tx.send_replace(TrackerState {
                    status: TrackerStatus::Success,
                    last_point: Some(point),
                    last_error: None,
                });
            }
            Ok(response) => {
                let error = response.error.unwrap_or_default();
                tracing::error!(
                    "Error sending location to Dawarich API, response code {} and error: {}",
                    response.response_code,
                    error
                );
                meter::increment("dawarich_points_submitted", &[("result", "error")]);

                self.state_tx.send_modify(|state| {
                    state.status = TrackerStatus::Error;
                    state.last_error = Some(format!("{}: {}", response.response_code, error));
                });
            }
            Err(e) => {
                tracing::error!("Error sending location to Dawarich API: {:?}", e);
                meter::increment("dawarich_points_submitted", &[("result", "error")]);

                self.state_tx.send_modify(|state| {
                    state.status = TrackerStatus::Error;
                    state.last_error = Some(format!("{e:#}"));
                });
            }
        }
    }
}

#[derive(Clone)]
pub struct TrackerHandle {
    rx: watch::Receiver<TrackerState>,
}

impl TrackerHandle {
    pub fn state(&self) -> TrackerState {
        self.rx.borrow().clone()
    }

    pub fn status(&self) -> TrackerStatus {
        self.rx.borrow().status
    }

    /// Never resolves once the tracker is gone.
    pub async fn changed(&mut self) {
        if self.rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
