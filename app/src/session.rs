use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::coordinator::PollingCoordinator;
use crate::dawarich::{DawarichApi, DawarichConfig, StatisticsSource, VersionSource};
use crate::sensor::SensorRegistry;
use crate::settings::PollingSettings;
use crate::tracker::{LocationTracker, StateChangeSource};

/// Everything belonging to one configured Dawarich instance. Created by [`Session::setup`], unloaded
/// by cancelling its [`Session::cancellation_token`].
pub struct Session<A: DawarichApi> {
    stats: PollingCoordinator<StatisticsSource<A>>,
    version: PollingCoordinator<VersionSource<A>>,
    tracker: Option<LocationTracker<A>>,
    registry: Arc<SensorRegistry>,
    cancel: CancellationToken,
}

impl<A: DawarichApi + Clone> Session<A> {
    pub async fn setup(config: &DawarichConfig, api: A, polling: &PollingSettings) -> anyhow::Result<Self> {
        let stats = PollingCoordinator::new(StatisticsSource(api.clone()), polling.stats_interval());
        let version = PollingCoordinator::new(VersionSource(api.clone()), polling.version_interval());

        stats.first_refresh().await?;

        if let Err(e) = version.first_refresh().await {
            tracing::warn!("Dawarich version not available yet: {:?}", e);
        }

        let tracker = match &config.tracked_device_id {
            Some(entity_id) => {
                tracing::info!("Adding tracker sensor for {}", entity_id);
                Some(LocationTracker::new(config.display_name.clone(), entity_id.clone(), api))
            }
            None => {
                tracing::info!("No mobile device provided, skipping tracker sensor");
                None
            }
        };

        let registry = Arc::new(SensorRegistry::new(
            config,
            stats.handle(),
            version.handle(),
            tracker.as_ref().map(LocationTracker::handle),
        ));

        tracing::info!("Dawarich session for {} set up", config.base_url());

        Ok(Self {
            stats,
            version,
            tracker,
            registry,
            cancel: CancellationToken::new(),
        })
    }
}

impl<A: DawarichApi> Session<A> {
    pub fn registry(&self) -> Arc<SensorRegistry> {
        self.registry.clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether state changes have to be passed to [`Session::run`].
    pub fn tracks_device(&self) -> bool {
        self.tracker.is_some()
    }

    /// Runs both coordinators and the tracker until the session is unloaded.
    pub async fn run<E: StateChangeSource>(self, events: Option<E>) {
        let tracker_exec = {
            let cancel = self.cancel.clone();
            let tracker = self.tracker;

            async move {
                match (tracker, events) {
                    (Some(tracker), Some(events)) => tracker.run(events, cancel).await,
                    (Some(_), None) => tracing::error!("No state changes available, location is not tracked"),
                    (None, _) => {}
                }
            }
        };

        tokio::join!(
            self.stats.run(self.cancel.clone()),
            self.version.run(self.cancel.clone()),
            tracker_exec,
        );
    }
}
