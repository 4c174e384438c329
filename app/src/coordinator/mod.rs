use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use infrastructure::meter;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub trait DataSource {
    type Data;

    fn name(&self) -> &'static str;
    async fn fetch(&self) -> anyhow::Result<Self::Data>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Freshness {
    #[display("uninitialized")]
    Uninitialized,
    #[display("fresh")]
    Fresh,
    #[display("stale")]
    Stale,
}

/// Snapshot of a coordinator's cache. `data` always holds the last successfully fetched payload,
/// a failed refresh only flags the error.
#[derive(Debug)]
pub struct CoordinatorState<T> {
    pub data: Option<Arc<T>>,
    pub freshness: Freshness,
    pub last_error: Option<String>,
    pub last_success_at: Option<DateTime<Utc>>,
}

impl<T> Clone for CoordinatorState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            freshness: self.freshness,
            last_error: self.last_error.clone(),
            last_success_at: self.last_success_at,
        }
    }
}

impl<T> CoordinatorState<T> {
    fn initial() -> Self {
        Self {
            data: None,
            freshness: Freshness::Uninitialized,
            last_error: None,
            last_success_at: None,
        }
    }

    pub fn last_update_success(&self) -> bool {
        self.freshness == Freshness::Fresh
    }
}

pub struct PollingCoordinator<S: DataSource> {
    source: S,
    interval: Duration,
    state_tx: watch::Sender<CoordinatorState<S::Data>>,
}

impl<S: DataSource> PollingCoordinator<S> {
    pub fn new(source: S, interval: Duration) -> Self {
        let (state_tx, _) = watch::channel(CoordinatorState::initial());

        Self {
            source,
            interval,
            state_tx,
        }
    }

    pub fn handle(&self) -> CoordinatorHandle<S::Data> {
        CoordinatorHandle {
            rx: self.state_tx.subscribe(),
        }
    }

    pub async fn first_refresh(&self) -> anyhow::Result<()> {
        self.refresh()
            .await
            .with_context(|| format!("Initial {} refresh failed", self.source.name()))
    }

    #[tracing::instrument(skip_all, fields(coordinator = self.source.name()))]
    pub async fn refresh(&self) -> anyhow::Result<()> {
        let name = self.source.name();

        match self.source.fetch().await {
            Ok(data) => {
                self.state_tx.send_modify(|state| {
                    state.data = Some(Arc::new(data));
                    state.freshness = Freshness::Fresh;
                    state.last_error = None;
                    state.last_success_at = Some(Utc::now());
                });

                tracing::debug!("Refreshed {} data", name);
                meter::increment("dawarich_refresh", &[("coordinator", name), ("result", "success")]);

                Ok(())
            }
            Err(e) => {
                let message = format!("{e:#}");

                self.state_tx.send_modify(|state| {
                    if state.data.is_some() {
                        state.freshness = Freshness::Stale;
                    }
                    state.last_error = Some(message);
                });

                tracing::warn!("Error refreshing {} data, keeping last known values: {:?}", name, e);
                meter::increment("dawarich_refresh", &[("coordinator", name), ("result", "error")]);

                Err(e)
            }
        }
    }

    /// Refreshes on every interval tick until cancelled. The first tick fires one interval after
    /// start, the eager fetch is done by [`Self::first_refresh`].
    pub async fn run(self, cancel: CancellationToken) {
        let mut timer = tokio::time::interval_at(tokio::time::Instant::now() + self.interval, self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = async {
                    timer.tick().await;
                    //outcome is recorded in the state
                    let _ = self.refresh().await;
                } => {}
            }
        }

        tracing::info!("Stopped {} coordinator", self.source.name());
    }
}

/// Read-only view on a coordinator's cache.
pub struct CoordinatorHandle<T> {
    rx: watch::Receiver<CoordinatorState<T>>,
}

impl<T> Clone for CoordinatorHandle<T> {
    fn clone(&self) -> Self {
        Self { rx: self.rx.clone() }
    }
}

impl<T> CoordinatorHandle<T> {
    pub fn data(&self) -> Option<Arc<T>> {
        self.rx.borrow().data.clone()
    }

    pub fn state(&self) -> CoordinatorState<T> {
        self.rx.borrow().clone()
    }

    pub fn last_update_success(&self) -> bool {
        self.rx.borrow().last_update_success()
    }

    /// Resolves on the next refresh outcome. Never resolves once the coordinator is gone.
    pub async fn changed(&mut self) {
        if self.rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
