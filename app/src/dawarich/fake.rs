use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{AddPointResponse, DawarichApi, Statistics, TrackedPoint, Version};

/// In-memory Dawarich recording submitted points and replaying queued responses.
#[derive(Clone, Default)]
pub struct FakeDawarich {
    inner: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
struct FakeState {
    points: Vec<TrackedPoint>,
    point_responses: VecDeque<anyhow::Result<AddPointResponse>>,
    stats: VecDeque<anyhow::Result<Statistics>>,
    versions: VecDeque<anyhow::Result<Version>>,
}

impl FakeDawarich {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stats(self, stats: anyhow::Result<Statistics>) -> Self {
        self.inner.lock().unwrap().stats.push_back(stats);
        self
    }

    pub fn with_version(self, version: anyhow::Result<Version>) -> Self {
        self.inner.lock().unwrap().versions.push_back(version);
        self
    }

    pub fn push_point_response(&self, response: anyhow::Result<AddPointResponse>) {
        self.inner.lock().unwrap().point_responses.push_back(response);
    }

    pub fn points(&self) -> Vec<TrackedPoint> {
        self.inner.lock().unwrap().points.clone()
    }
}

impl DawarichApi for FakeDawarich {
    async fn add_one_point(&self, point: &TrackedPoint) -> anyhow::Result<AddPointResponse> {
        let mut state = self.inner.lock().unwrap();
        state.points.push(point.clone());

        state.point_responses.pop_front().unwrap_or(Ok(AddPointResponse {
            success: true,
            response_code: 201,
            error: None,
        }))
    }

    async fn get_stats(&self) -> anyhow::Result<Statistics> {
        self.inner
            .lock()
            .unwrap()
            .stats
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("no statistics queued")))
    }

    async fn get_version(&self) -> anyhow::Result<Version> {
        self.inner
            .lock()
            .unwrap()
            .versions
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("no version queued")))
    }
}

pub fn statistics(total_distance_km: f64) -> Statistics {
    Statistics {
        total_distance_km,
        total_points_tracked: 83211,
        total_reverse_geocoded_points: 80012,
        total_countries_visited: 4,
        total_cities_visited: 37,
    }
}

pub fn version(major: u32, minor: u32, patch: u32) -> Version {
    Version { major, minor, patch }
}
