mod description;

pub use description::{STATISTIC_SENSORS, SensorDescription, TRACKER_SENSOR, VERSION_SENSOR};

use serde::Serialize;
use serde_json::json;

use crate::coordinator::CoordinatorHandle;
use crate::dawarich::{DawarichConfig, Statistics, Version};
use crate::tracker::{TrackerHandle, TrackerStatus};

#[derive(Debug, Clone, PartialEq, Serialize, derive_more::Display)]
#[serde(untagged)]
pub enum SensorValue {
    #[display("{_0}")]
    Number(f64),
    #[display("{_0}")]
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: &'static str,
    pub configuration_url: String,
}

#[derive(Clone)]
pub enum SensorSource {
    Statistic(CoordinatorHandle<Statistics>),
    Version(CoordinatorHandle<Version>),
    Tracker(TrackerHandle),
}

/// Read-only view on cached Dawarich data. Holds no state of its own.
#[derive(Clone)]
pub struct Sensor {
    description: SensorDescription,
    unique_id: String,
    name: String,
    source: SensorSource,
}

impl Sensor {
    fn new(description: SensorDescription, config: &DawarichConfig, source: SensorSource) -> Self {
        Self {
            description,
            unique_id: format!("{}/{}", config.api_key, description.key),
            name: format!("{} {}", config.display_name, description.name),
            source,
        }
    }

    pub fn description(&self) -> &SensorDescription {
        &self.description
    }

    pub fn key(&self) -> &'static str {
        self.description.key
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &SensorSource {
        &self.source
    }

    /// `None` until the backing coordinator fetched successfully at least once.
    pub fn state(&self) -> Option<SensorValue> {
        match &self.source {
            SensorSource::Statistic(handle) => handle.data()?.get(self.description.key).map(SensorValue::Number),
            SensorSource::Version(handle) => handle.data().map(|version| SensorValue::Text(version.to_string())),
            SensorSource::Tracker(handle) => Some(SensorValue::Text(handle.status().to_string())),
        }
    }

    pub fn available(&self) -> bool {
        match &self.source {
            SensorSource::Statistic(handle) => handle.last_update_success(),
            SensorSource::Version(handle) => handle.last_update_success(),
            SensorSource::Tracker(_) => true,
        }
    }

    pub fn options(&self) -> Option<Vec<String>> {
        match &self.source {
            SensorSource::Tracker(_) => Some(TrackerStatus::ALL.iter().map(|s| s.to_string()).collect()),
            _ => None,
        }
    }

    pub fn attributes(&self) -> Option<serde_json::Value> {
        let SensorSource::Tracker(handle) = &self.source else {
            return None;
        };

        let state = handle.state();
        let point = state.last_point.as_ref();

        Some(json!({
            "latitude": point.map(|p| p.latitude),
            "longitude": point.map(|p| p.longitude),
            "gps_accuracy": point.and_then(|p| p.horizontal_accuracy),
            "last_submitted_at": point.map(|p| p.timestamp.to_rfc3339()),
            "last_error": state.last_error,
        }))
    }

    pub fn view(&self) -> SensorView {
        SensorView {
            unique_id: self.unique_id.clone(),
            key: self.description.key,
            name: self.name().to_owned(),
            state: self.state(),
            available: self.available(),
            icon: self.description.icon,
            unit: self.description.unit,
            device_class: self.description.device_class,
            state_class: self.description.state_class,
            attributes: self.attributes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorView {
    pub unique_id: String,
    pub key: &'static str,
    pub name: String,
    pub state: Option<SensorValue>,
    pub available: bool,
    pub icon: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<serde_json::Value>,
}

/// All sensors of one Dawarich instance, grouped under a single device.
pub struct SensorRegistry {
    device: DeviceInfo,
    sensors: Vec<Sensor>,
    stats: CoordinatorHandle<Statistics>,
    version: CoordinatorHandle<Version>,
    tracker: Option<TrackerHandle>,
}

impl SensorRegistry {
    pub fn new(
        config: &DawarichConfig,
        stats: CoordinatorHandle<Statistics>,
        version: CoordinatorHandle<Version>,
        tracker: Option<TrackerHandle>,
    ) -> Self {
        let mut sensors: Vec<Sensor> = STATISTIC_SENSORS
            .iter()
            .map(|description| Sensor::new(*description, config, SensorSource::Statistic(stats.clone())))
            .collect();

        sensors.push(Sensor::new(VERSION_SENSOR, config, SensorSource::Version(version.clone())));

        if let Some(tracker) = &tracker {
            sensors.push(Sensor::new(TRACKER_SENSOR, config, SensorSource::Tracker(tracker.clone())));
        }

        Self {
            device: DeviceInfo {
                identifiers: vec![config.api_key.clone()],
                name: config.display_name.clone(),
                manufacturer: "Dawarich",
                configuration_url: config.base_url(),
            },
            sensors,
            stats,
            version,
            tracker,
        }
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub fn get(&self, key: &str) -> Option<&Sensor> {
        self.sensors.iter().find(|sensor| sensor.key() == key)
    }

    pub fn views(&self) -> Vec<SensorView> {
        self.sensors.iter().map(Sensor::view).collect()
    }

    pub fn stats(&self) -> &CoordinatorHandle<Statistics> {
        &self.stats
    }

    pub fn version(&self) -> &CoordinatorHandle<Version> {
        &self.version
    }

    pub fn changes(&self) -> SensorChanges {
        SensorChanges {
            stats: self.stats.clone(),
            version: self.version.clone(),
            tracker: self.tracker.clone(),
        }
    }
}

/// Notifies about any new coordinator or tracker outcome.
pub struct SensorChanges {
    stats: CoordinatorHandle<Statistics>,
    version: CoordinatorHandle<Version>,
    tracker: Option<TrackerHandle>,
}

impl SensorChanges {
    pub async fn changed(&mut self) {
        let SensorChanges { stats, version, tracker } = self;

        let tracker_changed = async move {
            match tracker {
                Some(tracker) => tracker.changed().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = stats.changed() => {},
            _ = version.changed() => {},
            _ = tracker_changed => {},
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_json_diff::assert_json_eq;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::coordinator::PollingCoordinator;
    use crate::dawarich::fake::{FakeDawarich, statistics, version};
    use crate::dawarich::{StatisticsSource, VersionSource};
    use crate::tracker::LocationTracker;

    fn config() -> DawarichConfig {
        DawarichConfig {
            host: "dawarich.local".to_owned(),
            port: None,
            api_key: "secret".to_owned(),
            use_tls: true,
            verify_tls: true,
            display_name: "Home".to_owned(),
            tracked_device_id: None,
        }
    }

    fn coordinators(
        api: &FakeDawarich,
    ) -> (
        PollingCoordinator<StatisticsSource<FakeDawarich>>,
        PollingCoordinator<VersionSource<FakeDawarich>>,
    ) {
        (
            PollingCoordinator::new(StatisticsSource(api.clone()), Duration::from_secs(30)),
            PollingCoordinator::new(VersionSource(api.clone()), Duration::from_secs(3600)),
        )
    }

    #[tokio::test]
    async fn statistic_sensors_read_coordinator_data() {
        let api = FakeDawarich::new()
            .with_stats(Ok(statistics(1523.7)))
            .with_version(Ok(version(0, 26, 3)));
        let (stats, ver) = coordinators(&api);
        let registry = SensorRegistry::new(&config(), stats.handle(), ver.handle(), None);

        assert_eq!(registry.get("total_distance_km").unwrap().state(), None);

        stats.refresh().await.unwrap();
        ver.refresh().await.unwrap();

        let distance = registry.get("total_distance_km").unwrap();
        assert_eq!(distance.state(), Some(SensorValue::Number(1523.7)));
        assert_eq!(distance.name(), "Home Total Distance");
        assert_eq!(distance.unique_id(), "secret/total_distance_km");
        assert!(distance.available());

        assert_eq!(
            registry.get("total_cities_visited").unwrap().state(),
            Some(SensorValue::Number(37.0))
        );
        assert_eq!(
            registry.get("version").unwrap().state(),
            Some(SensorValue::Text("0.26.3".to_owned()))
        );
    }

    #[tokio::test]
    async fn failed_fetch_keeps_last_values_but_marks_unavailable() {
        let api = FakeDawarich::new()
            .with_stats(Ok(statistics(100.0)))
            .with_stats(Err(anyhow::anyhow!("timeout")));
        let (stats, ver) = coordinators(&api);
        let registry = SensorRegistry::new(&config(), stats.handle(), ver.handle(), None);

        stats.refresh().await.unwrap();
        assert!(stats.refresh().await.is_err());

        let distance = registry.get("total_distance_km").unwrap();
        assert_eq!(distance.state(), Some(SensorValue::Number(100.0)));
        assert!(!distance.available());
        assert!(!registry.stats().last_update_success());
    }

    #[tokio::test]
    async fn tracker_sensor_only_with_tracked_device() {
        let api = FakeDawarich::new();
        let (stats, ver) = coordinators(&api);

        let without = SensorRegistry::new(&config(), stats.handle(), ver.handle(), None);
        assert_eq!(without.sensors().len(), 6);
        assert!(without.get("tracker").is_none());

        let tracker = LocationTracker::new("Home".to_owned(), "device_tracker.phone".to_owned(), api.clone());
        let with = SensorRegistry::new(&config(), stats.handle(), ver.handle(), Some(tracker.handle()));
        assert_eq!(with.sensors().len(), 7);

        let sensor = with.get("tracker").unwrap();
        assert_eq!(sensor.unique_id(), "secret/tracker");
        assert_eq!(sensor.state(), Some(SensorValue::Text("unknown".to_owned())));
        assert!(sensor.available());
        assert_eq!(
            sensor.options(),
            Some(vec!["unknown".to_owned(), "success".to_owned(), "error".to_owned()])
        );
    }

    #[tokio::test]
    async fn tracker_attributes_show_last_point() {
        let api = FakeDawarich::new();
        let (stats, ver) = coordinators(&api);
        let tracker = LocationTracker::new("Home".to_owned(), "device_tracker.phone".to_owned(), api.clone());
        let registry = SensorRegistry::new(&config(), stats.handle(), ver.handle(), Some(tracker.handle()));

        let attributes = serde_json::from_value(json!({"latitude": 52.5, "longitude": 13.4, "gps_accuracy": 5}))
            .unwrap();
        tracker
            .on_state_change(&attributes, Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap())
            .await;

        let sensor = registry.get("tracker").unwrap();
        assert_eq!(sensor.state(), Some(SensorValue::Text("success".to_owned())));
        assert_json_eq!(
            sensor.attributes().unwrap(),
            json!({
                "latitude": 52.5,
                "longitude": 13.4,
                "gps_accuracy": 5.0,
                "last_submitted_at": "2025-03-01T12:00:00+00:00",
                "last_error": null
            })
        );
    }

    #[tokio::test]
    async fn view_serializes_for_display() {
        let api = FakeDawarich::new().with_stats(Ok(statistics(12.5)));
        let (stats, ver) = coordinators(&api);
        let registry = SensorRegistry::new(&config(), stats.handle(), ver.handle(), None);
        stats.refresh().await.unwrap();

        let view = serde_json::to_value(registry.get("total_distance_km").unwrap().view()).unwrap();
        assert_json_eq!(
            view,
            json!({
                "unique_id": "secret/total_distance_km",
                "key": "total_distance_km",
                "name": "Home Total Distance",
                "state": 12.5,
                "available": true,
                "icon": "mdi:map-marker-distance",
                "unit": "km",
                "device_class": "distance",
                "state_class": "total"
            })
        );

        let version_view = serde_json::to_value(registry.get("version").unwrap().view()).unwrap();
        assert_json_eq!(
            version_view,
            json!({
                "unique_id": "secret/version",
                "key": "version",
                "name": "Home Version",
                "state": null,
                "available": false,
                "icon": "mdi:information-outline"
            })
        );
    }

    #[tokio::test]
    async fn changes_fire_on_refresh() {
        let api = FakeDawarich::new().with_stats(Ok(statistics(1.0)));
        let (stats, ver) = coordinators(&api);
        let registry = SensorRegistry::new(&config(), stats.handle(), ver.handle(), None);
        let mut changes = registry.changes();

        stats.refresh().await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), changes.changed())
            .await
            .expect("no change notification");
    }

    #[test]
    fn device_groups_all_sensors() {
        let api = FakeDawarich::new();
        let (stats, ver) = coordinators(&api);
        let registry = SensorRegistry::new(&config(), stats.handle(), ver.handle(), None);

        assert_eq!(
            registry.device(),
            &DeviceInfo {
                identifiers: vec!["secret".to_owned()],
                name: "Home".to_owned(),
                manufacturer: "Dawarich",
                configuration_url: "https://dawarich.local:443".to_owned(),
            }
        );
    }
}
