use serde::Serialize;

use super::HomeAssistant;
use crate::sensor::{DeviceInfo, Sensor, SensorSource};

/// MQTT topic layout of one exported device.
#[derive(Debug, Clone)]
pub struct Topics {
    discovery_prefix: String,
    base_topic: String,
    node_id: String,
}

impl Topics {
    pub fn new(config: &HomeAssistant, device: &DeviceInfo) -> Self {
        Self {
            discovery_prefix: config.discovery_prefix.trim_end_matches('/').to_owned(),
            base_topic: config.base_topic.trim_end_matches('/').to_owned(),
            node_id: format!("dawarich_{}", slug(&device.name)),
        }
    }

    pub fn config(&self, sensor: &Sensor) -> String {
        format!("{}/sensor/{}/{}/config", self.discovery_prefix, self.node_id, sensor.key())
    }

    pub fn state(&self, sensor: &Sensor) -> String {
        format!("{}/{}/state", self.base_topic, sensor.key())
    }

    pub fn attributes(&self, sensor: &Sensor) -> String {
        format!("{}/{}/attributes", self.base_topic, sensor.key())
    }

    pub fn bridge_availability(&self) -> String {
        format!("{}/availability", self.base_topic)
    }

    pub fn stats_availability(&self) -> String {
        format!("{}/stats/availability", self.base_topic)
    }

    pub fn version_availability(&self) -> String {
        format!("{}/version/availability", self.base_topic)
    }

    //bridge status plus freshness of the backing coordinator
    fn availability(&self, sensor: &Sensor) -> Vec<Availability> {
        let mut topics = vec![Availability {
            topic: self.bridge_availability(),
        }];

        match sensor.source() {
            SensorSource::Statistic(_) => topics.push(Availability {
                topic: self.stats_availability(),
            }),
            SensorSource::Version(_) => topics.push(Availability {
                topic: self.version_availability(),
            }),
            SensorSource::Tracker(_) => {}
        }

        topics
    }
}

fn slug(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());

    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }

    slug.trim_matches('_').to_owned()
}

#[derive(Debug, Serialize)]
pub struct SensorDiscovery<'a> {
    name: &'static str,
    unique_id: &'a str,
    object_id: String,
    state_topic: String,
    icon: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_of_measurement: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    json_attributes_topic: Option<String>,
    availability: Vec<Availability>,
    availability_mode: &'static str,
    device: &'a DeviceInfo,
}

#[derive(Debug, Serialize)]
struct Availability {
    topic: String,
}

impl<'a> SensorDiscovery<'a> {
    pub fn new(sensor: &'a Sensor, device: &'a DeviceInfo, topics: &Topics) -> Self {
        let description = sensor.description();

        Self {
            //entity name, Home Assistant prefixes the device name
            name: description.name,
            unique_id: sensor.unique_id(),
            object_id: format!("{}_{}", topics.node_id, description.key),
            state_topic: topics.state(sensor),
            icon: description.icon,
            unit_of_measurement: description.unit,
            device_class: description.device_class,
            state_class: description.state_class,
            options: sensor.options(),
            json_attributes_topic: sensor.attributes().map(|_| topics.attributes(sensor)),
            availability: topics.availability(sensor),
            availability_mode: "all",
            device,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    use super::*;
    use crate::coordinator::PollingCoordinator;
    use crate::dawarich::fake::FakeDawarich;
    use crate::dawarich::{DawarichConfig, StatisticsSource, VersionSource};
    use crate::sensor::SensorRegistry;
    use crate::tracker::LocationTracker;

    fn registry() -> SensorRegistry {
        let api = FakeDawarich::new();
        let config = DawarichConfig {
            host: "dawarich.local".to_owned(),
            port: Some(3000),
            api_key: "secret".to_owned(),
            use_tls: false,
            verify_tls: true,
            display_name: "My Dawarich".to_owned(),
            tracked_device_id: Some("device_tracker.phone".to_owned()),
        };
        let stats = PollingCoordinator::new(StatisticsSource(api.clone()), Duration::from_secs(30));
        let version = PollingCoordinator::new(VersionSource(api.clone()), Duration::from_secs(3600));
        let tracker = LocationTracker::new("My Dawarich".to_owned(), "device_tracker.phone".to_owned(), api);

        SensorRegistry::new(&config, stats.handle(), version.handle(), Some(tracker.handle()))
    }

    fn topics(registry: &SensorRegistry) -> Topics {
        let config = HomeAssistant {
            topic_event: "homeassistant/event".to_owned(),
            discovery_prefix: "homeassistant".to_owned(),
            base_topic: "dawarich/".to_owned(),
        };

        Topics::new(&config, registry.device())
    }

    #[test]
    fn slug_of_display_name() {
        assert_eq!(slug("My Dawarich"), "my_dawarich");
        assert_eq!(slug("  Home -- Server 2 "), "home_server_2");
        assert_eq!(slug("dawarich"), "dawarich");
    }

    #[test]
    fn topic_layout() {
        let registry = registry();
        let topics = topics(&registry);
        let sensor = registry.get("total_distance_km").unwrap();

        assert_eq!(
            topics.config(sensor),
            "homeassistant/sensor/dawarich_my_dawarich/total_distance_km/config"
        );
        assert_eq!(topics.state(sensor), "dawarich/total_distance_km/state");
        assert_eq!(topics.bridge_availability(), "dawarich/availability");
        assert_eq!(topics.stats_availability(), "dawarich/stats/availability");
        assert_eq!(topics.version_availability(), "dawarich/version/availability");
    }

    #[test]
    fn statistic_sensor_discovery() {
        let registry = registry();
        let topics = topics(&registry);
        let sensor = registry.get("total_distance_km").unwrap();

        let payload = serde_json::to_value(SensorDiscovery::new(sensor, registry.device(), &topics)).unwrap();

        assert_json_eq!(
            payload,
            json!({
                "name": "Total Distance",
                "unique_id": "secret/total_distance_km",
                "object_id": "dawarich_my_dawarich_total_distance_km",
                "state_topic": "dawarich/total_distance_km/state",
                "icon": "mdi:map-marker-distance",
                "unit_of_measurement": "km",
                "device_class": "distance",
                "state_class": "total",
                "availability": [
                    {"topic": "dawarich/availability"},
                    {"topic": "dawarich/stats/availability"}
                ],
                "availability_mode": "all",
                "device": {
                    "identifiers": ["secret"],
                    "name": "My Dawarich",
                    "manufacturer": "Dawarich",
                    "configuration_url": "http://dawarich.local:3000"
                }
            })
        );
    }

    #[test]
    fn version_sensor_discovery() {
        let registry = registry();
        let topics = topics(&registry);
        let sensor = registry.get("version").unwrap();

        let payload = serde_json::to_value(SensorDiscovery::new(sensor, registry.device(), &topics)).unwrap();

        assert_json_eq!(
            payload,
            json!({
                "name": "Version",
                "unique_id": "secret/version",
                "object_id": "dawarich_my_dawarich_version",
                "state_topic": "dawarich/version/state",
                "icon": "mdi:information-outline",
                "availability": [
                    {"topic": "dawarich/availability"},
                    {"topic": "dawarich/version/availability"}
                ],
                "availability_mode": "all",
                "device": {
                    "identifiers": ["secret"],
                    "name": "My Dawarich",
                    "manufacturer": "Dawarich",
                    "configuration_url": "http://dawarich.local:3000"
                }
            })
        );
    }

    #[test]
    fn tracker_sensor_discovery() {
        let registry = registry();
        let topics = topics(&registry);
        let sensor = registry.get("tracker").unwrap();

        let payload = serde_json::to_value(SensorDiscovery::new(sensor, registry.device(), &topics)).unwrap();

        assert_json_eq!(
            payload,
            json!({
                "name": "Tracker",
                "unique_id": "secret/tracker",
                "object_id": "dawarich_my_dawarich_tracker",
                "state_topic": "dawarich/tracker/state",
                "icon": "mdi:map-marker-circle",
                "device_class": "enum",
                "options": ["unknown", "success", "error"],
                "json_attributes_topic": "dawarich/tracker/attributes",
                "availability": [{"topic": "dawarich/availability"}],
                "availability_mode": "all",
                "device": {
                    "identifiers": ["secret"],
                    "name": "My Dawarich",
                    "manufacturer": "Dawarich",
                    "configuration_url": "http://dawarich.local:3000"
                }
            })
        );
    }
}
