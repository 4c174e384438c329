#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorDescription {
    pub key: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub unit: Option<&'static str>,
    pub device_class: Option<&'static str>,
    pub state_class: Option<&'static str>,
}

pub const STATISTIC_SENSORS: [SensorDescription; 5] = [
    SensorDescription {
        key: "total_distance_km",
        name: "Total Distance",
        icon: "mdi:map-marker-distance",
        unit: Some("km"),
        device_class: Some("distance"),
        state_class: Some("total"),
    },
    SensorDescription {
        key: "total_points_tracked",
        name: "Total Points Tracked",
        icon: "mdi:map-marker-multiple",
        unit: None,
        device_class: None,
        state_class: Some("total"),
    },
    SensorDescription {
        key: "total_reverse_geocoded_points",
        name: "Total Reverse Geocoded Points",
        icon: "mdi:map-marker-question",
        unit: None,
        device_class: None,
        state_class: Some("total"),
    },
    SensorDescription {
        key: "total_countries_visited",
        name: "Total Countries Visited",
        icon: "mdi:earth",
        unit: None,
        device_class: None,
        state_class: Some("total"),
    },
    SensorDescription {
        key: "total_cities_visited",
        name: "Total Cities Visited",
        icon: "mdi:city",
        unit: None,
        device_class: None,
        state_class: Some("total"),
    },
];

pub const VERSION_SENSOR: SensorDescription = SensorDescription {
    key: "version",
    name: "Version",
    icon: "mdi:information-outline",
    unit: None,
    device_class: None,
    state_class: None,
};

pub const TRACKER_SENSOR: SensorDescription = SensorDescription {
    key: "tracker",
    name: "Tracker",
    icon: "mdi:map-marker-circle",
    unit: None,
    device_class: Some("enum"),
    state_class: None,
};
