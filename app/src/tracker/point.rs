use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::dawarich::TrackedPoint;

pub type Attributes = HashMap<String, Value>;

/// Maps device tracker attributes onto a point. `None` if coordinates are missing or out of range.
/// Optional fields are only set when the attribute is present.
pub fn to_tracked_point(name: &str, attributes: &Attributes, timestamp: DateTime<Utc>) -> Option<TrackedPoint> {
    let latitude = number(attributes, "latitude").filter(|lat| (-90.0..=90.0).contains(lat))?;
    let longitude = number(attributes, "longitude").filter(|lon| (-180.0..=180.0).contains(lon))?;

    Some(TrackedPoint {
        name: name.to_owned(),
        latitude,
        longitude,
        horizontal_accuracy: number(attributes, "gps_accuracy"),
        altitude: number(attributes, "altitude"),
        vertical_accuracy: number(attributes, "vertical_accuracy"),
        speed: number(attributes, "speed").or_else(|| number(attributes, "velocity")),
        battery: number(attributes, "battery"),
        timestamp,
    })
}

//null, non-numeric and non-finite values count as absent
fn number(attributes: &Attributes, key: &str) -> Option<f64> {
    let value = match attributes.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    value.filter(|v| v.is_finite())
}
