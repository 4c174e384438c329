mod client;
mod config;
#[cfg(test)]
pub mod fake;

pub use client::DawarichClient;
pub use config::{DawarichConfig, DawarichSettings};

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::coordinator::DataSource;

//Trait instead of the concrete client to allow fakes in tests. No dyn support needed, all users are generic
pub trait DawarichApi {
    async fn add_one_point(&self, point: &TrackedPoint) -> anyhow::Result<AddPointResponse>;
    async fn get_stats(&self) -> anyhow::Result<Statistics>;
    async fn get_version(&self) -> anyhow::Result<Version>;
}

/// A single location sample as submitted to Dawarich. Optional fields are only set when the
/// source reported them.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedPoint {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub horizontal_accuracy: Option<f64>,
    pub altitude: Option<f64>,
    pub vertical_accuracy: Option<f64>,
    pub speed: Option<f64>,
    pub battery: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddPointResponse {
    pub success: bool,
    pub response_code: u16,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_distance_km: f64,
    pub total_points_tracked: u64,
    pub total_reverse_geocoded_points: u64,
    pub total_countries_visited: u64,
    pub total_cities_visited: u64,
}

impl Statistics {
    pub fn get(&self, key: &str) -> Option<f64> {
        match key {
            "total_distance_km" => Some(self.total_distance_km),
            "total_points_tracked" => Some(self.total_points_tracked as f64),
            "total_reverse_geocoded_points" => Some(self.total_reverse_geocoded_points as f64),
            "total_countries_visited" => Some(self.total_countries_visited as f64),
            "total_cities_visited" => Some(self.total_cities_visited as f64),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
#[display("{major}.{minor}.{patch}")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum DawarichError {
    #[display("Dawarich responded with status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
    #[display("Dawarich did not report its version")]
    MissingVersion,
    #[display("Invalid Dawarich version {value:?}")]
    InvalidVersion { value: String },
}

impl FromStr for Version {
    type Err = DawarichError;

    //Accepts "0.26.3", "v0.26.3" and pre-release suffixes like "0.26.3-rc.1"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DawarichError::InvalidVersion { value: s.to_owned() };

        let mut parts = s.trim().trim_start_matches('v').splitn(3, '.');
        let mut next = |leading_digits_only: bool| -> Result<u32, DawarichError> {
            let part = parts.next().ok_or_else(invalid)?;
            let digits = if leading_digits_only {
                part.split(|c: char| !c.is_ascii_digit()).next().unwrap_or_default()
            } else {
                part
            };
            digits.parse().map_err(|_| invalid())
        };

        Ok(Version {
            major: next(false)?,
            minor: next(false)?,
            patch: next(true)?,
        })
    }
}

pub struct StatisticsSource<A>(pub A);

impl<A: DawarichApi> DataSource for StatisticsSource<A> {
    type Data = Statistics;

    fn name(&self) -> &'static str {
        "stats"
    }

    async fn fetch(&self) -> anyhow::Result<Statistics> {
        self.0.get_stats().await
    }
}

pub struct VersionSource<A>(pub A);

impl<A: DawarichApi> DataSource for VersionSource<A> {
    type Data = Version;

    fn name(&self) -> &'static str {
        "version"
    }

    async fn fetch(&self) -> anyhow::Result<Version> {
        self.0.get_version().await
    }
}
