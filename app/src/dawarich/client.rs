use std::time::Duration;

use anyhow::Context;
use infrastructure::HttpClientConfig;
use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;

use super::{AddPointResponse, DawarichApi, DawarichConfig, DawarichError, Statistics, TrackedPoint, Version};

const VERSION_HEADER: &str = "X-Dawarich-Version";

#[derive(Debug, Clone)]
pub struct DawarichClient {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: String,
}

impl DawarichClient {
    pub fn new(config: &DawarichConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = HttpClientConfig::new(config.verify_tls)
            .with_timeout(timeout)
            .new_tracing_client()?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.base_url
    }
}

impl DawarichApi for DawarichClient {
    #[tracing::instrument(skip_all, fields(name = %point.name))]
    async fn add_one_point(&self, point: &TrackedPoint) -> anyhow::Result<AddPointResponse> {
        let body = OverlandBatch::from(point);

        let response = self
            .client
            .post(format!("{}/api/v1/overland/batches", self.base_url))
            .query(&[("api_key", &self.api_key)])
            .json(&body)
            .send()
            .await
            .context("Error sending location to Dawarich")?;

        let status = response.status();
        if status.is_success() {
            return Ok(AddPointResponse {
                success: true,
                response_code: status.as_u16(),
                error: None,
            });
        }

        let error = response.text().await.unwrap_or_default();

        Ok(AddPointResponse {
            success: false,
            response_code: status.as_u16(),
            error: Some(error),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn get_stats(&self) -> anyhow::Result<Statistics> {
        let response = self
            .client
            .get(format!("{}/api/v1/stats", self.base_url))
            .query(&[("api_key", &self.api_key)])
            .send()
            .await
            .context("Error requesting Dawarich statistics")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DawarichError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        response
            .json::<Statistics>()
            .await
            .context("Error parsing Dawarich statistics")
    }

    #[tracing::instrument(skip(self))]
    async fn get_version(&self) -> anyhow::Result<Version> {
        let response = self
            .client
            .get(format!("{}/api/v1/health", self.base_url))
            .query(&[("api_key", &self.api_key)])
            .send()
            .await
            .context("Error requesting Dawarich health")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DawarichError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let header = response
            .headers()
            .get(VERSION_HEADER)
            .ok_or(DawarichError::MissingVersion)?
            .to_str()
            .map_err(|_| DawarichError::MissingVersion)?;

        Ok(header.parse::<Version>()?)
    }
}

//Overland batch format, the only single-point ingestion endpoint that accepts accuracy, speed and battery
#[derive(Debug, Serialize)]
struct OverlandBatch {
    locations: Vec<OverlandLocation>,
}

#[derive(Debug, Serialize)]
struct OverlandLocation {
    #[serde(rename = "type")]
    kind: &'static str,
    geometry: OverlandGeometry,
    properties: OverlandProperties,
}

#[derive(Debug, Serialize)]
struct OverlandGeometry {
    #[serde(rename = "type")]
    kind: &'static str,
    coordinates: [f64; 2],
}

#[derive(Debug, Serialize)]
struct OverlandProperties {
    timestamp: String,
    device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    horizontal_accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    altitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vertical_accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    battery_level: Option<f64>,
}

impl From<&TrackedPoint> for OverlandBatch {
    fn from(point: &TrackedPoint) -> Self {
        OverlandBatch {
            locations: vec![OverlandLocation {
                kind: "Feature",
                geometry: OverlandGeometry {
                    kind: "Point",
                    coordinates: [point.longitude, point.latitude],
                },
                properties: OverlandProperties {
                    timestamp: point.timestamp.to_rfc3339(),
                    device_id: point.name.clone(),
                    horizontal_accuracy: point.horizontal_accuracy,
                    altitude: point.altitude,
                    vertical_accuracy: point.vertical_accuracy,
                    speed: point.speed,
                    battery_level: point.battery,
                },
            }],
        }
    }
}
