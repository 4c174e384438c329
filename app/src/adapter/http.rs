use std::sync::Arc;

use actix_web::{HttpResponse, ResponseError, web};
use chrono::{DateTime, Utc};
use derive_more::derive::{Display, Error};
use serde::Serialize;

use crate::coordinator::CoordinatorState;
use crate::sensor::SensorRegistry;

pub fn new_routes(registry: Arc<SensorRegistry>) -> actix_web::Scope {
    web::scope("/api")
        .app_data(web::Data::from(registry))
        .route("/sensors", web::get().to(get_sensors))
        .route("/sensors/{key}", web::get().to(get_sensor))
        .route("/health", web::get().to(get_health))
}

#[derive(Debug, Error, Display)]
enum SensorApiError {
    #[display("Sensor not found")]
    NotFound,
}

impl ResponseError for SensorApiError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        match self {
            SensorApiError::NotFound => actix_web::http::StatusCode::NOT_FOUND,
        }
    }
}

async fn get_sensors(registry: web::Data<SensorRegistry>) -> HttpResponse {
    HttpResponse::Ok().json(registry.views())
}

async fn get_sensor(
    registry: web::Data<SensorRegistry>,
    key: web::Path<String>,
) -> Result<HttpResponse, SensorApiError> {
    let sensor = registry.get(&key).ok_or(SensorApiError::NotFound)?;
    Ok(HttpResponse::Ok().json(sensor.view()))
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    stats: CoordinatorHealth,
    version: CoordinatorHealth,
}

#[derive(Debug, Serialize)]
struct CoordinatorHealth {
    freshness: String,
    last_error: Option<String>,
    last_success_at: Option<DateTime<Utc>>,
}

impl<T> From<CoordinatorState<T>> for CoordinatorHealth {
    fn from(state: CoordinatorState<T>) -> Self {
        Self {
            freshness: state.freshness.to_string(),
            last_error: state.last_error,
            last_success_at: state.last_success_at,
        }
    }
}

//degraded as long as statistics can't be refreshed, version is informational only
async fn get_health(registry: web::Data<SensorRegistry>) -> HttpResponse {
    let healthy = registry.stats().last_update_success();
    let health = Health {
        status: if healthy { "ok" } else { "degraded" },
        stats: registry.stats().state().into(),
        version: registry.version().state().into(),
    };

    if healthy {
        HttpResponse::Ok().json(health)
    } else {
        HttpResponse::ServiceUnavailable().json(health)
    }
}
