pub mod meter;

use std::error::Error;

use anyhow::Context;
use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{ExporterBuildError, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MonitoringConfig {
    pub service_name: String,
    pub logs: EnvFilterConfig,
    pub traces: Option<EnvFilterConfig>,
    pub otlp: Option<OtlpConfig>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct EnvFilterConfig {
    pub default_level: String,
    #[serde(default)]
    pub filters: Vec<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct OtlpConfig {
    pub url: String,
    #[serde(default = "default_metrics_interval_secs")]
    pub metrics_interval_secs: u64,
}

fn default_metrics_interval_secs() -> u64 {
    15
}

impl TryInto<EnvFilter> for EnvFilterConfig {
    type Error = anyhow::Error;

    fn try_into(self) -> Result<EnvFilter, Self::Error> {
        let default_level: LevelFilter = self
            .default_level
            .parse()
            .with_context(|| format!("Invalid default log level {}", self.default_level))?;

        EnvFilter::builder()
            .with_default_directive(default_level.into())
            .parse(self.filters.join(","))
            .context("Invalid log filter")
    }
}

/// Handle to the exporters installed by [`MonitoringConfig::init`]. Dropping it without calling
/// [`Monitoring::shutdown`] loses spans and metrics that are still buffered.
pub struct Monitoring {
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl MonitoringConfig {
    pub fn init(&self) -> Result<Monitoring, Box<dyn Error>> {
        let fmt_filter: EnvFilter = self.logs.clone().try_into()?;

        let Some(otlp) = &self.otlp else {
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_filter(fmt_filter))
                .init();

            return Ok(Monitoring {
                tracer_provider: None,
                meter_provider: None,
            });
        };

        let resource = Resource::builder()
            .with_attribute(KeyValue::new("service.name", self.service_name.clone()))
            .build();

        opentelemetry::global::set_text_map_propagator(TraceContextPropagator::default());

        let tracer_provider = init_traces(resource.clone(), &otlp.url)?;
        let tracer = tracer_provider.tracer(self.service_name.clone());
        let tracing_filter: EnvFilter = self.traces.clone().unwrap_or_else(|| self.logs.clone()).try_into()?;
        let tracing_layer = OpenTelemetryLayer::new(tracer).with_filter(tracing_filter);

        let meter_provider = init_metrics(resource, &otlp.url, otlp.metrics_interval_secs)?;
        opentelemetry::global::set_meter_provider(meter_provider.clone());

        tracing_subscriber::registry()
            .with(tracing_layer)
            .with(tracing_subscriber::fmt::layer().with_filter(fmt_filter))
            .init();

        tracing::info!("Exporting traces and metrics to {}", otlp.url);

        Ok(Monitoring {
            tracer_provider: Some(tracer_provider),
            meter_provider: Some(meter_provider),
        })
    }
}

impl Monitoring {
    pub fn shutdown(self) {
        if let Some(provider) = self.tracer_provider
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Error shutting down tracer provider: {e}");
        }

        if let Some(provider) = self.meter_provider
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Error shutting down meter provider: {e}");
        }
    }
}

fn init_traces(resource: Resource, url: &str) -> Result<SdkTracerProvider, ExporterBuildError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(url)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build())
}

fn init_metrics(resource: Resource, url: &str, interval_secs: u64) -> Result<SdkMeterProvider, ExporterBuildError> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(url)
        .build()?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(std::time::Duration::from_secs(interval_secs))
        .build();

    Ok(SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(resource)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_filter_from_config() {
        let config = EnvFilterConfig {
            default_level: "info".to_owned(),
            filters: vec!["dawarich_bridge=debug".to_owned(), "rumqttc=warn".to_owned()],
        };

        let filter: Result<EnvFilter, _> = config.try_into();
        assert!(filter.is_ok());
    }

    #[test]
    fn env_filter_rejects_invalid_level() {
        let config = EnvFilterConfig {
            default_level: "loud".to_owned(),
            filters: vec![],
        };

        let filter: Result<EnvFilter, _> = config.try_into();
        assert!(filter.is_err());
    }

    #[test]
    fn env_filter_accepts_any_case_level() {
        let config = EnvFilterConfig {
            default_level: "WARN".to_owned(),
            filters: vec![],
        };

        let filter: EnvFilter = config.try_into().unwrap();
        assert_eq!(filter.to_string(), "warn");
    }

    //installs the global subscriber, the only test in this crate allowed to do so
    #[test]
    fn init_without_otlp_installs_log_output() {
        let config = MonitoringConfig {
            service_name: "dawarich-bridge".to_owned(),
            logs: EnvFilterConfig {
                default_level: "info".to_owned(),
                filters: vec!["rumqttc=warn".to_owned()],
            },
            traces: None,
            otlp: None,
        };

        let monitoring = config.init().unwrap();
        tracing::info!("Monitoring initialized");
        monitoring.shutdown();
    }
}
