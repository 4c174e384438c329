use cached::proc_macro::cached;
use opentelemetry::KeyValue;

pub fn increment(name: &'static str, labels: &[(&'static str, &str)]) {
    counter(name).add(1, &to_key_values(labels))
}

pub fn set(name: &'static str, value: f64, labels: &[(&'static str, &str)]) {
    gauge(name).record(value, &to_key_values(labels))
}

fn to_key_values(labels: &[(&'static str, &str)]) -> Vec<KeyValue> {
    labels
        .iter()
        .map(|(k, v)| KeyValue::new(*k, (*v).to_owned()))
        .collect()
}

#[cached]
fn counter(name: &'static str) -> opentelemetry::metrics::Counter<u64> {
    opentelemetry::global::meter("dawarich-bridge").u64_counter(name).build()
}

#[cached]
fn gauge(name: &'static str) -> opentelemetry::metrics::Gauge<f64> {
    opentelemetry::global::meter("dawarich-bridge").f64_gauge(name).build()
}
