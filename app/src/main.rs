use std::time::Duration;

use settings::Settings;

use crate::dawarich::DawarichClient;
use crate::session::Session;

mod adapter;
mod coordinator;
mod dawarich;
mod sensor;
mod session;
mod settings;
mod tracker;

#[tokio::main(flavor = "multi_thread")]
pub async fn main() {
    let settings = Settings::new().expect("Error reading configuration");

    let monitoring = settings.monitoring.init().expect("Error initializing monitoring");

    let dawarich_config = settings
        .dawarich
        .clone()
        .into_config()
        .expect("Invalid Dawarich configuration");

    let client = DawarichClient::new(&dawarich_config, settings.polling.request_timeout())
        .expect("Error creating Dawarich client");
    tracing::info!("Connecting to Dawarich at {}", client.url());

    let session = Session::setup(&dawarich_config, client, &settings.polling)
        .await
        .expect("Error setting up Dawarich session");

    let mut mqtt = settings.mqtt.new_client();

    let events = if session.tracks_device() {
        let events = settings
            .homeassistant
            .new_state_change_source(&mut mqtt)
            .await
            .expect("Error subscribing to Home Assistant events");
        Some(events)
    } else {
        None
    };

    let exporter = settings
        .homeassistant
        .new_sensor_exporter(mqtt.sender(), session.registry());

    let http_server_exec = {
        let registry = session.registry();

        async move {
            settings
                .http_server
                .run_server(move || vec![adapter::http::new_routes(registry.clone())])
                .await
                .expect("HTTP server execution failed");
        }
    };

    let cancel = session.cancellation_token();

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Error waiting for shutdown signal: {:?}", e);
            std::future::pending::<()>().await;
        }

        tracing::info!("Shutdown requested, unloading Dawarich session");
        cancel.cancel();
    };

    let session_exec = async {
        tokio::join!(session.run(events), exporter.run(cancel.clone()), shutdown);

        //give the MQTT event loop a moment to flush the offline status
        tokio::time::sleep(Duration::from_millis(500)).await;
    };

    tracing::info!("Starting main loop");

    tokio::select!(
        _ = mqtt.run() => {},
        _ = http_server_exec => {},
        _ = session_exec => {},
    );

    monitoring.shutdown();
}
