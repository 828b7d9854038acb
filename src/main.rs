//! Garage occupancy controller
//!
//! Counts cars per level from entry/exit beam sensors, confirms parked cars
//! after a dwell window, raises a full alert when every level is at capacity
//! and forwards raw trips to the parking backend.
//!
//! Module structure:
//! - `domain/` - Core types (levels, sensor events, clock)
//! - `io/` - External interfaces (MQTT, display, backend HTTP, Prometheus)
//! - `services/` - Occupancy logic (controller, pipelines, alert, relay)
//! - `infra/` - Infrastructure (Config, Metrics)

use anyhow::Context;
use clap::Parser;
use garage_occupancy::infra::{Config, Metrics};
use garage_occupancy::io::{
    create_egress_channel, BackendClient, DisplayPublisher, EventRelay, MqttPresenter,
};
use garage_occupancy::services::{create_relay_worker, GarageController};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Garage occupancy controller
#[derive(Parser, Debug)]
#[command(name = "garage-controller", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "CONFIG_FILE", default_value = "config/dev.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default: INFO, use RUST_LOG=debug for every sensor event
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(
        version = %env!("CARGO_PKG_VERSION"),
        git = %env!("GIT_HASH"),
        "garage-controller starting"
    );

    let args = Args::parse();
    let config = Config::load_from_path(&args.config)?;

    info!(
        config_file = %config.config_file(),
        garage = %config.garage_name(),
        levels = ?config.level_names(),
        tick_ms = %config.tick_ms(),
        sensor_cooldown_ms = %config.sensor_cooldown_ms(),
        entry_confirm_ms = %config.entry_confirm_ms(),
        flash_period_ms = %config.flash_period_ms(),
        relay_enabled = %config.relay_enabled(),
        mqtt_host = %config.mqtt_host(),
        mqtt_port = %config.mqtt_port(),
        prometheus_port = %config.prometheus_port(),
        "config_loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let metrics = Arc::new(Metrics::new());

    // Backend relay worker (drains the relay queue off the controller task)
    let relay_sender = if config.relay_enabled() {
        let client = BackendClient::new(
            config.relay_base_url(),
            Duration::from_millis(config.relay_timeout_ms()),
        )
        .context("failed to build backend client")?;
        let relay: Arc<dyn EventRelay> = Arc::new(client);
        let (sender, worker) =
            create_relay_worker(relay, metrics.clone(), config.relay_queue_size());
        tokio::spawn(worker.run());
        Some(sender)
    } else {
        info!("relay_disabled");
        None
    };

    // Display egress channel and MQTT publisher
    let (egress_sender, egress_rx) = create_egress_channel(64);
    let publisher = DisplayPublisher::new(&config, egress_rx);
    let publisher_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        publisher.run(publisher_shutdown).await;
    });

    // Sensor events (bounded for backpressure)
    let (event_tx, event_rx) = mpsc::channel(256);

    let mqtt_config = config.clone();
    let mqtt_metrics = metrics.clone();
    let mqtt_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        if let Err(e) = garage_occupancy::io::mqtt::start_mqtt_client(
            &mqtt_config,
            event_tx,
            mqtt_metrics,
            mqtt_shutdown,
        )
        .await
        {
            tracing::error!(error = %e, "MQTT client error");
        }
    });

    // Start Prometheus metrics HTTP server (if port > 0)
    let prometheus_port = config.prometheus_port();
    if prometheus_port > 0 {
        let prom_metrics = metrics.clone();
        let prom_garage = config.garage_name().to_string();
        let prom_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = garage_occupancy::io::prometheus::start_metrics_server(
                prometheus_port,
                prom_metrics,
                prom_garage,
                prom_shutdown,
            )
            .await
            {
                tracing::error!(error = %e, "Prometheus metrics server error");
            }
        });
    }

    // Periodic metrics summary
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs().max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(metrics_interval));
        interval.tick().await;
        loop {
            interval.tick().await;
            metrics_clone.report().log();
        }
    });

    // Handle shutdown on Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    let mut controller = GarageController::new(
        &config,
        Box::new(MqttPresenter::new(egress_sender)),
        relay_sender,
        metrics.clone(),
    );
    controller.startup_sequence(config.startup_frame_ms()).await;

    // Consumes events until shutdown or the ingress task exits
    controller.run(event_rx, shutdown_rx).await;

    metrics.report().log();
    info!("garage-controller shutdown complete");
    Ok(())
}
