//! MQTT publisher for display frames
//!
//! Publishes every rendered frame to the display topic as retained JSON so a
//! sign that reconnects immediately gets the latest availability.

use crate::infra::config::Config;
use crate::io::egress_channel::DisplayPayload;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// MQTT display publisher actor
pub struct DisplayPublisher {
    client: AsyncClient,
    rx: mpsc::Receiver<DisplayPayload>,
    topic: String,
}

impl DisplayPublisher {
    /// Create a new publisher connected to the configured broker
    pub fn new(config: &Config, rx: mpsc::Receiver<DisplayPayload>) -> Self {
        let client_id = format!("{}-display-{}", config.mqtt_client_id(), std::process::id());
        let mut mqttoptions = MqttOptions::new(client_id, config.mqtt_host(), config.mqtt_port());
        mqttoptions.set_keep_alive(Duration::from_secs(30));
        mqttoptions.set_clean_session(true);

        if let (Some(username), Some(password)) = (config.mqtt_username(), config.mqtt_password()) {
            mqttoptions.set_credentials(username, password);
        }

        let (client, eventloop) = AsyncClient::new(mqttoptions, 100);

        // Spawn the eventloop handler
        tokio::spawn(async move {
            let mut eventloop = eventloop;
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("mqtt_display_connected");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "mqtt_display_error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Self { client, rx, topic: config.mqtt_display_topic().to_string() }
    }

    /// Run the publisher loop until shutdown
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(topic = %self.topic, "mqtt_display_started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("mqtt_display_shutdown");
                        while let Ok(payload) = self.rx.try_recv() {
                            self.publish(payload).await;
                        }
                        return;
                    }
                }
                msg = self.rx.recv() => {
                    match msg {
                        Some(payload) => self.publish(payload).await,
                        None => return,
                    }
                }
            }
        }
    }

    async fn publish(&self, payload: DisplayPayload) {
        let json = match serde_json::to_string(&payload) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "mqtt_display_serialize_failed");
                return;
            }
        };
        let result = self.client.publish(&self.topic, QoS::AtMostOnce, true, json.as_bytes()).await;
        if let Err(e) = result {
            debug!(error = %e, "mqtt_display_publish_failed");
        }
    }
}
