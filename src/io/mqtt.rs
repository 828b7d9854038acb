//! MQTT client for receiving named sensor and button events
//!
//! Payloads on the sensor topic are either a bare event name
//! (`L1_entry_trip`) or a JSON object `{"event": "L1_entry_trip"}`.

use crate::domain::types::{ControllerEvent, SensorEvent, SensorEventKind};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    event: String,
}

/// Extract the event name from a raw payload
pub fn event_name(payload: &str) -> Option<String> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('{') {
        return serde_json::from_str::<EventEnvelope>(trimmed).ok().map(|e| e.event);
    }
    Some(trimmed.to_string())
}

/// Parse one payload into a controller event
pub fn parse_payload(payload: &str, level_names: &[String]) -> Option<ControllerEvent> {
    event_name(payload).map(|name| ControllerEvent::parse(&name, level_names))
}

/// What the ingress loop does with one eventloop notification
#[derive(Debug, PartialEq)]
enum Incoming {
    /// Broker (re)connected. A clean session has no subscriptions yet.
    Connected,
    Event(ControllerEvent),
    Ignored,
}

fn classify(event: Event, level_names: &[String]) -> Incoming {
    match event {
        Event::Incoming(Packet::ConnAck(_)) => Incoming::Connected,
        Event::Incoming(Packet::Publish(publish)) => {
            let payload = match std::str::from_utf8(&publish.payload) {
                Ok(p) => p,
                Err(e) => {
                    warn!(error = %e, "mqtt_invalid_utf8");
                    return Incoming::Ignored;
                }
            };
            match parse_payload(payload, level_names) {
                Some(event) => Incoming::Event(event),
                None => {
                    debug!(topic = %publish.topic, "mqtt_empty_payload");
                    Incoming::Ignored
                }
            }
        }
        _ => Incoming::Ignored,
    }
}

/// Events that must reach the controller even when the channel is full.
/// A lost untrip leaves its channel tripped until the next reset.
fn must_deliver(event: &ControllerEvent) -> bool {
    matches!(
        event,
        ControllerEvent::Reset
            | ControllerEvent::Sensor(SensorEvent { kind: SensorEventKind::Untrip, .. })
    )
}

/// Forwards parsed events into the controller channel
struct EventForwarder {
    event_tx: mpsc::Sender<ControllerEvent>,
    metrics: Arc<Metrics>,
    last_drop_warn: Option<Instant>,
}

impl EventForwarder {
    fn new(event_tx: mpsc::Sender<ControllerEvent>, metrics: Arc<Metrics>) -> Self {
        Self { event_tx, metrics, last_drop_warn: None }
    }

    /// Returns false once the controller side has gone away
    async fn forward(&mut self, event: ControllerEvent) -> bool {
        match self.event_tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) if must_deliver(&event) => {
                warn!(event = ?event, "mqtt_channel_full_waiting");
                self.event_tx.send(event).await.is_ok()
            }
            Err(TrySendError::Full(event)) => {
                self.metrics.record_ingress_dropped();
                let quiet =
                    self.last_drop_warn.map_or(true, |t| t.elapsed() > Duration::from_secs(1));
                if quiet {
                    warn!(event = ?event, "mqtt_event_dropped: channel full");
                    self.last_drop_warn = Some(Instant::now());
                }
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Start the MQTT client and forward parsed events to the controller
///
/// The sensor topic is subscribed on every ConnAck so a broker restart does
/// not silently end ingress. Trips are sent via try_send to avoid blocking
/// the MQTT eventloop; dropped trips are counted and warned about at most
/// once per second. Untrips and resets wait for room instead.
pub async fn start_mqtt_client(
    config: &Config,
    event_tx: mpsc::Sender<ControllerEvent>,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut mqttoptions =
        MqttOptions::new(config.mqtt_client_id(), config.mqtt_host(), config.mqtt_port());
    mqttoptions.set_keep_alive(Duration::from_secs(30));

    if let (Some(username), Some(password)) = (config.mqtt_username(), config.mqtt_password()) {
        mqttoptions.set_credentials(username, password);
    }

    let (client, mut eventloop) = AsyncClient::new(mqttoptions, 100);
    let topic = config.mqtt_sensor_topic().to_string();

    info!(topic = %topic, host = %config.mqtt_host(), port = %config.mqtt_port(), "mqtt_starting");

    let level_names = config.level_names();
    let mut forwarder = EventForwarder::new(event_tx, metrics);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("mqtt_shutdown");
                    return Ok(());
                }
            }
            result = eventloop.poll() => {
                let event = match result {
                    Ok(event) => event,
                    Err(e) => {
                        error!(error = %e, "mqtt_error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                };
                match classify(event, &level_names) {
                    Incoming::Connected => {
                        // try_ so a full request queue cannot stall the eventloop
                        match client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
                            Ok(()) => info!(topic = %topic, "mqtt_subscribed"),
                            Err(e) => error!(error = %e, topic = %topic, "mqtt_subscribe_failed"),
                        }
                    }
                    Incoming::Event(event) => {
                        debug!(event = ?event, "mqtt_event");
                        if !forwarder.forward(event).await {
                            warn!("event_channel_closed");
                            return Ok(());
                        }
                    }
                    Incoming::Ignored => {}
                }
            }
        }
    }
}
