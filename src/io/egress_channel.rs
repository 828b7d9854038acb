//! Typed channel for outbound display messages
//!
//! Provides a non-blocking way for the controller to hand frames to the
//! MQTT publisher. Bounded so a stalled broker cannot grow memory.

use crate::domain::clock::epoch_ms;
use crate::domain::types::LevelAvailability;
use crate::io::display::LightColor;
use crate::services::presentation::GarageView;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// Payload published on the display topic
#[derive(Debug, Clone, Serialize)]
pub struct DisplayPayload {
    /// `frame` for availability views, `banner` for startup messages
    pub kind: String,
    /// Timestamp (epoch ms)
    pub ts: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub garage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<Vec<LevelAvailability>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash_on: Option<bool>,
    /// LCD rows, already fitted to the display width
    pub lines: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light: Option<LightColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rgb: Option<[u8; 3]>,
}

impl DisplayPayload {
    pub fn frame(view: &GarageView, lines: Vec<String>, light: LightColor) -> Self {
        Self {
            kind: "frame".to_string(),
            ts: epoch_ms(),
            garage: Some(view.garage.clone()),
            levels: Some(view.levels.clone()),
            alert: Some(view.alert.as_str().to_string()),
            flash_on: Some(view.flash_on),
            lines,
            light: Some(light),
            rgb: Some(light.rgb()),
        }
    }

    pub fn banner(lines: Vec<String>) -> Self {
        Self {
            kind: "banner".to_string(),
            ts: epoch_ms(),
            garage: None,
            levels: None,
            alert: None,
            flash_on: None,
            lines,
            light: None,
            rgb: None,
        }
    }
}

/// Sender handle for display messages
///
/// Non-blocking - if the channel is full, the message is dropped.
#[derive(Clone)]
pub struct EgressSender {
    tx: mpsc::Sender<DisplayPayload>,
}

impl EgressSender {
    pub fn new(tx: mpsc::Sender<DisplayPayload>) -> Self {
        Self { tx }
    }

    pub fn send_display(&self, payload: DisplayPayload) {
        match self.tx.try_send(payload) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("display_egress_dropped: channel full"),
            Err(TrySendError::Closed(_)) => warn!("display_egress_closed"),
        }
    }
}

/// Create a new egress channel pair
pub fn create_egress_channel(buffer_size: usize) -> (EgressSender, mpsc::Receiver<DisplayPayload>) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (EgressSender::new(tx), rx)
}
