//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `mqtt` - MQTT client for receiving named sensor events
//! - `mqtt_egress` - MQTT publisher for display frames
//! - `egress_channel` - Typed channel for display messages
//! - `display` - LCD and light strip projection, presenters
//! - `backend` - HTTP client for the parking backend
//! - `prometheus` - Prometheus metrics HTTP endpoint

pub mod backend;
pub mod display;
pub mod egress_channel;
pub mod mqtt;
pub mod mqtt_egress;
pub mod prometheus;

// Re-export commonly used types
pub use backend::{BackendClient, EventRelay, RelayError};
pub use display::{LogPresenter, MqttPresenter};
pub use egress_channel::{create_egress_channel, DisplayPayload, EgressSender};
pub use mqtt_egress::DisplayPublisher;
