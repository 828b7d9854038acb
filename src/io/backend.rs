//! Parking backend REST client
//!
//! Endpoints (relative to the configured base URL):
//! - `POST events`  - one raw sensor event `{ "level_id", "sensor_type" }`
//! - `GET garages`  - garage list, for connectivity checks
//! - `GET levels`   - level list with backend `level_id`s

use crate::domain::types::{BackendLevelId, Direction};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Failures at the relay boundary. None of these ever reach the occupancy core.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed backend response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("sensor_type must be 'entry' or 'exit', got '{0}'")]
    InvalidSensorType(String),

    #[error("relay queue full")]
    QueueFull,

    #[error("relay queue closed")]
    QueueClosed,
}

/// Parsed backend reply (`Null` when the body was empty)
#[derive(Debug, Clone, PartialEq)]
pub struct RelayResponse(pub serde_json::Value);

impl std::fmt::Display for RelayResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Anything that can forward one admitted trip to the backend
#[async_trait]
pub trait EventRelay: Send + Sync {
    async fn relay(
        &self,
        level_id: BackendLevelId,
        direction: Direction,
    ) -> Result<RelayResponse, RelayError>;
}

#[derive(Debug, Serialize)]
struct SensorEventBody<'a> {
    level_id: i64,
    sensor_type: &'a str,
}

/// HTTP client for the parking REST module
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// `base_url` must end with `/`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url: base_url.to_string() })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// POST a raw sensor event. `sensor_type` must be `entry` or `exit`.
    pub async fn send_sensor_event(
        &self,
        level_id: i64,
        sensor_type: &str,
    ) -> Result<RelayResponse, RelayError> {
        if sensor_type.parse::<Direction>().is_err() {
            return Err(RelayError::InvalidSensorType(sensor_type.to_string()));
        }

        let url = self.url("events");
        let body = SensorEventBody { level_id, sensor_type };
        debug!(url = %url, level_id = %level_id, sensor_type = %sensor_type, "backend_post");

        let response = self.http.post(&url).json(&body).send().await?;
        Self::decode(response).await
    }

    pub async fn get_garages(&self) -> Result<RelayResponse, RelayError> {
        self.get("garages").await
    }

    pub async fn get_levels(&self) -> Result<RelayResponse, RelayError> {
        self.get("levels").await
    }

    async fn get(&self, endpoint: &str) -> Result<RelayResponse, RelayError> {
        let url = self.url(endpoint);
        debug!(url = %url, "backend_get");
        let response = self.http.get(&url).send().await?;
        Self::decode(response).await
    }

    async fn decode(response: reqwest::Response) -> Result<RelayResponse, RelayError> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(RelayError::Status { status: status.as_u16(), body: text });
        }
        parse_body(&text)
    }
}

fn parse_body(text: &str) -> Result<RelayResponse, RelayError> {
    if text.trim().is_empty() {
        return Ok(RelayResponse(serde_json::Value::Null));
    }
    Ok(RelayResponse(serde_json::from_str(text)?))
}

/// Find the backend id of `level_number` in `garage_id` from a `GET levels` reply
pub fn find_level_id(levels: &serde_json::Value, garage_id: i64, level_number: i64) -> Option<i64> {
    levels.get("items")?.as_array()?.iter().find_map(|item| {
        let garage = item.get("garage_id")?.as_i64()?;
        let number = item.get("level_number")?.as_i64()?;
        if garage == garage_id && number == level_number {
            item.get("level_id")?.as_i64()
        } else {
            None
        }
    })
}

#[async_trait]
impl EventRelay for BackendClient {
    async fn relay(
        &self,
        level_id: BackendLevelId,
        direction: Direction,
    ) -> Result<RelayResponse, RelayError> {
        self.send_sensor_event(level_id.0, direction.as_str()).await
    }
}
