//! Configuration loading from TOML files
//!
//! The binaries select the config file (via clap) from:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! A missing file falls back to defaults. A file that exists but does not
//! parse or validate is fatal.

use crate::domain::types::BackendLevelId;
use crate::infra::metrics::MAX_LEVELS;
use anyhow::{bail, Context};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct GarageConfig {
    #[serde(default = "default_garage_name")]
    pub name: String,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// How long each startup banner frame is held (0 skips the banner)
    #[serde(default = "default_startup_frame_ms")]
    pub startup_frame_ms: u64,
}

impl Default for GarageConfig {
    fn default() -> Self {
        Self {
            name: default_garage_name(),
            tick_ms: default_tick_ms(),
            startup_frame_ms: default_startup_frame_ms(),
        }
    }
}

fn default_garage_name() -> String {
    "Garage A".to_string()
}

fn default_tick_ms() -> u64 {
    100
}

fn default_startup_frame_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Deserialize)]
pub struct LevelEntry {
    pub name: String,
    pub capacity: u32,
    /// Level id expected by the backend (e.g. 101 for Garage A level 1)
    pub backend_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_sensor_cooldown_ms")]
    pub sensor_cooldown_ms: u32,
    #[serde(default = "default_entry_confirm_ms")]
    pub entry_confirm_ms: u32,
    #[serde(default = "default_flash_period_ms")]
    pub flash_period_ms: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            sensor_cooldown_ms: default_sensor_cooldown_ms(),
            entry_confirm_ms: default_entry_confirm_ms(),
            flash_period_ms: default_flash_period_ms(),
        }
    }
}

fn default_sensor_cooldown_ms() -> u32 {
    1000
}

fn default_entry_confirm_ms() -> u32 {
    5000
}

fn default_flash_period_ms() -> u32 {
    500
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_relay_enabled")]
    pub enabled: bool,
    #[serde(default = "default_relay_base_url")]
    pub base_url: String,
    #[serde(default = "default_relay_timeout_ms")]
    pub timeout_ms: u64,
    /// Bounded relay queue size (newest request dropped when full)
    #[serde(default = "default_relay_queue_size")]
    pub queue_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: default_relay_enabled(),
            base_url: default_relay_base_url(),
            timeout_ms: default_relay_timeout_ms(),
            queue_size: default_relay_queue_size(),
        }
    }
}

fn default_relay_enabled() -> bool {
    true
}

fn default_relay_base_url() -> String {
    "https://oracleapex.com/ords/jarias32/parking/".to_string()
}

fn default_relay_timeout_ms() -> u64 {
    3000
}

fn default_relay_queue_size() -> usize {
    64
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Topic carrying named sensor/button events
    #[serde(default = "default_sensor_topic")]
    pub sensor_topic: String,
    /// Topic that receives rendered display frames
    #[serde(default = "default_display_topic")]
    pub display_topic: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            client_id: default_client_id(),
            sensor_topic: default_sensor_topic(),
            display_topic: default_display_topic(),
            username: None,
            password: None,
        }
    }
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "garage-controller".to_string()
}

fn default_sensor_topic() -> String {
    "garage/sensors".to_string()
}

fn default_display_topic() -> String {
    "garage/display".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
    /// Prometheus metrics HTTP port (0 to disable)
    #[serde(default = "default_prometheus_port")]
    pub prometheus_port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval(), prometheus_port: default_prometheus_port() }
    }
}

fn default_metrics_interval() -> u64 {
    30
}

fn default_prometheus_port() -> u16 {
    9100
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub garage: GarageConfig,
    #[serde(default = "default_levels")]
    pub levels: Vec<LevelEntry>,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn default_levels() -> Vec<LevelEntry> {
    vec![
        LevelEntry { name: "L1".to_string(), capacity: 10, backend_id: 101 },
        LevelEntry { name: "L2".to_string(), capacity: 10, backend_id: 102 },
    ]
}

/// Static description of one level
#[derive(Debug, Clone, PartialEq)]
pub struct LevelSpec {
    pub name: String,
    pub capacity: u32,
    pub backend_id: BackendLevelId,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    garage_name: String,
    tick_ms: u64,
    startup_frame_ms: u64,
    levels: Vec<LevelSpec>,
    sensor_cooldown_ms: u32,
    entry_confirm_ms: u32,
    flash_period_ms: u32,
    relay_enabled: bool,
    relay_base_url: String,
    relay_timeout_ms: u64,
    relay_queue_size: usize,
    mqtt_host: String,
    mqtt_port: u16,
    mqtt_client_id: String,
    mqtt_sensor_topic: String,
    mqtt_display_topic: String,
    mqtt_username: Option<String>,
    mqtt_password: Option<String>,
    metrics_interval_secs: u64,
    prometheus_port: u16,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(
            TomlConfig {
                garage: GarageConfig::default(),
                levels: default_levels(),
                timing: TimingConfig::default(),
                relay: RelayConfig::default(),
                mqtt: MqttConfig::default(),
                metrics: MetricsConfig::default(),
            },
            "default".to_string(),
        )
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config = Self::from_toml_str(&content, path.display().to_string())
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str, source: String) -> anyhow::Result<Self> {
        let toml_config: TomlConfig = toml::from_str(content).context("Failed to parse TOML")?;
        let config = Self::from_toml(toml_config, source);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a path.
    ///
    /// Falls back to defaults only when the file does not exist.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(config_file = %path.display(), "config_file_missing_using_defaults");
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        let levels = toml_config
            .levels
            .into_iter()
            .map(|l| LevelSpec {
                name: l.name,
                capacity: l.capacity,
                backend_id: BackendLevelId(l.backend_id),
            })
            .collect();

        Self {
            garage_name: toml_config.garage.name,
            tick_ms: toml_config.garage.tick_ms,
            startup_frame_ms: toml_config.garage.startup_frame_ms,
            levels,
            sensor_cooldown_ms: toml_config.timing.sensor_cooldown_ms,
            entry_confirm_ms: toml_config.timing.entry_confirm_ms,
            flash_period_ms: toml_config.timing.flash_period_ms,
            relay_enabled: toml_config.relay.enabled,
            relay_base_url: toml_config.relay.base_url,
            relay_timeout_ms: toml_config.relay.timeout_ms,
            relay_queue_size: toml_config.relay.queue_size,
            mqtt_host: toml_config.mqtt.host,
            mqtt_port: toml_config.mqtt.port,
            mqtt_client_id: toml_config.mqtt.client_id,
            mqtt_sensor_topic: toml_config.mqtt.sensor_topic,
            mqtt_display_topic: toml_config.mqtt.display_topic,
            mqtt_username: toml_config.mqtt.username,
            mqtt_password: toml_config.mqtt.password,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            prometheus_port: toml_config.metrics.prometheus_port,
            config_file,
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.levels.is_empty() {
            bail!("at least one [[levels]] entry is required");
        }
        if self.levels.len() > MAX_LEVELS {
            let count = self.levels.len();
            bail!("at most {MAX_LEVELS} [[levels]] entries are supported, got {count}");
        }

        let mut seen = HashSet::new();
        for level in &self.levels {
            if level.name.is_empty() || level.name.contains('_') {
                bail!("level name '{}' must be non-empty and contain no '_'", level.name);
            }
            if !seen.insert(level.name.as_str()) {
                bail!("duplicate level name '{}'", level.name);
            }
        }

        if self.tick_ms == 0 {
            bail!("garage.tick_ms must be greater than 0");
        }
        if self.flash_period_ms == 0 {
            bail!("timing.flash_period_ms must be greater than 0");
        }
        if self.relay_enabled && self.relay_queue_size == 0 {
            bail!("relay.queue_size must be greater than 0");
        }
        if self.relay_enabled && !self.relay_base_url.ends_with('/') {
            bail!("relay.base_url must end with '/'");
        }
        Ok(())
    }

    pub fn level_names(&self) -> Vec<String> {
        self.levels.iter().map(|l| l.name.clone()).collect()
    }

    // Getters for all config fields
    pub fn garage_name(&self) -> &str {
        &self.garage_name
    }

    pub fn tick_ms(&self) -> u64 {
        self.tick_ms
    }

    pub fn startup_frame_ms(&self) -> u64 {
        self.startup_frame_ms
    }

    pub fn levels(&self) -> &[LevelSpec] {
        &self.levels
    }

    pub fn sensor_cooldown_ms(&self) -> u32 {
        self.sensor_cooldown_ms
    }

    pub fn entry_confirm_ms(&self) -> u32 {
        self.entry_confirm_ms
    }

    pub fn flash_period_ms(&self) -> u32 {
        self.flash_period_ms
    }

    pub fn relay_enabled(&self) -> bool {
        self.relay_enabled
    }

    pub fn relay_base_url(&self) -> &str {
        &self.relay_base_url
    }

    pub fn relay_timeout_ms(&self) -> u64 {
        self.relay_timeout_ms
    }

    pub fn relay_queue_size(&self) -> usize {
        self.relay_queue_size
    }

    pub fn mqtt_host(&self) -> &str {
        &self.mqtt_host
    }

    pub fn mqtt_port(&self) -> u16 {
        self.mqtt_port
    }

    pub fn mqtt_client_id(&self) -> &str {
        &self.mqtt_client_id
    }

    pub fn mqtt_sensor_topic(&self) -> &str {
        &self.mqtt_sensor_topic
    }

    pub fn mqtt_display_topic(&self) -> &str {
        &self.mqtt_display_topic
    }

    pub fn mqtt_username(&self) -> Option<&str> {
        self.mqtt_username.as_deref()
    }

    pub fn mqtt_password(&self) -> Option<&str> {
        self.mqtt_password.as_deref()
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn prometheus_port(&self) -> u16 {
        self.prometheus_port
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to set every level's capacity
    pub fn with_capacity(mut self, capacity: u32) -> Self {
        for level in &mut self.levels {
            level.capacity = capacity;
        }
        self
    }

    /// Builder method for tests to set the timing windows
    pub fn with_timing(mut self, cooldown_ms: u32, confirm_ms: u32, flash_ms: u32) -> Self {
        self.sensor_cooldown_ms = cooldown_ms;
        self.entry_confirm_ms = confirm_ms;
        self.flash_period_ms = flash_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.garage_name(), "Garage A");
        assert_eq!(config.tick_ms(), 100);
        assert_eq!(config.sensor_cooldown_ms(), 1000);
        assert_eq!(config.entry_confirm_ms(), 5000);
        assert_eq!(config.flash_period_ms(), 500);
        assert_eq!(config.levels().len(), 2);
        assert_eq!(config.levels()[0].backend_id, BackendLevelId(101));
        assert_eq!(config.levels()[1].backend_id, BackendLevelId(102));
        assert_eq!(config.level_names(), vec!["L1".to_string(), "L2".to_string()]);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml_str("[garage]\nname = \"North\"\n", "inline".into()).unwrap();
        assert_eq!(config.garage_name(), "North");
        assert_eq!(config.levels().len(), 2);
        assert_eq!(config.relay_queue_size(), 64);
    }

    #[test]
    fn test_malformed_level_is_fatal() {
        let bad = r#"
[[levels]]
name = "L1"
capacity = "ten"
backend_id = 101
"#;
        assert!(Config::from_toml_str(bad, "inline".into()).is_err());
    }

    #[test]
    fn test_duplicate_level_rejected() {
        let dup = r#"
[[levels]]
name = "L1"
capacity = 3
backend_id = 101

[[levels]]
name = "L1"
capacity = 3
backend_id = 102
"#;
        let err = Config::from_toml_str(dup, "inline".into()).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate level"));
    }

    #[test]
    fn test_zero_tick_rejected() {
        assert!(Config::from_toml_str("[garage]\ntick_ms = 0\n", "inline".into()).is_err());
    }

    #[test]
    fn test_level_name_with_underscore_rejected() {
        let bad = r#"
[[levels]]
name = "L_1"
capacity = 3
backend_id = 101
"#;
        assert!(Config::from_toml_str(bad, "inline".into()).is_err());
    }

    #[test]
    fn test_too_many_levels_rejected() {
        let level =
            |i: usize| format!("[[levels]]\nname = \"L{i}\"\ncapacity = 1\nbackend_id = {i}\n");
        let at_limit: String = (1..=MAX_LEVELS).map(level).collect();
        assert!(Config::from_toml_str(&at_limit, "inline".into()).is_ok());

        let over: String = (1..=MAX_LEVELS + 1).map(level).collect();
        let err = Config::from_toml_str(&over, "inline".into()).unwrap_err();
        assert!(format!("{err:#}").contains("at most 8"));
    }

    #[test]
    fn test_builders() {
        let config = Config::default().with_capacity(2).with_timing(10, 20, 30);
        assert!(config.levels().iter().all(|l| l.capacity == 2));
        assert_eq!(config.sensor_cooldown_ms(), 10);
        assert_eq!(config.entry_confirm_ms(), 20);
        assert_eq!(config.flash_period_ms(), 30);
    }
}
