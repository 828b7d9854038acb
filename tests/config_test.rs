//! Integration tests for configuration loading

use garage_occupancy::domain::types::BackendLevelId;
use garage_occupancy::infra::Config;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

#[test]
fn test_load_config_from_file() {
    let temp_file = write_config(
        r#"
[garage]
name = "North Deck"
tick_ms = 50
startup_frame_ms = 0

[[levels]]
name = "P1"
capacity = 40
backend_id = 201

[[levels]]
name = "P2"
capacity = 35
backend_id = 202

[[levels]]
name = "Roof"
capacity = 12
backend_id = 203

[timing]
sensor_cooldown_ms = 750
entry_confirm_ms = 4000
flash_period_ms = 250

[relay]
enabled = false
base_url = "http://localhost:8080/parking/"
timeout_ms = 1500

[mqtt]
host = "test-host"
port = 1884
sensor_topic = "north/sensors"
display_topic = "north/display"

[metrics]
interval_secs = 15
prometheus_port = 0
"#,
    );

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.garage_name(), "North Deck");
    assert_eq!(config.tick_ms(), 50);
    assert_eq!(config.startup_frame_ms(), 0);
    assert_eq!(config.level_names(), vec!["P1", "P2", "Roof"]);
    assert_eq!(config.levels()[2].capacity, 12);
    assert_eq!(config.levels()[2].backend_id, BackendLevelId(203));
    assert_eq!(config.sensor_cooldown_ms(), 750);
    assert_eq!(config.entry_confirm_ms(), 4000);
    assert_eq!(config.flash_period_ms(), 250);
    assert!(!config.relay_enabled());
    assert_eq!(config.relay_timeout_ms(), 1500);
    assert_eq!(config.mqtt_host(), "test-host");
    assert_eq!(config.mqtt_port(), 1884);
    assert_eq!(config.mqtt_sensor_topic(), "north/sensors");
    assert_eq!(config.mqtt_display_topic(), "north/display");
    assert_eq!(config.metrics_interval_secs(), 15);
    assert_eq!(config.prometheus_port(), 0);
}

#[test]
fn test_partial_file_uses_defaults() {
    let temp_file = write_config(
        r#"
[timing]
entry_confirm_ms = 3000
"#,
    );

    let config = Config::from_file(temp_file.path()).unwrap();
    assert_eq!(config.entry_confirm_ms(), 3000);
    assert_eq!(config.sensor_cooldown_ms(), 1000);
    assert_eq!(config.level_names(), vec!["L1", "L2"]);
    assert_eq!(config.levels()[1].backend_id, BackendLevelId(102));
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml").unwrap();
    assert_eq!(config.mqtt_host(), "localhost");
    assert_eq!(config.mqtt_port(), 1883);
    assert_eq!(config.levels().len(), 2);
    assert_eq!(config.config_file(), "default");
}

#[test]
fn test_invalid_file_is_fatal() {
    let temp_file = write_config("[garage\nname = ");
    assert!(Config::load_from_path(temp_file.path()).is_err());
}

#[test]
fn test_duplicate_level_names_rejected() {
    let temp_file = write_config(
        r#"
[[levels]]
name = "L1"
capacity = 5
backend_id = 101

[[levels]]
name = "L1"
capacity = 5
backend_id = 102
"#,
    );

    let err = Config::load_from_path(temp_file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("duplicate level name"));
}

#[test]
fn test_empty_level_list_rejected() {
    let temp_file = write_config("levels = []\n");
    assert!(Config::from_file(temp_file.path()).is_err());
}

#[test]
fn test_zero_tick_rejected() {
    let temp_file = write_config("[garage]\ntick_ms = 0\n");
    assert!(Config::from_file(temp_file.path()).is_err());
}

#[test]
fn test_shipped_dev_config_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/dev.toml");
    let config = Config::from_file(path).unwrap();
    assert_eq!(config.garage_name(), "Garage A");
    assert_eq!(config.level_names(), vec!["L1", "L2"]);
}
