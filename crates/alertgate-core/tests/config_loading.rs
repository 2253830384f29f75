//! Layered configuration loading

use std::fs;
use std::time::Duration;

use alertgate::{Config, Error};
use tempfile::TempDir;

const FULL_CONFIG: &str = r#"
[storm]
threshold = 250
window_seconds = 30

[queue]
max_queue_size = 5
tick_interval = "15s"
delivery_timeout = "2s"

[quiet_hours]
start_time = "22:00"
end_time = "07:00"
timezone = "America/New_York"
bypass_critical = false
days_of_week = [1, 2, 3, 4, 5]

[logging]
level = "debug"
format = "json"
"#;

fn write_config(contents: &str) -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("alertgate.toml");
    fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
fn loads_toml_file() {
    let (_dir, path) = write_config(FULL_CONFIG);
    let config = Config::load(Some(&path)).unwrap();

    assert_eq!(config.storm.threshold, 250);
    assert_eq!(config.storm.window_seconds, 30);
    assert_eq!(config.queue.max_queue_size, 5);
    assert_eq!(config.queue.tick_interval, Duration::from_secs(15));
    assert_eq!(config.queue.delivery_timeout, Duration::from_secs(2));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, "json");

    let quiet = config.quiet_hours().unwrap().unwrap();
    assert_eq!(quiet.start_time, "22:00");
    assert_eq!(quiet.timezone, "America/New_York");
    assert!(!quiet.bypass_critical);
    assert_eq!(quiet.days_of_week, vec![1, 2, 3, 4, 5]);
}

#[test]
fn partial_file_keeps_defaults() {
    let (_dir, path) = write_config("[queue]\nmax_queue_size = 7\n");
    let config = Config::load(Some(&path)).unwrap();

    assert_eq!(config.queue.max_queue_size, 7);
    assert_eq!(config.queue.tick_interval, Duration::from_secs(60));
    assert_eq!(config.storm.threshold, 100);
    assert!(config.quiet_hours.is_none());
}

#[test]
fn environment_overrides_file() {
    let (_dir, path) = write_config(FULL_CONFIG);

    std::env::set_var("ALERTGATE__STORM__COOLDOWN_SECONDS", "42");
    let config = Config::load(Some(&path));
    std::env::remove_var("ALERTGATE__STORM__COOLDOWN_SECONDS");

    let config = config.unwrap();
    assert_eq!(config.storm.cooldown_seconds, 42);
    assert_eq!(config.storm.threshold, 250);
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let result = Config::load(Some(&dir.path().join("absent.toml")));

    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn unknown_timezone_is_rejected_on_validation() {
    let (_dir, path) = write_config(
        "[quiet_hours]\nstart_time = \"22:00\"\nend_time = \"07:00\"\ntimezone = \"Mars/Olympus_Mons\"\n",
    );
    let config = Config::load(Some(&path)).unwrap();

    assert!(matches!(
        config.quiet_hours(),
        Err(Error::InvalidTimezone { timezone }) if timezone == "Mars/Olympus_Mons"
    ));
}
