//! Configuration management for AlertGate
//!
//! Sources are layered, later ones winning:
//!
//! 1. built-in defaults,
//! 2. a TOML/YAML/JSON file (explicit path, or the platform config dir),
//! 3. environment variables such as `ALERTGATE__STORM__THRESHOLD=250`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Environment, File};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::Result;
use crate::models::{QuietHoursConfig, StormConfig};
use crate::quiet_hours::{
    parse_quiet_hours_config, DEFAULT_DELIVERY_TIMEOUT, DEFAULT_MAX_QUEUE_SIZE,
    DEFAULT_TICK_INTERVAL,
};

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "ALERTGATE";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Global storm detection
    pub storm: StormConfig,

    /// Quiet hours queue manager settings
    pub queue: QueueSettings,

    /// Default quiet hours window, validated by [`Config::quiet_hours`]
    pub quiet_hours: Option<QuietHoursSettings>,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from defaults, an optional file and the environment.
    ///
    /// With no explicit `path` the platform config file
    /// (see [`Config::default_path`]) is used when it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        match path {
            Some(path) => {
                debug!(path = %path.display(), "Loading configuration file");
                builder = builder.add_source(File::from(path).required(true));
            }
            None => {
                if let Some(path) = Self::default_path().filter(|p| p.exists()) {
                    debug!(path = %path.display(), "Loading default configuration file");
                    builder = builder.add_source(File::from(path).required(false));
                }
            }
        }

        let config: Self = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// `<config dir>/alertgate/config.toml` for the current platform
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "alertgate")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Validated quiet hours window, `None` when not configured
    pub fn quiet_hours(&self) -> Result<Option<QuietHoursConfig>> {
        self.quiet_hours
            .as_ref()
            .map(|settings| parse_quiet_hours_config(&settings.to_raw()))
            .transpose()
    }
}

/// Quiet hours queue manager settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Per-channel capacity
    pub max_queue_size: usize,
    /// Background wake interval, e.g. "1m"
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,
    /// Deadline for one delivery, e.g. "30s"
    #[serde(with = "humantime_serde")]
    pub delivery_timeout: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            tick_interval: DEFAULT_TICK_INTERVAL,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }
}

/// Quiet hours as written in a config file.
///
/// Keys are snake_case here; they are converted to the API's map shape
/// and validated by [`parse_quiet_hours_config`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuietHoursSettings {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub timezone: Option<String>,
    pub bypass_critical: Option<bool>,
    pub days_of_week: Option<Vec<f64>>,
}

impl QuietHoursSettings {
    fn to_raw(&self) -> Value {
        let mut raw = Map::new();
        let fields = [
            ("startTime", self.start_time.as_ref().map(|v| json!(v))),
            ("endTime", self.end_time.as_ref().map(|v| json!(v))),
            ("timezone", self.timezone.as_ref().map(|v| json!(v))),
            ("bypassCritical", self.bypass_critical.map(|v| json!(v))),
            ("daysOfWeek", self.days_of_week.as_ref().map(|v| json!(v))),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                raw.insert(key.to_string(), value);
            }
        }
        Value::Object(raw)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.storm, StormConfig::default());
        assert_eq!(config.queue.max_queue_size, 100);
        assert_eq!(config.queue.tick_interval, Duration::from_secs(60));
        assert_eq!(config.queue.delivery_timeout, Duration::from_secs(30));
        assert_eq!(config.logging.format, "pretty");
        assert!(config.quiet_hours().unwrap().is_none());
    }

    #[test]
    fn test_quiet_hours_settings_are_validated() {
        let config = Config {
            quiet_hours: Some(QuietHoursSettings {
                start_time: Some("22:00".to_string()),
                end_time: Some("07:00".to_string()),
                timezone: Some("Europe/Paris".to_string()),
                days_of_week: Some(vec![1.0, 5.0]),
                ..QuietHoursSettings::default()
            }),
            ..Config::default()
        };

        let quiet = config.quiet_hours().unwrap().unwrap();
        assert_eq!(quiet.timezone, "Europe/Paris");
        assert!(quiet.bypass_critical);
        assert_eq!(quiet.days_of_week, vec![1, 5]);
    }

    #[test]
    fn test_quiet_hours_missing_start_rejected() {
        let config = Config {
            quiet_hours: Some(QuietHoursSettings {
                end_time: Some("07:00".to_string()),
                ..QuietHoursSettings::default()
            }),
            ..Config::default()
        };

        assert!(matches!(config.quiet_hours(), Err(Error::Validation(_))));
    }
}
