//! Alert data models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Alert severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Must reach a human now
    Critical,
    /// Failure that needs attention
    Error,
    /// Degraded but working
    Warning,
    /// Informational
    #[default]
    Info,
}

impl Severity {
    /// Digest ordering, most urgent first
    pub const PRIORITY_ORDER: [Severity; 4] = [
        Severity::Critical,
        Severity::Error,
        Severity::Warning,
        Severity::Info,
    ];

    /// Upper-case wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" => Ok(Severity::Critical),
            "ERROR" => Ok(Severity::Error),
            "WARNING" => Ok(Severity::Warning),
            "INFO" => Ok(Severity::Info),
            other => Err(Error::validation(format!("unknown severity '{other}'"))),
        }
    }
}

/// A triggered alert entering admission control
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    /// Rule that triggered the alert
    pub rule_id: String,

    /// Router/device the alert concerns
    pub device_id: String,

    /// Event type (e.g. "interface.down", "cpu.high")
    pub event_type: String,

    /// Alert severity
    pub severity: Severity,

    /// Event payload, used for throttle grouping
    #[serde(default)]
    pub fields: serde_json::Value,
}

/// An alert held back during quiet hours for digest delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAlert {
    /// Alert rule ID
    pub rule_id: String,

    /// Event type
    pub event_type: String,

    /// Event payload
    #[serde(default)]
    pub event_data: serde_json::Value,

    /// Alert severity; missing severities are reported as INFO
    pub severity: Option<Severity>,

    /// When the alert was queued
    pub timestamp: DateTime<Utc>,

    /// Router/device ID
    pub device_id: String,
}

impl QueuedAlert {
    /// Build a queued alert from an incoming event
    pub fn from_event(event: &AlertEvent, timestamp: DateTime<Utc>) -> Self {
        Self {
            rule_id: event.rule_id.clone(),
            event_type: event.event_type.clone(),
            event_data: event.fields.clone(),
            severity: Some(event.severity),
            timestamp,
            device_id: event.device_id.clone(),
        }
    }

    /// Severity used for grouping
    pub fn effective_severity(&self) -> Severity {
        self.severity.unwrap_or(Severity::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_parse_is_case_insensitive() {
        assert_eq!("critical".parse::<Severity>().unwrap(), Severity::Critical);
        assert_eq!(" Warning ".parse::<Severity>().unwrap(), Severity::Warning);
        assert!("urgent".parse::<Severity>().is_err());
    }

    #[test]
    fn test_severity_serde_uses_upper_case() {
        let json = serde_json::to_string(&Severity::Error).unwrap();
        assert_eq!(json, "\"ERROR\"");

        let parsed: Severity = serde_json::from_str("\"INFO\"").unwrap();
        assert_eq!(parsed, Severity::Info);
    }

    #[test]
    fn test_missing_severity_defaults_to_info() {
        let alert = QueuedAlert {
            rule_id: "rule-1".to_string(),
            event_type: "cpu.high".to_string(),
            event_data: serde_json::Value::Null,
            severity: None,
            timestamp: Utc::now(),
            device_id: "router-1".to_string(),
        };

        assert_eq!(alert.effective_severity(), Severity::Info);
    }
}
