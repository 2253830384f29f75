//! Throttle and storm detection models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-rule rate limit
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrottleConfig {
    /// Maximum alerts allowed in any trailing period; 0 disables throttling
    pub max_alerts: u32,

    /// Length of the trailing window in seconds; 0 disables throttling
    pub period_seconds: u64,

    /// Dotted path into the event payload used to partition state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by_field: Option<String>,
}

impl ThrottleConfig {
    /// Create a config without grouping
    pub fn new(max_alerts: u32, period_seconds: u64) -> Self {
        Self {
            max_alerts,
            period_seconds,
            group_by_field: None,
        }
    }

    /// Partition state by a payload field
    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.group_by_field = Some(field.into());
        self
    }

    /// An unconfigured rule never throttles
    pub fn is_enabled(&self) -> bool {
        self.max_alerts > 0 && self.period_seconds > 0
    }
}

/// Outcome of a throttle check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl ThrottleDecision {
    pub(crate) fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub(crate) fn deny(reason: String) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }
}

/// Per-group slice of a throttle summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group: String,
    pub allowed: usize,
    pub suppressed: u64,
    pub oldest_alert: Option<DateTime<Utc>>,
    pub newest_alert: Option<DateTime<Utc>>,
    pub window_start: DateTime<Utc>,
}

/// Read-only view of a rule's throttle state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrottleSummary {
    pub rule_id: String,
    pub max_alerts: u32,
    pub period_seconds: u64,
    pub total_allowed: usize,
    pub total_suppressed: u64,
    pub groups: Vec<GroupSummary>,
    pub window_type: String,
}

/// Throttle status of one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStatus {
    pub group_key: String,
    pub is_throttled: bool,
    pub suppressed_count: u64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

/// Throttle status of one rule, for status consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrottleStatus {
    pub rule_id: String,
    pub is_throttled: bool,
    pub suppressed_count: u64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub groups: Vec<GroupStatus>,
}

/// Periodic summary published for rules that suppressed alerts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrottleSummaryEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub rule_id: String,
    pub total_allowed: usize,
    pub total_suppressed: u64,
    pub period_seconds: u64,
    pub groups: Vec<GroupSummary>,
}

impl From<ThrottleSummary> for ThrottleSummaryEvent {
    fn from(summary: ThrottleSummary) -> Self {
        Self {
            event_type: "throttle.summary".to_string(),
            rule_id: summary.rule_id,
            total_allowed: summary.total_allowed,
            total_suppressed: summary.total_suppressed,
            period_seconds: summary.period_seconds,
            groups: summary.groups,
        }
    }
}

/// System-wide burst detection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StormConfig {
    /// Alerts tolerated inside the window before storm mode
    pub threshold: usize,
    /// Sliding window length in seconds
    pub window_seconds: u64,
    /// Time storm mode lasts after it starts, in seconds
    pub cooldown_seconds: u64,
}

impl Default for StormConfig {
    fn default() -> Self {
        Self {
            threshold: 100,
            window_seconds: 60,
            cooldown_seconds: 300,
        }
    }
}

/// Snapshot of the storm detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StormStatus {
    pub in_storm: bool,
    pub storm_start_time: Option<DateTime<Utc>>,
    pub suppressed_count: u64,
    /// Alerts per minute over the current window
    pub current_rate: f64,
    /// Threshold expressed as alerts per minute
    pub threshold_rate: f64,
    /// Zero when not in storm mode
    #[serde(with = "humantime_serde")]
    pub cooldown_remaining: std::time::Duration,
}
