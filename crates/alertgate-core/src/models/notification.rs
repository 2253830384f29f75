//! Notifications held per channel during quiet hours

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::Severity;

/// Lifetime of a queued notification
pub const NOTIFICATION_TTL_HOURS: i64 = 24;

/// A notification queued for a channel during quiet hours
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedNotification {
    pub channel_id: String,
    pub alert_id: String,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub event_type: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
    /// Stamped on enqueue
    pub queued_at: DateTime<Utc>,
    /// Stamped on enqueue, `queued_at` + 24h
    pub ttl_expires_at: DateTime<Utc>,
}

impl QueuedNotification {
    /// Create an unstamped notification; the queue manager stamps times on enqueue
    pub fn new(
        channel_id: impl Into<String>,
        alert_id: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            alert_id: alert_id.into(),
            title: title.into(),
            message: message.into(),
            severity,
            event_type: event_type.into(),
            data: serde_json::Value::Null,
            queued_at: DateTime::<Utc>::MIN_UTC,
            ttl_expires_at: DateTime::<Utc>::MIN_UTC,
        }
    }

    /// Attach a payload
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Stamp enqueue time and expiry
    pub(crate) fn stamp(&mut self, now: DateTime<Utc>) {
        self.queued_at = now;
        self.ttl_expires_at = now + Duration::hours(NOTIFICATION_TTL_HOURS);
    }

    /// Whether the notification is still deliverable at `now`
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.ttl_expires_at
    }
}
