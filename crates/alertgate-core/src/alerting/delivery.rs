//! Delivery and publishing seams
//!
//! The core never talks to notification channels or an event bus itself.
//! Callers plug those in through [`NotificationDelivery`] and
//! [`EventPublisher`]. [`LogSink`] implements both by writing to the
//! tracing subscriber, which is what the CLI uses.

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::models::{QueuedNotification, ThrottleSummaryEvent};

/// Hands queued notifications to the outside world once quiet hours end.
///
/// Implementations own retry and backoff; the queue manager only logs a
/// failed or timed-out delivery.
#[async_trait]
pub trait NotificationDelivery: Send + Sync {
    /// Deliver a batch of notifications
    async fn deliver(&self, notifications: Vec<QueuedNotification>) -> Result<()>;
}

/// Publishes throttle summary events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a single event
    async fn publish(&self, event: ThrottleSummaryEvent) -> Result<()>;
}

/// Writes deliveries and events to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationDelivery for LogSink {
    async fn deliver(&self, notifications: Vec<QueuedNotification>) -> Result<()> {
        for notification in &notifications {
            info!(
                channel_id = %notification.channel_id,
                alert_id = %notification.alert_id,
                severity = %notification.severity,
                event_type = %notification.event_type,
                queued_at = %notification.queued_at,
                "{}",
                notification.title
            );
        }
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for LogSink {
    async fn publish(&self, event: ThrottleSummaryEvent) -> Result<()> {
        let payload = serde_json::to_string(&event)?;
        info!(
            event_type = %event.event_type,
            rule_id = %event.rule_id,
            payload = %payload,
            "Published event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;

    #[tokio::test]
    async fn test_log_sink_accepts_everything() {
        let notification = QueuedNotification::new(
            "email-ops",
            "alert-1",
            "Link down",
            "ether1 lost carrier",
            Severity::Warning,
            "interface.down",
        );
        assert!(LogSink.deliver(vec![notification]).await.is_ok());

        let event = ThrottleSummaryEvent {
            event_type: "throttle.summary".to_string(),
            rule_id: "rule-1".to_string(),
            total_allowed: 3,
            total_suppressed: 7,
            period_seconds: 60,
            groups: Vec::new(),
        };
        assert!(LogSink.publish(event).await.is_ok());
    }
}
