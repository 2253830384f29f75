//! Admission control for triggered alerts
//!
//! Every alert passes three gates in order:
//!
//! 1. the global storm detector (drop while a storm is in progress),
//! 2. the rule's throttle (drop once the rule's window is full),
//! 3. the rule's quiet hours (defer into the per-device digest queue).
//!
//! Whatever survives is delivered immediately by the caller.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::clock::{SharedClock, SystemClock};
use crate::models::{AlertEvent, QueuedAlert, QuietHoursConfig, StormConfig, ThrottleConfig};
use crate::quiet_hours::{format_digest, should_suppress, AlertQueue};
use crate::throttle::{StormDetector, ThrottleManager};

/// Gate that dropped an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Storm,
    Throttle,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Storm => f.write_str("storm"),
            Stage::Throttle => f.write_str("throttle"),
        }
    }
}

/// What to do with an alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Admission {
    /// Deliver now
    Deliver,
    /// Discard
    Dropped { stage: Stage, reason: String },
    /// Held for the quiet hours digest
    Deferred { reason: String },
}

impl Admission {
    pub fn is_deliver(&self) -> bool {
        matches!(self, Admission::Deliver)
    }
}

/// Digest rendered for one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Digest {
    pub device_id: String,
    pub alert_count: usize,
    pub message: String,
}

/// Runs alerts through storm, throttle and quiet hours gates
pub struct AdmissionController {
    storm: StormDetector,
    throttle: ThrottleManager,
    deferred: AlertQueue,
    clock: SharedClock,
}

impl AdmissionController {
    /// Create a controller; every gate shares `clock`
    pub fn new(storm_config: StormConfig, clock: SharedClock) -> Self {
        Self {
            storm: StormDetector::new(storm_config, clock.clone()),
            throttle: ThrottleManager::new(clock.clone()),
            deferred: AlertQueue::new(),
            clock,
        }
    }

    /// Create a controller on the system clock
    pub fn with_system_clock(storm_config: StormConfig) -> Self {
        Self::new(storm_config, Arc::new(SystemClock))
    }

    pub fn storm(&self) -> &StormDetector {
        &self.storm
    }

    pub fn throttle(&self) -> &ThrottleManager {
        &self.throttle
    }

    /// Alerts deferred by quiet hours
    pub fn deferred(&self) -> &AlertQueue {
        &self.deferred
    }

    /// Decide the fate of one alert.
    ///
    /// A rule without a throttle config skips the throttle gate; a rule
    /// without quiet hours is never deferred.
    pub fn admit(
        &self,
        event: &AlertEvent,
        throttle: Option<&ThrottleConfig>,
        quiet_hours: Option<&QuietHoursConfig>,
    ) -> Admission {
        if !self.storm.record_alert() {
            debug!(rule_id = %event.rule_id, device_id = %event.device_id, "Alert dropped by storm detector");
            return Admission::Dropped {
                stage: Stage::Storm,
                reason: "alert storm in progress".to_string(),
            };
        }

        if let Some(config) = throttle {
            let decision = self.throttle.should_allow(&event.rule_id, &event.fields, config);
            if !decision.allowed {
                return Admission::Dropped {
                    stage: Stage::Throttle,
                    reason: decision.reason.unwrap_or_default(),
                };
            }
        }

        if let Some(config) = quiet_hours {
            let now = self.clock.now();
            let decision = should_suppress(config, event.severity, now);
            if decision.suppress {
                self.deferred.enqueue(QueuedAlert::from_event(event, now));
                debug!(
                    rule_id = %event.rule_id,
                    device_id = %event.device_id,
                    severity = %event.severity,
                    "Alert deferred for quiet hours digest"
                );
                return Admission::Deferred {
                    reason: decision.reason.unwrap_or_default(),
                };
            }
        }

        Admission::Deliver
    }

    /// Drain deferred alerts into one digest per device, ordered by device id
    pub fn drain_digests(&self) -> Vec<Digest> {
        let mut digests: Vec<Digest> = self
            .deferred
            .dequeue_all()
            .into_iter()
            .filter(|(_, alerts)| !alerts.is_empty())
            .map(|(device_id, alerts)| Digest {
                message: format_digest(&alerts, &device_id),
                alert_count: alerts.len(),
                device_id,
            })
            .collect();

        digests.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        digests
    }
}
