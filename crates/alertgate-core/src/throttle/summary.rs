//! Throttle status views and summary publishing

use chrono::{DateTime, Utc};
use tracing::{debug, error};

use crate::alerting::EventPublisher;
use crate::models::{GroupStatus, ThrottleStatus, ThrottleSummaryEvent};

use super::{window_length, RuleThrottleState, ThrottleManager};

impl RuleThrottleState {
    fn status(&self, rule_id: &str, now: DateTime<Utc>) -> ThrottleStatus {
        let window_start = now - window_length(self.config.period_seconds);
        let max_alerts = self.config.max_alerts as usize;

        let mut groups: Vec<GroupStatus> = self
            .groups
            .iter()
            .map(|(key, group)| GroupStatus {
                group_key: key.clone(),
                is_throttled: group.count_since(window_start) >= max_alerts,
                suppressed_count: group.suppressed(),
                window_start,
                window_end: now,
            })
            .collect();
        groups.sort_by(|a, b| a.group_key.cmp(&b.group_key));

        ThrottleStatus {
            rule_id: rule_id.to_string(),
            is_throttled: groups.iter().any(|g| g.is_throttled),
            suppressed_count: groups.iter().map(|g| g.suppressed_count).sum(),
            window_start,
            window_end: now,
            groups,
        }
    }
}

impl ThrottleManager {
    /// Status for one rule, or for every rule holding state when `rule_id` is `None`
    pub fn get_status(&self, rule_id: Option<&str>) -> Vec<ThrottleStatus> {
        let now = self.clock.now();

        match rule_id {
            Some(rule_id) => self
                .existing(rule_id)
                .map(|state| vec![state.read().status(rule_id, now)])
                .unwrap_or_default(),
            None => {
                let mut statuses: Vec<ThrottleStatus> = self
                    .snapshot()
                    .into_iter()
                    .map(|(rule_id, state)| state.read().status(&rule_id, now))
                    .collect();
                statuses.sort_by(|a, b| a.rule_id.cmp(&b.rule_id));
                statuses
            }
        }
    }

    /// Publish a `throttle.summary` event for every rule that suppressed
    /// alerts, then deduct the reported counts from its groups.
    ///
    /// A failed publish is logged and leaves that rule's counters intact
    /// so the next round reports them again. Suppressions recorded while
    /// a publish is in flight are kept. Returns the number of
    /// summaries published.
    pub async fn publish_summaries(&self, publisher: &dyn EventPublisher) -> usize {
        let mut published = 0;

        for (rule_id, state) in self.snapshot() {
            let summary = {
                let guard = state.read();
                let summary = guard.summarize(&rule_id, self.clock.now());
                if summary.total_suppressed == 0 {
                    continue;
                }
                summary
            };

            let total_suppressed = summary.total_suppressed;
            let reported: Vec<(String, u64)> = summary
                .groups
                .iter()
                .map(|group| (group.group.clone(), group.suppressed))
                .collect();

            match publisher.publish(ThrottleSummaryEvent::from(summary)).await {
                Ok(()) => {
                    // alerts throttled while publishing stay counted for the next round
                    let mut guard = state.write();
                    for (key, count) in reported {
                        if let Some(group) = guard.groups.get_mut(&key) {
                            group.release_suppressed(count);
                        }
                    }
                    published += 1;
                    debug!(rule_id = %rule_id, total_suppressed, "Throttle summary published");
                }
                Err(e) => {
                    error!(rule_id = %rule_id, error = %e, "Failed to publish throttle summary");
                }
            }
        }

        published
    }

    /// Zero the suppression counters of every group of a rule
    pub fn reset_suppression_counts(&self, rule_id: &str) {
        if let Some(state) = self.existing(rule_id) {
            for group in state.write().groups.values_mut() {
                group.reset_suppressed();
            }
        }
    }
}
