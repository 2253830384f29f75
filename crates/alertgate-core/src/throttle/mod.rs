//! Per-rule sliding-window throttling and global storm detection
//!
//! [`ThrottleManager`] limits each (rule, group) pair to `max_alerts`
//! alerts in any trailing `period_seconds` window. Rule entries live in a
//! sharded map; the shard lock is held only long enough to fetch or insert
//! the rule's `Arc`, and all per-group work happens under that rule's own
//! lock, so unrelated rules never contend.

mod fields;
mod storm;
mod summary;
mod window;

pub use fields::{field_value, group_key, value_to_string, DEFAULT_GROUP};
pub use storm::StormDetector;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::clock::{SharedClock, SystemClock};
use crate::error::{Error, Result};
use crate::models::{GroupSummary, ThrottleConfig, ThrottleDecision, ThrottleSummary};

use window::GroupWindow;

/// Longest window we represent, keeps chrono arithmetic in range
const MAX_WINDOW_SECS: u64 = 100 * 365 * 24 * 3600;

/// Convert configured seconds to a window length
pub(crate) fn window_length(secs: u64) -> Duration {
    Duration::seconds(secs.min(MAX_WINDOW_SECS) as i64)
}

/// Build a [`ThrottleConfig`] from a loosely-typed map
/// (`{"maxAlerts": 5, "periodSeconds": 60.0, "groupByField": "iface"}`).
///
/// Numbers may be encoded as integers or floats; fractions are truncated
/// and negative values clamp to zero, which disables throttling.
pub fn parse_throttle_config(raw: &Value) -> Result<ThrottleConfig> {
    let map = raw
        .as_object()
        .ok_or_else(|| Error::validation("throttle config must be an object"))?;

    let number = |key: &str| {
        map.get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| Error::validation(format!("{key} is required and must be a number")))
    };

    let max_alerts = number("maxAlerts")?;
    let period_seconds = number("periodSeconds")?;

    Ok(ThrottleConfig {
        max_alerts: max_alerts.max(0.0) as u32,
        period_seconds: period_seconds.max(0.0) as u64,
        group_by_field: map
            .get("groupByField")
            .and_then(Value::as_str)
            .filter(|field| !field.is_empty())
            .map(String::from),
    })
}

/// Throttle state for a single rule
#[derive(Debug)]
struct RuleThrottleState {
    config: ThrottleConfig,
    groups: HashMap<String, GroupWindow>,
    last_sweep: DateTime<Utc>,
}

impl RuleThrottleState {
    fn new(config: &ThrottleConfig, now: DateTime<Utc>) -> Self {
        Self {
            config: config.clone(),
            groups: HashMap::new(),
            last_sweep: now,
        }
    }

    /// Forget groups with nothing in the window and nothing suppressed.
    ///
    /// Runs at most once per window; a dropped group is recreated empty on
    /// its next alert, which is indistinguishable from the state it had.
    fn sweep_idle_groups(&mut self, rule_id: &str, now: DateTime<Utc>, window: Duration) {
        if now - self.last_sweep < window {
            return;
        }

        let cutoff = now - window;
        let before = self.groups.len();
        self.groups.retain(|_, group| !group.is_idle(cutoff));
        self.last_sweep = now;

        let removed = before - self.groups.len();
        if removed > 0 {
            debug!(rule_id, removed, "Dropped idle throttle groups");
        }
    }

    fn summarize(&self, rule_id: &str, now: DateTime<Utc>) -> ThrottleSummary {
        let window = window_length(self.config.period_seconds);
        let window_start = now - window;

        let mut groups: Vec<GroupSummary> = self
            .groups
            .iter()
            .map(|(key, group)| {
                let (oldest_alert, newest_alert) = group.range_since(window_start);
                GroupSummary {
                    group: key.clone(),
                    allowed: group.count_since(window_start),
                    suppressed: group.suppressed(),
                    oldest_alert,
                    newest_alert,
                    window_start,
                }
            })
            .collect();
        groups.sort_by(|a, b| a.group.cmp(&b.group));

        ThrottleSummary {
            rule_id: rule_id.to_string(),
            max_alerts: self.config.max_alerts,
            period_seconds: self.config.period_seconds,
            total_allowed: groups.iter().map(|g| g.allowed).sum(),
            total_suppressed: groups.iter().map(|g| g.suppressed).sum(),
            groups,
            window_type: "sliding".to_string(),
        }
    }
}

/// Rate limiter for alert rules
pub struct ThrottleManager {
    rules: DashMap<String, Arc<RwLock<RuleThrottleState>>>,
    clock: SharedClock,
}

impl Default for ThrottleManager {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl ThrottleManager {
    /// Create a throttle manager reading time from `clock`
    pub fn new(clock: SharedClock) -> Self {
        Self {
            rules: DashMap::new(),
            clock,
        }
    }

    /// Fetch or create a rule's state; the map shard is released on return
    fn rule_state(
        &self,
        rule_id: &str,
        config: &ThrottleConfig,
        now: DateTime<Utc>,
    ) -> Arc<RwLock<RuleThrottleState>> {
        if let Some(state) = self.rules.get(rule_id) {
            return state.value().clone();
        }
        self.rules
            .entry(rule_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(RuleThrottleState::new(config, now))))
            .value()
            .clone()
    }

    fn existing(&self, rule_id: &str) -> Option<Arc<RwLock<RuleThrottleState>>> {
        self.rules.get(rule_id).map(|state| state.value().clone())
    }

    /// Clone out every rule entry so callers never hold shard locks
    fn snapshot(&self) -> Vec<(String, Arc<RwLock<RuleThrottleState>>)> {
        self.rules
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Decide whether an alert for `rule_id` may proceed.
    ///
    /// Never errors and never blocks on anything but the rule's own lock.
    pub fn should_allow(&self, rule_id: &str, event_fields: &Value, config: &ThrottleConfig) -> ThrottleDecision {
        if !config.is_enabled() {
            return ThrottleDecision::allow();
        }

        let group = group_key(config.group_by_field.as_deref(), event_fields);
        let now = self.clock.now();
        let state = self.rule_state(rule_id, config, now);
        let mut guard = state.write();
        let state = &mut *guard;

        if state.config != *config {
            state.config = config.clone();
        }

        let window = window_length(config.period_seconds);
        let capacity = config.max_alerts as usize;
        state.sweep_idle_groups(rule_id, now, window);

        let group_window = state
            .groups
            .entry(group)
            .or_insert_with_key(|key| {
                debug!(rule_id, group = %key, capacity, "Creating throttle group");
                GroupWindow::new(capacity, now)
            });

        if group_window.capacity() != capacity {
            group_window.resize(capacity);
        }

        group_window.compact(now, window);
        let in_window = group_window.count_since(now - window);

        if in_window < capacity {
            group_window.push(now);
            return ThrottleDecision::allow();
        }

        group_window.record_suppressed();
        debug!(
            rule_id,
            in_window,
            suppressed = group_window.suppressed(),
            "Alert throttled"
        );

        ThrottleDecision::deny(format!(
            "throttled (limit: {} per {} seconds, current: {})",
            config.max_alerts, config.period_seconds, in_window
        ))
    }

    /// Per-group allowed/suppressed counts for a rule, `None` if the rule has no state
    pub fn get_summary(&self, rule_id: &str) -> Option<ThrottleSummary> {
        let state = self.existing(rule_id)?;
        let now = self.clock.now();
        let summary = state.read().summarize(rule_id, now);
        Some(summary)
    }

    /// Drop all state for a rule
    pub fn reset(&self, rule_id: &str) {
        if self.rules.remove(rule_id).is_some() {
            debug!(rule_id, "Throttle state reset");
        }
    }

    /// Drop state for rules that are no longer active
    pub fn cleanup<S: AsRef<str>>(&self, active_rule_ids: &[S]) {
        let active: HashSet<&str> = active_rule_ids.iter().map(|id| id.as_ref()).collect();
        let before = self.rules.len();
        self.rules.retain(|rule_id, _| active.contains(rule_id.as_str()));

        let removed = before.saturating_sub(self.rules.len());
        if removed > 0 {
            debug!(removed, "Removed stale throttle state");
        }
    }

    /// Rules currently holding state
    pub fn rule_ids(&self) -> Vec<String> {
        self.rules.iter().map(|entry| entry.key().clone()).collect()
    }
}
