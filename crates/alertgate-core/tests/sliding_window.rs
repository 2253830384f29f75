//! Property tests for the per-group sliding window

use std::sync::Arc;

use alertgate::clock::{Clock, MockClock};
use alertgate::models::ThrottleConfig;
use alertgate::throttle::ThrottleManager;
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use serde_json::json;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
}

/// Replay alerts spaced by `gaps_ms`, returning (timestamp, allowed) per alert
fn replay(config: &ThrottleConfig, gaps_ms: &[u32]) -> Vec<(DateTime<Utc>, bool)> {
    let clock = Arc::new(MockClock::new(start()));
    let manager = ThrottleManager::new(clock.clone());
    let fields = json!({"device_id": "router-1"});

    gaps_ms
        .iter()
        .map(|gap| {
            clock.advance(Duration::milliseconds(i64::from(*gap)));
            (clock.now(), manager.should_allow("rule-1", &fields, config).allowed)
        })
        .collect()
}

proptest! {
    #[test]
    fn never_more_than_max_in_any_trailing_window(
        max_alerts in 1u32..6,
        period_seconds in 1u64..20,
        gaps_ms in prop::collection::vec(0u32..4_000, 1..200),
    ) {
        let config = ThrottleConfig::new(max_alerts, period_seconds);
        let period = Duration::seconds(period_seconds as i64);
        let outcomes = replay(&config, &gaps_ms);

        let allowed: Vec<DateTime<Utc>> = outcomes
            .iter()
            .filter(|(_, allowed)| *allowed)
            .map(|(ts, _)| *ts)
            .collect();

        for ts in &allowed {
            let in_window = allowed
                .iter()
                .filter(|other| **other > *ts - period && **other <= *ts)
                .count();
            prop_assert!(in_window <= max_alerts as usize);
        }
    }

    #[test]
    fn denied_only_when_window_is_full(
        max_alerts in 1u32..6,
        period_seconds in 1u64..20,
        gaps_ms in prop::collection::vec(0u32..4_000, 1..200),
    ) {
        let config = ThrottleConfig::new(max_alerts, period_seconds);
        let period = Duration::seconds(period_seconds as i64);
        let outcomes = replay(&config, &gaps_ms);

        let mut allowed_so_far: Vec<DateTime<Utc>> = Vec::new();
        for (ts, allowed) in outcomes {
            let in_window = allowed_so_far
                .iter()
                .filter(|other| **other > ts - period)
                .count();
            prop_assert_eq!(allowed, in_window < max_alerts as usize);
            if allowed {
                allowed_so_far.push(ts);
            }
        }
    }

    #[test]
    fn disabled_config_allows_everything(
        gaps_ms in prop::collection::vec(0u32..1_000, 1..50),
        zero_max in any::<bool>(),
    ) {
        let config = if zero_max {
            ThrottleConfig::new(0, 60)
        } else {
            ThrottleConfig::new(3, 0)
        };

        prop_assert!(replay(&config, &gaps_ms).iter().all(|(_, allowed)| *allowed));
    }
}
