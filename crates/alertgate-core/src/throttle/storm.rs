//! Global alert storm detection
//!
//! A single sliding-window counter shared by every rule. Once more than
//! `threshold` alerts land inside the window the detector enters storm
//! mode and denies everything until `cooldown_seconds` after the storm
//! started. The alert that crosses the threshold is itself denied.
//!
//! ```text
//! Normal --(count > threshold)--> Storm --(now >= start + cooldown)--> Normal
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::clock::{SharedClock, SystemClock};
use crate::models::{StormConfig, StormStatus};

use super::window_length;

#[derive(Debug, Default)]
struct StormState {
    /// Arrival order, oldest at the front
    timestamps: VecDeque<DateTime<Utc>>,
    in_storm: bool,
    storm_start: Option<DateTime<Utc>>,
    suppressed: u64,
}

impl StormState {
    fn prune(&mut self, window_start: DateTime<Utc>) {
        while self
            .timestamps
            .front()
            .is_some_and(|ts| *ts <= window_start)
        {
            self.timestamps.pop_front();
        }
    }
}

/// Upper bound on the preallocated timestamp buffer
const INITIAL_CAPACITY_LIMIT: usize = 1024;

/// Circuit breaker for alert storms
pub struct StormDetector {
    config: StormConfig,
    clock: SharedClock,
    state: RwLock<StormState>,
}

impl StormDetector {
    /// Create a detector with an explicit clock
    pub fn new(config: StormConfig, clock: SharedClock) -> Self {
        let state = StormState {
            timestamps: VecDeque::with_capacity(config.threshold.min(INITIAL_CAPACITY_LIMIT)),
            ..StormState::default()
        };

        Self {
            config,
            clock,
            state: RwLock::new(state),
        }
    }

    /// Create a detector on the system clock
    pub fn with_system_clock(config: StormConfig) -> Self {
        Self::new(config, Arc::new(SystemClock))
    }

    pub fn config(&self) -> &StormConfig {
        &self.config
    }

    /// Record an alert and report whether it may proceed
    pub fn record_alert(&self) -> bool {
        let mut state = self.state.write();
        let now = self.clock.now();
        state.prune(now - window_length(self.config.window_seconds));

        if state.in_storm {
            let cooldown_end = state
                .storm_start
                .map(|start| start + window_length(self.config.cooldown_seconds));

            if cooldown_end.is_some_and(|end| now < end) {
                state.suppressed += 1;
                return false;
            }

            info!(suppressed = state.suppressed, "Alert storm ended");
            state.in_storm = false;
            state.storm_start = None;
            state.suppressed = 0;
        }

        state.timestamps.push_back(now);

        if state.timestamps.len() > self.config.threshold {
            if !state.in_storm {
                warn!(
                    count = state.timestamps.len(),
                    threshold = self.config.threshold,
                    window_seconds = self.config.window_seconds,
                    "Alert storm detected, suppressing alerts"
                );
                state.in_storm = true;
                state.storm_start = Some(now);
                state.suppressed = 0;
            }
            return false;
        }

        true
    }

    /// Current detector state; never mutates
    pub fn get_status(&self) -> StormStatus {
        let state = self.state.read();
        let now = self.clock.now();
        let window_start = now - window_length(self.config.window_seconds);

        let in_window = state.timestamps.iter().filter(|ts| **ts > window_start).count();
        let window_minutes = self.config.window_seconds as f64 / 60.0;
        let (current_rate, threshold_rate) = if window_minutes > 0.0 {
            (
                in_window as f64 / window_minutes,
                self.config.threshold as f64 / window_minutes,
            )
        } else {
            (0.0, 0.0)
        };

        let cooldown_remaining = match (state.in_storm, state.storm_start) {
            (true, Some(start)) => (start + window_length(self.config.cooldown_seconds) - now)
                .to_std()
                .unwrap_or_default(),
            _ => std::time::Duration::ZERO,
        };

        StormStatus {
            in_storm: state.in_storm,
            storm_start_time: state.storm_start,
            suppressed_count: state.suppressed,
            current_rate,
            threshold_rate,
            cooldown_remaining,
        }
    }

    /// Clear all state and leave storm mode
    pub fn reset(&self) {
        let mut state = self.state.write();
        state.timestamps.clear();
        state.in_storm = false;
        state.storm_start = None;
        state.suppressed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use chrono::TimeZone;
    use std::thread;

    fn detector(threshold: usize, window: u64, cooldown: u64) -> (Arc<MockClock>, StormDetector) {
        let clock = Arc::new(MockClock::new(
            Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap(),
        ));
        let config = StormConfig {
            threshold,
            window_seconds: window,
            cooldown_seconds: cooldown,
        };
        (clock.clone(), StormDetector::new(config, clock))
    }

    #[test]
    fn test_below_threshold_allows_everything() {
        let (_clock, sd) = detector(100, 60, 300);

        for _ in 0..50 {
            assert!(sd.record_alert());
        }

        let status = sd.get_status();
        assert!(!status.in_storm);
        assert_eq!(status.suppressed_count, 0);
    }

    #[test]
    fn test_huge_threshold_does_not_preallocate() {
        let (_clock, sd) = detector(usize::MAX / 2, 60, 300);

        assert!(sd.record_alert());
        assert!(!sd.get_status().in_storm);
    }

    #[test]
    fn test_crossing_alert_is_denied() {
        let (_clock, sd) = detector(100, 60, 300);

        for _ in 0..100 {
            assert!(sd.record_alert());
        }
        assert!(!sd.record_alert());

        let status = sd.get_status();
        assert!(status.in_storm);
        assert!(status.storm_start_time.is_some());
        assert_eq!(status.suppressed_count, 0);
    }

    #[test]
    fn test_storm_cooldown_lifecycle() {
        let (clock, sd) = detector(10, 60, 120);

        // 11 alerts over the first 11 seconds; the 11th trips the storm
        for i in 0..11 {
            let allowed = sd.record_alert();
            assert_eq!(allowed, i < 10, "alert {i}");
            if i < 10 {
                clock.advance_secs(1);
            }
        }
        assert!(sd.get_status().in_storm);

        // storm started at t=10; cooldown runs until t=130
        clock.advance_secs(50);
        assert!(!sd.record_alert());
        clock.advance_secs(60);
        assert!(!sd.record_alert());
        assert_eq!(sd.get_status().suppressed_count, 2);

        clock.advance_secs(12);
        assert!(sd.record_alert());

        let status = sd.get_status();
        assert!(!status.in_storm);
        assert_eq!(status.suppressed_count, 0);
        assert_eq!(status.storm_start_time, None);
    }

    #[test]
    fn test_window_slides() {
        let (clock, sd) = detector(10, 60, 300);

        for _ in 0..10 {
            assert!(sd.record_alert());
        }

        clock.advance_secs(61);
        assert!(sd.record_alert());
        assert!(!sd.get_status().in_storm);
    }

    #[test]
    fn test_rates_and_cooldown_remaining() {
        let (clock, sd) = detector(5, 120, 60);

        for _ in 0..6 {
            sd.record_alert();
        }
        clock.advance_secs(15);

        let status = sd.get_status();
        assert!((status.current_rate - 3.0).abs() < f64::EPSILON);
        assert!((status.threshold_rate - 2.5).abs() < f64::EPSILON);
        assert_eq!(status.cooldown_remaining, std::time::Duration::from_secs(45));
    }

    #[test]
    fn test_reset_leaves_storm_mode() {
        let (_clock, sd) = detector(3, 60, 300);

        for _ in 0..5 {
            sd.record_alert();
        }
        assert!(sd.get_status().in_storm);

        sd.reset();
        let status = sd.get_status();
        assert!(!status.in_storm);
        assert_eq!(status.current_rate, 0.0);
        assert!(sd.record_alert());
    }

    #[test]
    fn test_concurrent_recording_counts_every_alert() {
        let (_clock, sd) = detector(50, 60, 300);
        let sd = Arc::new(sd);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let sd = sd.clone();
                thread::spawn(move || (0..25).filter(|_| sd.record_alert()).count())
            })
            .collect();

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 50);

        let status = sd.get_status();
        assert!(status.in_storm);
        assert_eq!(status.suppressed_count, 49);
    }
}
