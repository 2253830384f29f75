//! Fixed-capacity circular timestamp buffer backing the sliding window
//!
//! One buffer exists per (rule, group). It is allocated once with
//! `capacity == max_alerts` slots; `head` is the next write slot and only
//! the `size` most recent logical slots hold valid timestamps. Because an
//! alert is only recorded while fewer than `max_alerts` timestamps are in
//! the window, the buffer never needs more slots than the limit itself.

use chrono::{DateTime, Duration, Utc};

/// Sliding-window state for a single throttle group
#[derive(Debug, Clone)]
pub(crate) struct GroupWindow {
    timestamps: Vec<DateTime<Utc>>,
    head: usize,
    size: usize,
    suppressed: u64,
    last_cleanup: DateTime<Utc>,
}

impl GroupWindow {
    /// Preallocate a window for `capacity` alerts
    pub(crate) fn new(capacity: usize, now: DateTime<Utc>) -> Self {
        let capacity = capacity.max(1);
        Self {
            timestamps: vec![DateTime::<Utc>::MIN_UTC; capacity],
            head: 0,
            size: 0,
            suppressed: 0,
            last_cleanup: now,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.timestamps.len()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.size
    }

    pub(crate) fn suppressed(&self) -> u64 {
        self.suppressed
    }

    pub(crate) fn record_suppressed(&mut self) {
        self.suppressed += 1;
    }

    pub(crate) fn reset_suppressed(&mut self) {
        self.suppressed = 0;
    }

    /// Subtract suppressions that have been reported elsewhere
    pub(crate) fn release_suppressed(&mut self, reported: u64) {
        self.suppressed = self.suppressed.saturating_sub(reported);
    }

    /// Physical index of the oldest valid slot
    fn start(&self) -> usize {
        (self.head + self.capacity() - self.size) % self.capacity()
    }

    /// Valid timestamps, oldest first
    pub(crate) fn iter(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        let start = self.start();
        let capacity = self.capacity();
        (0..self.size).map(move |i| self.timestamps[(start + i) % capacity])
    }

    /// Entries strictly newer than `cutoff`
    pub(crate) fn count_since(&self, cutoff: DateTime<Utc>) -> usize {
        self.iter().filter(|ts| *ts > cutoff).count()
    }

    /// No entries newer than `cutoff` and no unreported suppressions
    pub(crate) fn is_idle(&self, cutoff: DateTime<Utc>) -> bool {
        self.suppressed == 0 && self.count_since(cutoff) == 0
    }

    /// Oldest and newest entries strictly newer than `cutoff`
    pub(crate) fn range_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        self.iter()
            .filter(|ts| *ts > cutoff)
            .fold((None, None), |(oldest, newest), ts| {
                (
                    Some(oldest.map_or(ts, |o: DateTime<Utc>| o.min(ts))),
                    Some(newest.map_or(ts, |n: DateTime<Utc>| n.max(ts))),
                )
            })
    }

    /// Record an alert, overwriting the oldest slot when full
    pub(crate) fn push(&mut self, ts: DateTime<Utc>) {
        let capacity = self.capacity();
        self.timestamps[self.head] = ts;
        self.head = (self.head + 1) % capacity;
        if self.size < capacity {
            self.size += 1;
        }
    }

    /// Repack the buffer, discarding entries that left the window.
    ///
    /// Runs at most once per half window so the common path stays a
    /// bounded scan without any shuffling.
    pub(crate) fn compact(&mut self, now: DateTime<Utc>, window: Duration) {
        if now - self.last_cleanup < window / 2 {
            return;
        }

        let cutoff = now - window;
        let capacity = self.capacity();
        let start = self.start();
        let mut kept = 0;

        for i in 0..self.size {
            let ts = self.timestamps[(start + i) % capacity];
            if ts > cutoff {
                self.timestamps[(start + kept) % capacity] = ts;
                kept += 1;
            }
        }

        self.size = kept;
        self.head = (start + kept) % capacity;
        self.last_cleanup = now;
    }

    /// Change capacity, keeping the most recent entries that still fit
    pub(crate) fn resize(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        if capacity == self.capacity() {
            return;
        }

        let recent: Vec<_> = self.iter().collect();
        let keep_from = recent.len().saturating_sub(capacity);

        let mut timestamps = vec![DateTime::<Utc>::MIN_UTC; capacity];
        let mut size = 0;
        for ts in &recent[keep_from..] {
            timestamps[size] = *ts;
            size += 1;
        }

        self.timestamps = timestamps;
        self.size = size;
        self.head = size % capacity;
    }
}
