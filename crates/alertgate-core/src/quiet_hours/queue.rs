//! Per-device holding queue and digest formatting

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

use parking_lot::RwLock;

use crate::models::{QueuedAlert, Severity};

/// Alerts held during quiet hours, keyed by device
#[derive(Debug, Default)]
pub struct AlertQueue {
    alerts: RwLock<HashMap<String, Vec<QueuedAlert>>>,
}

impl AlertQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an alert to its device's list
    pub fn enqueue(&self, alert: QueuedAlert) {
        self.alerts
            .write()
            .entry(alert.device_id.clone())
            .or_default()
            .push(alert);
    }

    /// Take every queued alert, leaving the queue empty.
    ///
    /// The swap happens under one write lock, so concurrent callers never
    /// observe the same batch twice.
    pub fn dequeue_all(&self) -> HashMap<String, Vec<QueuedAlert>> {
        std::mem::take(&mut *self.alerts.write())
    }

    /// Copy of a device's queued alerts
    pub fn get_by_device(&self, device_id: &str) -> Vec<QueuedAlert> {
        self.alerts
            .read()
            .get(device_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Total queued alerts across devices
    pub fn count(&self) -> usize {
        self.alerts.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn clear(&self) {
        self.alerts.write().clear();
    }
}

/// Render a plain-text digest of a device's queued alerts.
///
/// Severities appear most urgent first, each with its event types and
/// counts, followed by the time range covered. Returns an empty string for
/// no alerts.
pub fn format_digest(alerts: &[QueuedAlert], device_id: &str) -> String {
    let (Some(oldest), Some(newest)) = (
        alerts.iter().map(|a| a.timestamp).min(),
        alerts.iter().map(|a| a.timestamp).max(),
    ) else {
        return String::new();
    };

    let mut by_severity: HashMap<Severity, BTreeMap<&str, usize>> = HashMap::new();
    for alert in alerts {
        *by_severity
            .entry(alert.effective_severity())
            .or_default()
            .entry(alert.event_type.as_str())
            .or_default() += 1;
    }

    let mut digest = String::new();
    let _ = writeln!(digest, "Quiet Hours Digest for {device_id}");
    let _ = writeln!(digest, "Total Alerts: {}", alerts.len());
    digest.push('\n');

    for severity in Severity::PRIORITY_ORDER {
        let Some(event_types) = by_severity.get(&severity) else {
            continue;
        };

        let total: usize = event_types.values().sum();
        let _ = writeln!(digest, "{severity} ({total}):");
        for (event_type, count) in event_types {
            let _ = writeln!(digest, "  • {event_type}: {count}");
        }
        digest.push('\n');
    }

    let _ = writeln!(
        digest,
        "Period: {} to {}",
        oldest.format("%H:%M:%S"),
        newest.format("%H:%M:%S")
    );

    digest
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn alert(device: &str, event_type: &str, severity: Option<Severity>, at: DateTime<Utc>) -> QueuedAlert {
        QueuedAlert {
            rule_id: "rule-1".to_string(),
            event_type: event_type.to_string(),
            event_data: json!({}),
            severity,
            timestamp: at,
            device_id: device.to_string(),
        }
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 16, h, m, s).unwrap()
    }

    #[test]
    fn test_enqueue_and_inspect() {
        let queue = AlertQueue::new();
        queue.enqueue(alert("router-1", "cpu.high", Some(Severity::Warning), at(1, 0, 0)));
        queue.enqueue(alert("router-1", "cpu.high", Some(Severity::Warning), at(1, 5, 0)));
        queue.enqueue(alert("router-2", "link.down", Some(Severity::Error), at(1, 10, 0)));

        assert_eq!(queue.count(), 3);
        assert_eq!(queue.get_by_device("router-1").len(), 2);
        assert!(queue.get_by_device("router-9").is_empty());

        // inspection does not drain
        assert_eq!(queue.count(), 3);

        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_dequeue_all_drains() {
        let queue = AlertQueue::new();
        queue.enqueue(alert("router-1", "cpu.high", None, at(1, 0, 0)));
        queue.enqueue(alert("router-2", "cpu.high", None, at(1, 0, 0)));

        let batch = queue.dequeue_all();
        assert_eq!(batch.len(), 2);
        assert!(queue.is_empty());
        assert!(queue.dequeue_all().is_empty());
    }

    #[test]
    fn test_concurrent_dequeue_hands_off_once() {
        let queue = Arc::new(AlertQueue::new());
        for i in 0..10 {
            queue.enqueue(alert(&format!("router-{}", i % 3), "cpu.high", None, at(1, i, 0)));
        }

        let barrier = Arc::new(Barrier::new(3));
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let queue = queue.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    queue.dequeue_all()
                })
            })
            .collect();

        let batches: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let non_empty: Vec<_> = batches.iter().filter(|b| !b.is_empty()).collect();

        assert_eq!(non_empty.len(), 1);
        assert_eq!(non_empty[0].values().map(Vec::len).sum::<usize>(), 10);
        assert_eq!(queue.count(), 0);
    }

    #[test]
    fn test_digest_orders_by_severity() {
        let alerts = vec![
            alert("router-1", "dhcp.lease", Some(Severity::Info), at(2, 0, 0)),
            alert("router-1", "cpu.high", Some(Severity::Warning), at(0, 30, 15)),
            alert("router-1", "link.down", Some(Severity::Critical), at(3, 45, 0)),
            alert("router-1", "cpu.high", Some(Severity::Warning), at(1, 0, 0)),
            alert("router-1", "disk.usage", Some(Severity::Warning), at(1, 30, 0)),
            alert("router-1", "vpn.reconnect", None, at(2, 30, 0)),
        ];

        let digest = format_digest(&alerts, "router-1");

        assert_eq!(
            digest,
            "Quiet Hours Digest for router-1\n\
             Total Alerts: 6\n\
             \n\
             CRITICAL (1):\n  \
             • link.down: 1\n\
             \n\
             WARNING (3):\n  \
             • cpu.high: 2\n  \
             • disk.usage: 1\n\
             \n\
             INFO (2):\n  \
             • dhcp.lease: 1\n  \
             • vpn.reconnect: 1\n\
             \n\
             Period: 00:30:15 to 03:45:00\n"
        );
    }

    #[test]
    fn test_digest_severity_order_ignores_insertion_order() {
        let alerts = vec![
            alert("r", "a", Some(Severity::Info), at(1, 0, 0)),
            alert("r", "b", Some(Severity::Error), at(1, 0, 0)),
            alert("r", "c", Some(Severity::Critical), at(1, 0, 0)),
        ];

        let digest = format_digest(&alerts, "r");
        let critical = digest.find("CRITICAL").unwrap();
        let error = digest.find("ERROR").unwrap();
        let info = digest.find("INFO").unwrap();

        assert!(critical < error && error < info);
        assert!(!digest.contains("WARNING"));
    }

    #[test]
    fn test_empty_digest() {
        assert_eq!(format_digest(&[], "router-1"), "");
    }
}
