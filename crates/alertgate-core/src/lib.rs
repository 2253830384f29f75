//! # AlertGate
//!
//! Admission control for alert pipelines.
//!
//! Given an alert that has already fired, AlertGate decides whether it is
//! delivered now, dropped, or held back for a later digest.
//!
//! ## Architecture
//!
//! - **Storm detection**: a global circuit breaker that trips when alert
//!   volume exceeds a threshold and stays open for a cooldown
//! - **Throttling**: per-rule, per-group sliding-window rate limits over
//!   fixed-capacity circular buffers
//! - **Quiet hours**: timezone-aware daily windows that defer non-critical
//!   alerts into per-device digests and per-channel TTL queues
//! - **Admission**: the three gates composed in order
//!
//! ## Quick Start
//!
//! ```bash
//! # Check whether quiet hours apply at a given instant
//! alertgate check-quiet-hours --at 2024-01-16T23:30:00Z --severity warning
//!
//! # Replay a burst of alerts through every gate
//! alertgate simulate --events 500 --rule cpu-high --spacing-ms 100
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

pub mod alerting;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod quiet_hours;
pub mod throttle;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{Admission, AdmissionController, EventPublisher, NotificationDelivery};
    pub use crate::clock::{Clock, MockClock, SharedClock, SystemClock};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::quiet_hours::{AlertQueue, QuietHoursQueueManager};
    pub use crate::throttle::{StormDetector, ThrottleManager};
}
