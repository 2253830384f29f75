//! Quiet hours: time-window suppression, holding queues and digests

mod filter;
mod manager;
mod queue;

pub use filter::{
    next_delivery_time, parse_minute_of_day, parse_quiet_hours_config, resolve_timezone,
    should_suppress, QuietHoursDecision,
};
pub use manager::{
    QueueManagerOptions, QuietHoursQueueManager, DEFAULT_DELIVERY_TIMEOUT, DEFAULT_MAX_QUEUE_SIZE,
    DEFAULT_TICK_INTERVAL,
};
pub use queue::{format_digest, AlertQueue};
