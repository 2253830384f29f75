//! Quiet hours configuration

use serde::{Deserialize, Serialize};

/// Daily window during which non-critical alerts are deferred
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuietHoursConfig {
    /// Window start, "HH:MM" (e.g. "22:00")
    pub start_time: String,

    /// Window end, "HH:MM" (e.g. "07:00"), exclusive
    pub end_time: String,

    /// IANA timezone (e.g. "America/New_York")
    pub timezone: String,

    /// Whether CRITICAL alerts bypass quiet hours
    pub bypass_critical: bool,

    /// Days the window applies, 0 = Sunday .. 6 = Saturday; empty means every day
    #[serde(default)]
    pub days_of_week: Vec<u8>,
}

impl Default for QuietHoursConfig {
    fn default() -> Self {
        Self {
            start_time: String::new(),
            end_time: String::new(),
            timezone: "UTC".to_string(),
            bypass_critical: true,
            days_of_week: Vec::new(),
        }
    }
}

impl QuietHoursConfig {
    /// A config with no window never suppresses
    pub fn is_configured(&self) -> bool {
        !self.start_time.is_empty() && !self.end_time.is_empty()
    }
}
