//! Quiet hours evaluation and config parsing
//!
//! [`should_suppress`] is a pure function of its inputs. It never fails:
//! an unknown timezone falls back to UTC and an unparseable window simply
//! does not suppress. Validation happens up front in
//! [`parse_quiet_hours_config`].

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{QuietHoursConfig, Severity};

/// Furthest we look past a DST gap for the first valid local time
const MAX_GAP_MINUTES: i64 = 3 * 60;

/// Outcome of a quiet hours check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuietHoursDecision {
    pub suppress: bool,
    pub reason: Option<String>,
}

impl QuietHoursDecision {
    fn pass(reason: Option<String>) -> Self {
        Self {
            suppress: false,
            reason,
        }
    }
}

/// Resolve an IANA zone name, falling back to UTC
pub fn resolve_timezone(name: &str) -> Tz {
    name.parse::<Tz>().unwrap_or(Tz::UTC)
}

fn minute_of_day(value: &str) -> std::result::Result<u32, String> {
    let invalid = || format!("invalid time format '{value}' (expected HH:MM)");

    let (hour, minute) = value.trim().split_once(':').ok_or_else(invalid)?;
    let is_field = |s: &str| (1..=2).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit());
    if !is_field(hour) || !is_field(minute) {
        return Err(invalid());
    }

    let hour: u32 = hour.parse().map_err(|_| invalid())?;
    let minute: u32 = minute.parse().map_err(|_| invalid())?;
    if hour > 23 || minute > 59 {
        return Err(format!("invalid time values: {hour:02}:{minute:02}"));
    }

    Ok(hour * 60 + minute)
}

/// Parse `H:MM` / `HH:MM` into minutes past midnight
pub fn parse_minute_of_day(value: &str) -> Result<u32> {
    minute_of_day(value).map_err(Error::Validation)
}

/// Whether `now` falls in `[start, end)`, wrapping past midnight when `start > end`
fn in_window(now: u32, start: u32, end: u32) -> bool {
    if start <= end {
        now >= start && now < end
    } else {
        now >= start || now < end
    }
}

/// Decide whether an alert of `severity` is held back at `now`
pub fn should_suppress(
    config: &QuietHoursConfig,
    severity: Severity,
    now: DateTime<Utc>,
) -> QuietHoursDecision {
    if !config.is_configured() {
        return QuietHoursDecision::pass(None);
    }

    if config.bypass_critical && severity == Severity::Critical {
        return QuietHoursDecision::pass(Some("critical bypasses quiet hours".to_string()));
    }

    let local = now.with_timezone(&resolve_timezone(&config.timezone));

    if !config.days_of_week.is_empty() {
        let today = local.weekday().num_days_from_sunday() as u8;
        if !config.days_of_week.contains(&today) {
            return QuietHoursDecision::pass(Some(format!(
                "quiet hours not active on {}",
                local.format("%A")
            )));
        }
    }

    let start = match minute_of_day(&config.start_time) {
        Ok(minutes) => minutes,
        Err(e) => return QuietHoursDecision::pass(Some(format!("invalid start time: {e}"))),
    };
    let end = match minute_of_day(&config.end_time) {
        Ok(minutes) => minutes,
        Err(e) => return QuietHoursDecision::pass(Some(format!("invalid end time: {e}"))),
    };

    let current = local.hour() * 60 + local.minute();
    if in_window(current, start, end) {
        return QuietHoursDecision {
            suppress: true,
            reason: Some(format!(
                "quiet hours active ({}-{} {})",
                config.start_time, config.end_time, config.timezone
            )),
        };
    }

    QuietHoursDecision::pass(None)
}

/// First valid instant at or after a local wall-clock time
fn resolve_local(tz: Tz, naive: NaiveDateTime) -> Result<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(instant) => Ok(instant),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => (1..=MAX_GAP_MINUTES)
            .find_map(|m| tz.from_local_datetime(&(naive + Duration::minutes(m))).earliest())
            .ok_or_else(|| Error::validation(format!("no valid local time near {naive} in {}", tz.name()))),
    }
}

/// When the current (or next) quiet window ends: today's end time, or
/// 24 hours later if that is already past
pub fn next_delivery_time(config: &QuietHoursConfig, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let tz = resolve_timezone(&config.timezone);
    let end = parse_minute_of_day(&config.end_time)?;

    let local_now = now.with_timezone(&tz);
    let naive_end = local_now
        .date_naive()
        .and_hms_opt(end / 60, end % 60, 0)
        .ok_or_else(|| Error::validation(format!("invalid end time '{}'", config.end_time)))?;

    let end_today = resolve_local(tz, naive_end)?.with_timezone(&Utc);
    if end_today < now {
        return Ok(end_today + Duration::hours(24));
    }
    Ok(end_today)
}

/// Build a validated [`QuietHoursConfig`] from a loosely-typed map.
///
/// `startTime`/`endTime` are required; `timezone` defaults to UTC and
/// `bypassCritical` to true. `daysOfWeek` accepts integer or float
/// encodings in `0..=6`.
pub fn parse_quiet_hours_config(raw: &Value) -> Result<QuietHoursConfig> {
    let map = raw
        .as_object()
        .ok_or_else(|| Error::validation("quiet hours config must be an object"))?;

    let required = |key: &str| {
        map.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .ok_or_else(|| Error::validation(format!("{key} is required")))
    };

    let mut config = QuietHoursConfig {
        start_time: required("startTime")?,
        end_time: required("endTime")?,
        ..QuietHoursConfig::default()
    };

    if let Some(tz) = map.get("timezone").and_then(Value::as_str).filter(|s| !s.is_empty()) {
        config.timezone = tz.to_string();
    }

    if let Some(bypass) = map.get("bypassCritical").and_then(Value::as_bool) {
        config.bypass_critical = bypass;
    }

    match map.get("daysOfWeek") {
        None | Some(Value::Null) => {}
        Some(Value::Array(days)) => {
            config.days_of_week = days
                .iter()
                .enumerate()
                .map(|(i, day)| parse_day(i, day))
                .collect::<Result<_>>()?;
        }
        Some(_) => return Err(Error::validation("daysOfWeek must be an array of integers")),
    }

    if config.timezone.parse::<Tz>().is_err() {
        return Err(Error::InvalidTimezone {
            timezone: config.timezone,
        });
    }

    minute_of_day(&config.start_time)
        .map_err(|e| Error::validation(format!("invalid startTime: {e}")))?;
    minute_of_day(&config.end_time)
        .map_err(|e| Error::validation(format!("invalid endTime: {e}")))?;

    Ok(config)
}

fn parse_day(index: usize, value: &Value) -> Result<u8> {
    let day = value
        .as_f64()
        .ok_or_else(|| Error::validation(format!("daysOfWeek[{index}] must be an integer (0-6)")))?
        .trunc();

    if !(0.0..=6.0).contains(&day) {
        return Err(Error::validation(format!(
            "daysOfWeek[{index}] must be between 0 (Sunday) and 6 (Saturday), got {day}"
        )));
    }
    Ok(day as u8)
}
