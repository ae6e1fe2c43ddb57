//! Time utilities for solarvisor
//!
//! Provides wall-clock time for the failsafe window and the daily stop
//! counter. Both read the same local `now()` so the window check and the
//! day rollover can never disagree about the timezone.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `SOLARVISOR_MOCK_TIME` environment variable can be set
//! to override the system time. This is useful for exercising the failsafe
//! window and the midnight rollover without waiting for them.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-12-25 18:59:00`)
//!
//! Example:
//! ```bash
//! SOLARVISOR_MOCK_TIME="2025-12-25 18:59:00" solarvisord --load-cmd "sleep 1000"
//! ```

use chrono::{DateTime, Local, NaiveTime, Timelike};
#[cfg(debug_assertions)]
use chrono::{NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "SOLARVISOR_MOCK_TIME";

/// Format accepted by [`MOCK_TIME_ENV_VAR`]
pub const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Offset between mock time and real time, computed once at first use.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)] // This is the internal implementation that wraps Local::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            let mock_time_str = std::env::var(MOCK_TIME_ENV_VAR).ok()?;
            let Ok(naive_dt) = NaiveDateTime::parse_from_str(&mock_time_str, MOCK_TIME_FORMAT)
            else {
                tracing::warn!(
                    mock_time = %mock_time_str,
                    expected_format = MOCK_TIME_FORMAT,
                    "Invalid mock time format"
                );
                return None;
            };

            let Some(mock_dt) = Local.from_local_datetime(&naive_dt).single() else {
                tracing::warn!(
                    mock_time = %mock_time_str,
                    "Failed to convert mock time to local timezone"
                );
                return None;
            };

            let offset = mock_dt.signed_duration_since(chrono::Local::now());
            tracing::info!(
                mock_time = %mock_time_str,
                offset_secs = offset.num_seconds(),
                "Mock time enabled"
            );
            Some(offset)
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Get the current local time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // This is the wrapper that provides mock time support
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();

    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// Format a DateTime for log lines and the startup banner.
pub fn format_datetime_full(dt: &DateTime<Local>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// A time of day with minute resolution, written as `H:MM` or `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WallClock {
    hour: u8,
    minute: u8,
}

impl WallClock {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    pub fn from_naive_time(time: NaiveTime) -> Self {
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }
}

/// Error returned when a `WallClock` string does not parse
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time of day '{value}': {reason}")]
pub struct ParseWallClockError {
    pub value: String,
    pub reason: &'static str,
}

impl FromStr for WallClock {
    type Err = ParseWallClockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason| ParseWallClockError {
            value: s.to_string(),
            reason,
        };

        let (hour, minute) = s.trim().split_once(':').ok_or(err("expected HH:MM format"))?;
        let hour: u8 = hour.parse().map_err(|_| err("invalid hour"))?;
        let minute: u8 = minute.parse().map_err(|_| err("invalid minute"))?;

        if hour >= 24 {
            return Err(err("hour must be 0-23"));
        }
        if minute >= 60 {
            return Err(err("minute must be 0-59"));
        }

        Ok(Self { hour, minute })
    }
}

impl TryFrom<String> for WallClock {
    type Error = ParseWallClockError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WallClock> for String {
    fn from(value: WallClock) -> Self {
        value.to_string()
    }
}

impl fmt::Display for WallClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// A half-open time-of-day interval `[start, stop)` that repeats every day.
///
/// When `start > stop` the window wraps past midnight (e.g. 22:00 - 02:00).
/// When `start == stop` the window is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyWindow {
    pub start: WallClock,
    pub stop: WallClock,
}

impl DailyWindow {
    pub fn new(start: WallClock, stop: WallClock) -> Self {
        Self { start, stop }
    }

    /// Check if the given local datetime falls within this window
    pub fn contains(&self, dt: &DateTime<Local>) -> bool {
        self.contains_time(dt.time())
    }

    pub fn contains_time(&self, time: NaiveTime) -> bool {
        let time = WallClock::from_naive_time(time);

        if self.start <= self.stop {
            time >= self.start && time < self.stop
        } else {
            time >= self.start || time < self.stop
        }
    }

    /// True when the window never contains any time of day
    pub fn is_empty(&self) -> bool {
        self.start == self.stop
    }
}

impl fmt::Display for DailyWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.stop)
    }
}
