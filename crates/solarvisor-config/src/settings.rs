//! Validated settings structures

use serde_json::json;
use solarvisor_util::{DailyWindow, DEFAULT_WORKLOAD_LOG};
use std::path::PathBuf;
use std::time::Duration;

use crate::nominal::Nominal;
use crate::schema::RawConfig;
use crate::validation::{parse_failsafe_window, resolve_thresholds, ValidationError};

/// Field of the sensor payload that carries the battery voltage
pub const DEFAULT_VOLTAGE_FIELD: &str = "Output Voltage";

/// Sensor endpoint used when none is configured
pub const DEFAULT_SENSOR_URL: &str = "http://192.168.2.201/theblackboxproject/htdocs/real.php";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_SENSOR_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_STOPS_PER_DAY: u32 = 1;

/// Waits used by the graceful-then-forced termination sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopTimings {
    /// Wait after SIGTERM before rechecking liveness
    pub grace: Duration,
    /// Wait after SIGKILL before the final liveness check
    pub kill_wait: Duration,
}

impl Default for StopTimings {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(3),
            kill_wait: Duration::from_secs(1),
        }
    }
}

/// Voltage sensor endpoint settings
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSettings {
    pub url: String,
    pub voltage_field: String,
    pub timeout: Duration,
}

/// Fully validated settings, immutable for the life of the process
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub load_command: String,
    pub log_path: PathBuf,
    pub log_append: bool,
    pub nominal: Nominal,
    pub volts_min: f64,
    pub volts_start_min: f64,
    pub failsafe_window: DailyWindow,
    pub max_stops_per_day: u32,
    pub force_start: bool,
    pub poll_interval: Duration,
    pub stop_timings: StopTimings,
    pub sensor: SensorSettings,
}

impl Settings {
    /// Validate and convert a raw config, collecting every problem found
    pub fn from_raw(raw: RawConfig) -> Result<Self, Vec<ValidationError>> {
        let mut errors = Vec::new();

        let load_command = match raw.load_cmd.as_deref().map(str::trim) {
            Some(cmd) if !cmd.is_empty() => Some(cmd.to_string()),
            _ => {
                errors.push(ValidationError::MissingLoadCommand);
                None
            }
        };

        let thresholds = resolve_thresholds(&raw)
            .map_err(|e| errors.extend(e))
            .ok();

        let failsafe_window = parse_failsafe_window(&raw.failsafe_window)
            .map_err(|e| errors.extend(e))
            .ok();

        let poll_interval = positive_seconds(
            "poll_interval_seconds",
            raw.poll_interval_seconds,
            DEFAULT_POLL_INTERVAL,
            &mut errors,
        );
        let sensor_timeout = positive_seconds(
            "sensor.timeout_seconds",
            raw.sensor.timeout_seconds,
            DEFAULT_SENSOR_TIMEOUT,
            &mut errors,
        );

        let sensor_url = raw
            .sensor
            .url
            .unwrap_or_else(|| DEFAULT_SENSOR_URL.to_string());
        if sensor_url.trim().is_empty() {
            errors.push(ValidationError::InvalidValue {
                field: "sensor.url",
                message: "cannot be empty".into(),
            });
        }

        let voltage_field = raw
            .sensor
            .voltage_field
            .unwrap_or_else(|| DEFAULT_VOLTAGE_FIELD.to_string());
        if voltage_field.is_empty() {
            errors.push(ValidationError::InvalidValue {
                field: "sensor.voltage_field",
                message: "cannot be empty".into(),
            });
        }

        let defaults = StopTimings::default();
        let stop_timings = StopTimings {
            grace: raw.stop.grace_seconds.map(Duration::from_secs).unwrap_or(defaults.grace),
            kill_wait: raw
                .stop
                .kill_wait_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.kill_wait),
        };

        match (load_command, thresholds, failsafe_window) {
            (Some(load_command), Some(thresholds), Some(failsafe_window)) if errors.is_empty() => {
                Ok(Self {
                    load_command,
                    log_path: raw
                        .log_file
                        .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKLOAD_LOG)),
                    log_append: raw.log_append,
                    nominal: thresholds.nominal,
                    volts_min: thresholds.volts_min,
                    volts_start_min: thresholds.volts_start_min,
                    failsafe_window,
                    max_stops_per_day: raw.max_stops_per_day.unwrap_or(DEFAULT_MAX_STOPS_PER_DAY),
                    force_start: raw.force_start,
                    poll_interval,
                    stop_timings,
                    sensor: SensorSettings {
                        url: sensor_url,
                        voltage_field,
                        timeout: sensor_timeout,
                    },
                })
            }
            _ => Err(errors),
        }
    }

    /// Settings as shown in the startup banner
    pub fn banner_json(&self) -> serde_json::Value {
        json!({
            "load-cmd": self.load_command,
            "log-file": self.log_path.display().to_string(),
            "log-append": self.log_append,
            "force-start": self.force_start,
            "nominal": self.nominal,
            "volts-min": self.volts_min,
            "volts-start-min": self.volts_start_min,
            "failsafe-window-starttime": self.failsafe_window.start,
            "failsafe-window-stoptime": self.failsafe_window.stop,
            "max-stops-per-day": self.max_stops_per_day,
            "poll-interval-seconds": self.poll_interval.as_secs(),
            "sensor-url": self.sensor.url,
            "voltage-field": self.sensor.voltage_field,
        })
    }
}

fn positive_seconds(
    field: &'static str,
    value: Option<u64>,
    default: Duration,
    errors: &mut Vec<ValidationError>,
) -> Duration {
    match value {
        Some(0) => {
            errors.push(ValidationError::InvalidValue {
                field,
                message: "must be greater than zero".into(),
            });
            default
        }
        Some(secs) => Duration::from_secs(secs),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solarvisor_util::WallClock;

    #[test]
    fn minimal_config_takes_defaults() {
        let settings = Settings::from_raw(RawConfig {
            load_cmd: Some("  miner  ".into()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(settings.load_command, "miner");
        assert_eq!(settings.log_path, PathBuf::from("/dev/null"));
        assert!(!settings.log_append);
        assert_eq!(settings.nominal, Nominal::Volts(48));
        assert_eq!(settings.volts_min, 51.0);
        assert_eq!(settings.volts_start_min, 53.0);
        assert_eq!(settings.failsafe_window.start, WallClock::new(9, 0).unwrap());
        assert_eq!(settings.failsafe_window.stop, WallClock::new(19, 0).unwrap());
        assert_eq!(settings.max_stops_per_day, 1);
        assert!(!settings.force_start);
        assert_eq!(settings.poll_interval, Duration::from_secs(60));
        assert_eq!(settings.stop_timings, StopTimings::default());
        assert_eq!(settings.sensor.voltage_field, "Output Voltage");
    }

    #[test]
    fn max_stops_may_be_zero() {
        let settings = Settings::from_raw(RawConfig {
            load_cmd: Some("miner".into()),
            max_stops_per_day: Some(0),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(settings.max_stops_per_day, 0);
    }

    #[test]
    fn banner_uses_readable_values() {
        let settings = Settings::from_raw(RawConfig {
            load_cmd: Some("miner".into()),
            ..Default::default()
        })
        .unwrap();

        let banner = settings.banner_json();
        assert_eq!(banner["load-cmd"], "miner");
        assert_eq!(banner["nominal"], "48");
        assert_eq!(banner["failsafe-window-starttime"], "09:00");
        assert_eq!(banner["volts-min"], 51.0);
    }
}
