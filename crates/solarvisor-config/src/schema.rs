//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::CURRENT_CONFIG_VERSION;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Shell command that starts the workload
    pub load_cmd: Option<String>,

    /// Where the workload's stdout/stderr go (default: /dev/null)
    pub log_file: Option<PathBuf>,

    /// Append to the log file instead of truncating it on each start
    #[serde(default)]
    pub log_append: bool,

    /// Start the workload on the first tick regardless of voltage
    #[serde(default)]
    pub force_start: bool,

    /// Nominal system voltage: 12, 24, 36, 48, 72 or "none"
    pub nominal: Option<RawNominal>,

    /// Stop the workload below this voltage
    pub volts_min: Option<f64>,

    /// Start the workload at or above this voltage
    pub volts_start_min: Option<f64>,

    /// Maximum number of stops per calendar day (default: 1)
    pub max_stops_per_day: Option<u32>,

    /// Seconds between polls (default: 60)
    pub poll_interval_seconds: Option<u64>,

    /// Window in which the workload may run while voltage is unreadable
    #[serde(default)]
    pub failsafe_window: RawFailsafeWindow,

    /// Voltage sensor endpoint
    #[serde(default)]
    pub sensor: RawSensorConfig,

    /// Termination timings
    #[serde(default)]
    pub stop: RawStopConfig,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            config_version: CURRENT_CONFIG_VERSION,
            load_cmd: None,
            log_file: None,
            log_append: false,
            force_start: false,
            nominal: None,
            volts_min: None,
            volts_start_min: None,
            max_stops_per_day: None,
            poll_interval_seconds: None,
            failsafe_window: RawFailsafeWindow::default(),
            sensor: RawSensorConfig::default(),
            stop: RawStopConfig::default(),
        }
    }
}

/// Nominal voltage, written either as a number or a string
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawNominal {
    Volts(u32),
    Named(String),
}

/// Failsafe window (HH:MM format)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawFailsafeWindow {
    pub start: Option<String>,
    pub stop: Option<String>,
}

/// Voltage sensor settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSensorConfig {
    /// URL returning `key|value` lines
    pub url: Option<String>,

    /// Name of the field carrying the battery voltage
    pub voltage_field: Option<String>,

    /// HTTP timeout in seconds
    pub timeout_seconds: Option<u64>,
}

/// Termination timings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawStopConfig {
    /// Wait after SIGTERM before checking liveness
    pub grace_seconds: Option<u64>,

    /// Wait after SIGKILL before the final liveness check
    pub kill_wait_seconds: Option<u64>,
}

/// Values supplied on the command line. Anything set here wins over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub load_cmd: Option<String>,
    pub log_file: Option<PathBuf>,
    pub log_append: bool,
    pub force_start: bool,
    pub nominal: Option<String>,
    pub volts_min: Option<f64>,
    pub volts_start_min: Option<f64>,
    pub sensor_url: Option<String>,
}

impl RawConfig {
    /// Layer command-line values on top of this config
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(cmd) = overrides.load_cmd {
            self.load_cmd = Some(cmd);
        }
        if let Some(path) = overrides.log_file {
            self.log_file = Some(path);
        }
        self.log_append |= overrides.log_append;
        self.force_start |= overrides.force_start;
        if let Some(nominal) = overrides.nominal {
            self.nominal = Some(RawNominal::Named(nominal));
        }
        if let Some(v) = overrides.volts_min {
            self.volts_min = Some(v);
        }
        if let Some(v) = overrides.volts_start_min {
            self.volts_start_min = Some(v);
        }
        if let Some(url) = overrides.sensor_url {
            self.sensor.url = Some(url);
        }
        self
    }
}
