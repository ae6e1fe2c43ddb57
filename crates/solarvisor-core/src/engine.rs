//! Decision engine
//!
//! Turns one tick's inputs into exactly one [`Decision`]. Rules are checked
//! in a fixed order and the first match wins:
//!
//! 1. forced start on the first tick
//! 2. daily stop limit reached while stopped
//! 3. failsafe when the voltage could not be read
//! 4. low-voltage stop
//! 5. recovery start
//! 6. steady state

use chrono::{DateTime, Local};
use solarvisor_config::Settings;
use std::collections::HashMap;
use std::fmt;

/// One poll of the voltage sensor. `None` means the reading failed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoltageReading {
    pub value: Option<f64>,
}

impl VoltageReading {
    pub fn volts(value: f64) -> Self {
        Self {
            value: Some(value).filter(|v| v.is_finite()),
        }
    }

    pub fn unavailable() -> Self {
        Self { value: None }
    }

    /// Pick `field` out of a sensor payload. Missing or non-numeric values are
    /// unavailable, never zero.
    pub fn from_fields(fields: &HashMap<String, String>, field: &str) -> Self {
        match fields.get(field).and_then(|s| s.trim().parse::<f64>().ok()) {
            Some(v) => Self::volts(v),
            None => Self::unavailable(),
        }
    }
}

impl fmt::Display for VoltageReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(v) => write!(f, "{}V", v),
            None => write!(f, "unavailable"),
        }
    }
}

/// Everything the decision depends on for one tick
#[derive(Debug, Clone, Copy)]
pub struct TickInput {
    pub now: DateTime<Local>,
    pub voltage: VoltageReading,
    pub running: bool,
    pub first_tick: bool,
    pub stops_today: u32,
}

/// Why the workload is being started
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StartReason {
    Forced,
    FailsafeWindow,
    VoltageRecovered { volts: f64, threshold: f64 },
}

/// Why the workload is being stopped
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopReason {
    OutsideFailsafeWindow,
    LowVoltage { volts: f64, threshold: f64 },
}

/// Why nothing is done this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HoldReason {
    DailyStopLimit { stops_today: u32, max: u32 },
    Failsafe { running: bool, in_window: bool },
    Steady { volts: f64, running: bool },
}

/// The single action chosen for a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Start(StartReason),
    Stop(StopReason),
    Hold(HoldReason),
}

impl Decision {
    pub fn is_start(&self) -> bool {
        matches!(self, Self::Start(_))
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, Self::Stop(_))
    }

    pub fn is_hold(&self) -> bool {
        matches!(self, Self::Hold(_))
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start(StartReason::Forced) => {
                write!(f, "forcing start because force-start is set. starting")
            }
            Self::Start(StartReason::FailsafeWindow) => write!(
                f,
                "voltage not read, within failsafe window and service not running. starting"
            ),
            Self::Start(StartReason::VoltageRecovered { volts, threshold }) => write!(
                f,
                "battery voltage is {} (at or above {}). starting service",
                volts, threshold
            ),
            Self::Stop(StopReason::OutsideFailsafeWindow) => write!(
                f,
                "voltage not read, outside failsafe window and service is running. stopping"
            ),
            Self::Stop(StopReason::LowVoltage { volts, threshold }) => write!(
                f,
                "battery voltage is {} (below {}). stopping service",
                volts, threshold
            ),
            Self::Hold(HoldReason::DailyStopLimit { stops_today, max }) => write!(
                f,
                "daily stop limit reached ({} of {}). no more starts until tomorrow",
                stops_today, max
            ),
            Self::Hold(HoldReason::Failsafe { running, in_window }) => write!(
                f,
                "voltage not read, service is {}running and {} failsafe window. no action taken",
                if *running { "" } else { "not " },
                if *in_window { "within" } else { "outside" }
            ),
            Self::Hold(HoldReason::Steady { volts, running }) => write!(
                f,
                "battery voltage is {} and service is {}running. no action taken",
                volts,
                if *running { "" } else { "not " }
            ),
        }
    }
}

/// Choose the action for one tick
pub fn decide(settings: &Settings, input: &TickInput) -> Decision {
    if input.first_tick && settings.force_start {
        return Decision::Start(StartReason::Forced);
    }

    if !input.running && input.stops_today >= settings.max_stops_per_day {
        return Decision::Hold(HoldReason::DailyStopLimit {
            stops_today: input.stops_today,
            max: settings.max_stops_per_day,
        });
    }

    let Some(volts) = input.voltage.value else {
        let in_window = settings.failsafe_window.contains(&input.now);
        return match (input.running, in_window) {
            (false, true) => Decision::Start(StartReason::FailsafeWindow),
            (true, false) => Decision::Stop(StopReason::OutsideFailsafeWindow),
            (running, in_window) => Decision::Hold(HoldReason::Failsafe { running, in_window }),
        };
    };

    if input.running && volts < settings.volts_min {
        return Decision::Stop(StopReason::LowVoltage {
            volts,
            threshold: settings.volts_min,
        });
    }

    if !input.running && volts >= settings.volts_start_min {
        return Decision::Start(StartReason::VoltageRecovered {
            volts,
            threshold: settings.volts_start_min,
        });
    }

    Decision::Hold(HoldReason::Steady {
        volts,
        running: input.running,
    })
}
