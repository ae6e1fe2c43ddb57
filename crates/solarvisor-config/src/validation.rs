//! Configuration validation

use solarvisor_util::{DailyWindow, WallClock};
use thiserror::Error;

use crate::nominal::Nominal;
use crate::schema::{RawConfig, RawFailsafeWindow};
use crate::settings::Settings;

/// Default failsafe window start
pub const DEFAULT_FAILSAFE_START: &str = "9:00";

/// Default failsafe window stop
pub const DEFAULT_FAILSAFE_STOP: &str = "19:00";

/// Validation error
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("load_cmd is required")]
    MissingLoadCommand,

    #[error("volts_min and volts_start_min are required when nominal=none")]
    ThresholdsRequired,

    #[error("{name} {value} outside range for nominal voltage {nominal} ({min}..={max})")]
    ThresholdOutOfRange {
        name: &'static str,
        value: f64,
        nominal: u32,
        min: f64,
        max: f64,
    },

    #[error("volts_start_min ({volts_start_min}) must be greater than volts_min ({volts_min})")]
    ThresholdOrder { volts_min: f64, volts_start_min: f64 },

    #[error("Invalid time format for {field} '{value}': {message}")]
    InvalidTimeFormat {
        field: &'static str,
        value: String,
        message: &'static str,
    },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

/// Resolved stop/start thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub nominal: Nominal,
    pub volts_min: f64,
    pub volts_start_min: f64,
}

/// Apply the nominal voltage table to the configured thresholds.
///
/// With a known nominal voltage, missing thresholds take the table defaults
/// and supplied ones must fall inside the table's range. With `none`, both
/// must be supplied. In every case `volts_min < volts_start_min`.
pub fn resolve_thresholds(config: &RawConfig) -> Result<Thresholds, Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (name, value) in [
        ("volts_min", config.volts_min),
        ("volts_start_min", config.volts_start_min),
    ] {
        if let Some(v) = value
            && (!v.is_finite() || v <= 0.0)
        {
            errors.push(ValidationError::InvalidValue {
                field: name,
                message: format!("{} is not a positive voltage", v),
            });
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let nominal = Nominal::from_raw(config.nominal.as_ref());

    let (volts_min, volts_start_min) = match (nominal, nominal.limits()) {
        (Nominal::Volts(volts), Some(limits)) => {
            for (name, value) in [
                ("volts_min", config.volts_min),
                ("volts_start_min", config.volts_start_min),
            ] {
                if let Some(v) = value
                    && !limits.accepts(v)
                {
                    errors.push(ValidationError::ThresholdOutOfRange {
                        name,
                        value: v,
                        nominal: volts,
                        min: limits.range_min,
                        max: limits.range_max,
                    });
                }
            }
            (
                config.volts_min.unwrap_or(limits.volts_min),
                config.volts_start_min.unwrap_or(limits.volts_start_min),
            )
        }
        _ => match (config.volts_min, config.volts_start_min) {
            (Some(min), Some(start)) => (min, start),
            _ => return Err(vec![ValidationError::ThresholdsRequired]),
        },
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    if volts_min >= volts_start_min {
        return Err(vec![ValidationError::ThresholdOrder {
            volts_min,
            volts_start_min,
        }]);
    }

    Ok(Thresholds {
        nominal,
        volts_min,
        volts_start_min,
    })
}

/// Parse the failsafe window, filling in the defaults for missing ends
pub fn parse_failsafe_window(raw: &RawFailsafeWindow) -> Result<DailyWindow, Vec<ValidationError>> {
    let start = parse_time(
        "failsafe_window.start",
        raw.start.as_deref().unwrap_or(DEFAULT_FAILSAFE_START),
    );
    let stop = parse_time(
        "failsafe_window.stop",
        raw.stop.as_deref().unwrap_or(DEFAULT_FAILSAFE_STOP),
    );

    match (start, stop) {
        (Ok(start), Ok(stop)) => Ok(DailyWindow::new(start, stop)),
        (start, stop) => Err(start.err().into_iter().chain(stop.err()).collect()),
    }
}

/// Parse H:MM / HH:MM time format
pub fn parse_time(field: &'static str, value: &str) -> Result<WallClock, ValidationError> {
    value
        .parse::<WallClock>()
        .map_err(|e| ValidationError::InvalidTimeFormat {
            field,
            value: value.to_string(),
            message: e.reason,
        })
}
