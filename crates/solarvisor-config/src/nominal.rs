//! Nominal battery voltages and their default thresholds
//!
//! The 48V row is the reference. 12V is a quarter of it, and the 24V, 36V
//! and 72V rows are multiples of the 12V row.

use serde::Serialize;
use std::fmt;

use crate::schema::RawNominal;

/// Nominal voltage assumed when none is configured
pub const DEFAULT_NOMINAL_VOLTS: u32 = 48;

const VOLTS_MIN_48: f64 = 51.0;
const VOLTS_START_MIN_48: f64 = 53.0;
const RANGE_MIN_48: f64 = 40.0;
const RANGE_MAX_48: f64 = 64.0;

/// Default thresholds and accepted threshold range for one nominal voltage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NominalLimits {
    pub volts_min: f64,
    pub volts_start_min: f64,
    pub range_min: f64,
    pub range_max: f64,
}

impl NominalLimits {
    fn scaled(factor: f64) -> Self {
        Self {
            volts_min: VOLTS_MIN_48 * factor,
            volts_start_min: VOLTS_START_MIN_48 * factor,
            range_min: RANGE_MIN_48 * factor,
            range_max: RANGE_MAX_48 * factor,
        }
    }

    /// Inclusive range check
    pub fn accepts(&self, volts: f64) -> bool {
        volts >= self.range_min && volts <= self.range_max
    }
}

/// Look up the limits for a nominal system voltage
pub fn nominal_limits(volts: u32) -> Option<NominalLimits> {
    let factor = match volts {
        12 => 0.25,
        24 => 0.5,
        36 => 0.75,
        48 => 1.0,
        72 => 1.5,
        _ => return None,
    };
    Some(NominalLimits::scaled(factor))
}

/// All supported nominal voltages, ascending
pub const SUPPORTED_NOMINALS: [u32; 5] = [12, 24, 36, 48, 72];

/// The nominal voltage the thresholds were resolved against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nominal {
    Volts(u32),
    /// No table row applies; both thresholds must be given explicitly
    None,
}

impl Nominal {
    /// Interpret a configured nominal value.
    ///
    /// Unknown values log a warning and fall back to [`Nominal::None`].
    pub fn from_raw(raw: Option<&RawNominal>) -> Self {
        let volts = match raw {
            None => return Self::Volts(DEFAULT_NOMINAL_VOLTS),
            Some(RawNominal::Volts(v)) => Some(*v),
            Some(RawNominal::Named(name)) => {
                let name = name.trim();
                if name.eq_ignore_ascii_case("none") {
                    return Self::None;
                }
                name.parse::<u32>().ok()
            }
        };

        match volts {
            Some(v) if nominal_limits(v).is_some() => Self::Volts(v),
            _ => {
                tracing::warn!(
                    nominal = ?raw,
                    supported = ?SUPPORTED_NOMINALS,
                    "Nominal voltage is unknown, assuming nominal=none"
                );
                Self::None
            }
        }
    }

    pub fn limits(&self) -> Option<NominalLimits> {
        match self {
            Self::Volts(v) => nominal_limits(*v),
            Self::None => None,
        }
    }
}

impl fmt::Display for Nominal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Volts(v) => write!(f, "{}", v),
            Self::None => write!(f, "none"),
        }
    }
}

impl Serialize for Nominal {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
