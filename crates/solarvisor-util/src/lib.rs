//! Shared utilities for solarvisor
//!
//! This crate provides:
//! - Time utilities (mockable local time, time-of-day, daily windows)
//! - Default paths for the config file

mod paths;
mod time;

pub use paths::*;
pub use time::*;
