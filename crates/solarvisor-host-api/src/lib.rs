//! Host adapter trait interfaces for solarvisor
//!
//! This crate defines the boundary between the supervisor core and the
//! platform: the three OS-process primitives the core needs, and the voltage
//! sensor query. It contains no platform code itself.

mod mock;
mod traits;

pub use mock::*;
pub use traits::*;
