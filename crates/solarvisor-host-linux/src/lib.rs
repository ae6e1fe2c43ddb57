//! Linux host adapter for solarvisor
//!
//! Provides:
//! - Shell spawning into a fresh session/process group with log redirection
//! - Graceful (SIGTERM) and forceful (SIGKILL) termination of the group
//! - Liveness probing with the null signal, reaping exited children first
//! - Voltage readings fetched over HTTP

mod adapter;
mod process;
mod sensor;

pub use adapter::*;
pub use process::*;
pub use sensor::*;
