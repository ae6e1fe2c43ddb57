//! Core decision engine and process supervisor for solarvisor
//!
//! This crate is the heart of solarvisor, containing:
//! - The decision state machine (voltage, time, run state, daily stops -> start/stop/hold)
//! - Runtime state (daily stop counter with date rollover, first-tick detection)
//! - The process supervisor (spawn, liveness, graceful-then-forced termination)
//! - The control loop that applies one decision per tick
//! - The shutdown path that stops the workload before exit

mod control;
mod engine;
mod shutdown;
mod state;
mod supervisor;

pub use control::*;
pub use engine::*;
pub use shutdown::*;
pub use state::*;
pub use supervisor::*;
