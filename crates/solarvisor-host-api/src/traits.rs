//! Host adapter traits

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from host adapter operations
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("No such process: {0}")]
    NoSuchProcess(u32),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Signal failed: {0}")]
    SignalFailed(String),

    #[error("Sensor error: {0}")]
    Sensor(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type HostResult<T> = Result<T, HostError>;

/// Termination signal kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// Ask the workload to exit (SIGTERM)
    Terminate,
    /// Kill the workload unconditionally (SIGKILL)
    Kill,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminate => write!(f, "SIGTERM"),
            Self::Kill => write!(f, "SIGKILL"),
        }
    }
}

/// Where the workload's combined stdout/stderr is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTarget {
    pub path: PathBuf,
    /// Append instead of truncating
    pub append: bool,
}

impl LogTarget {
    pub fn new(path: impl Into<PathBuf>, append: bool) -> Self {
        Self {
            path: path.into(),
            append,
        }
    }
}

/// OS-process primitives used by the supervisor.
///
/// All calls are blocking and cheap; the supervisor runs them inline.
pub trait ProcessHost: Send + Sync {
    /// Launch `command` through the shell, detached, with output sent to `log`.
    /// Returns the child's pid.
    fn spawn(&self, command: &str, log: &LogTarget) -> HostResult<u32>;

    /// Deliver a termination signal
    fn signal(&self, pid: u32, kind: SignalKind) -> HostResult<()>;

    /// True if a live process with this pid accepts the null probe signal
    fn is_alive(&self, pid: u32) -> bool;
}

/// Source of battery readings.
///
/// Returns the sensor's named fields as strings. Callers pick and parse the
/// field they care about.
#[async_trait]
pub trait VoltageSource: Send + Sync {
    async fn fetch_fields(&self) -> HostResult<HashMap<String, String>>;
}
