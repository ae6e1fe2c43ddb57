//! Process supervisor
//!
//! Owns the single managed workload: spawns it, answers whether it is still
//! alive, and stops it with SIGTERM followed by SIGKILL.

use solarvisor_config::StopTimings;
use solarvisor_host_api::{HostError, LogTarget, ProcessHost, SignalKind};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The workload as last spawned. `pid` is `None` when the last spawn failed
/// or after a confirmed stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedProcess {
    pid: Option<u32>,
    command: String,
}

impl ManagedProcess {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

/// Supervisor shared between the control loop and the shutdown path
pub type SharedSupervisor<H> = Arc<tokio::sync::Mutex<ProcessSupervisor<H>>>;

pub struct ProcessSupervisor<H: ProcessHost> {
    host: Arc<H>,
    timings: StopTimings,
    current: Option<ManagedProcess>,
}

impl<H: ProcessHost> ProcessSupervisor<H> {
    pub fn new(host: Arc<H>, timings: StopTimings) -> Self {
        Self {
            host,
            timings,
            current: None,
        }
    }

    /// Wrap into the shared handle used by the control loop
    pub fn into_shared(self) -> SharedSupervisor<H> {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    pub fn current(&self) -> Option<&ManagedProcess> {
        self.current.as_ref()
    }

    pub fn pid(&self) -> Option<u32> {
        self.current.as_ref().and_then(|p| p.pid)
    }

    /// Launch `command` through the shell with output sent to `log`.
    ///
    /// A failed launch is logged and leaves a handle without a pid, so the
    /// next tick sees the workload as not running.
    pub fn spawn(&mut self, command: &str, log: LogTarget) -> &ManagedProcess {
        let pid = match self.host.spawn(command, &log) {
            Ok(pid) => {
                info!(pid = pid, command = %command, log = %log.path.display(), "Workload started");
                Some(pid)
            }
            Err(e) => {
                error!(command = %command, error = %e, "Failed to start workload");
                None
            }
        };

        self.current.insert(ManagedProcess {
            pid,
            command: command.to_string(),
        })
    }

    /// Whether the managed workload is currently alive
    pub fn is_alive(&self) -> bool {
        self.pid().is_some_and(|pid| self.host.is_alive(pid))
    }

    /// Stop the workload: SIGTERM, wait the grace period, then SIGKILL and
    /// wait again if it is still alive.
    ///
    /// Returns true if the workload is confirmed dead. The pid is only
    /// forgotten on confirmation; a survivor stays tracked so later ticks can
    /// retry.
    pub async fn stop(&mut self) -> bool {
        let Some(pid) = self.pid() else {
            debug!("Stop requested with no workload pid");
            return false;
        };

        info!(pid = pid, "Stopping workload");

        self.send(pid, SignalKind::Terminate);
        tokio::time::sleep(self.timings.grace).await;

        if !self.host.is_alive(pid) {
            info!(pid = pid, "Workload exited after SIGTERM");
            self.forget();
            return true;
        }

        warn!(pid = pid, grace = ?self.timings.grace, "Workload survived SIGTERM, sending SIGKILL");
        self.send(pid, SignalKind::Kill);
        tokio::time::sleep(self.timings.kill_wait).await;

        if self.host.is_alive(pid) {
            error!(pid = pid, "Workload still running after SIGKILL");
            return false;
        }

        info!(pid = pid, "Workload killed");
        self.forget();
        true
    }

    fn send(&self, pid: u32, kind: SignalKind) {
        match self.host.signal(pid, kind) {
            Ok(()) => debug!(pid = pid, signal = %kind, "Signal sent"),
            Err(HostError::NoSuchProcess(_)) => {
                debug!(pid = pid, signal = %kind, "Workload already gone")
            }
            Err(e) => warn!(pid = pid, signal = %kind, error = %e, "Failed to send signal"),
        }
    }

    fn forget(&mut self) {
        if let Some(process) = self.current.as_mut() {
            process.pid = None;
        }
    }
}
