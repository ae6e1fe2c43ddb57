//! Linux host adapter implementation

use solarvisor_host_api::{HostError, HostResult, LogTarget, ProcessHost, SignalKind};
use std::collections::{HashMap, HashSet};
use std::process::Child;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::process::{probe, signal_group, spawn_shell};

#[derive(Default)]
struct Children {
    running: HashMap<u32, Child>,
    /// Pids we spawned and have since reaped. The kernel may hand these
    /// numbers to unrelated processes, so they are never probed or signalled.
    reaped: HashSet<u32>,
}

/// Linux process host.
///
/// Keeps the `Child` of every workload it spawned so exited workloads are
/// reaped before their pid is probed; an unreaped zombie would otherwise
/// answer the null signal and read as alive.
pub struct LinuxHost {
    children: Mutex<Children>,
}

impl LinuxHost {
    pub fn new() -> Self {
        Self {
            children: Mutex::new(Children::default()),
        }
    }

    fn children(&self) -> MutexGuard<'_, Children> {
        // A poisoned map is still a valid map of children
        self.children.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// True if `pid` was one of ours and has exited, reaping it if needed.
    fn is_reaped(&self, pid: u32) -> bool {
        let mut children = self.children();
        if children.reaped.contains(&pid) {
            return true;
        }

        let Some(child) = children.running.get_mut(&pid) else {
            return false;
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                info!(pid = pid, status = %status, "Workload exited");
                children.running.remove(&pid);
                children.reaped.insert(pid);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(pid = pid, error = %e, "Error checking process status");
                false
            }
        }
    }
}

impl Default for LinuxHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessHost for LinuxHost {
    fn spawn(&self, command: &str, log: &LogTarget) -> HostResult<u32> {
        let child = spawn_shell(command, log)?;
        let pid = child.id();

        info!(pid = pid, pgid = pid, "Spawned process");

        let mut children = self.children();
        children.reaped.remove(&pid);
        children.running.insert(pid, child);
        Ok(pid)
    }

    fn signal(&self, pid: u32, kind: SignalKind) -> HostResult<()> {
        if self.is_reaped(pid) {
            return Err(HostError::NoSuchProcess(pid));
        }
        signal_group(pid, kind)
    }

    fn is_alive(&self, pid: u32) -> bool {
        !self.is_reaped(pid) && probe(pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn discard() -> LogTarget {
        LogTarget::new("/dev/null", false)
    }

    #[test]
    fn exited_child_is_not_alive() {
        let host = LinuxHost::new();
        let pid = host.spawn("true", &discard()).unwrap();

        // Give it time to exit
        std::thread::sleep(Duration::from_millis(200));

        assert!(!host.is_alive(pid));
        assert!(host.children().running.is_empty());
    }

    #[test]
    fn reaped_pid_is_never_signalled() {
        let host = LinuxHost::new();
        let pid = host.spawn("true", &discard()).unwrap();
        std::thread::sleep(Duration::from_millis(200));
        assert!(!host.is_alive(pid));

        assert!(matches!(
            host.signal(pid, SignalKind::Terminate),
            Err(HostError::NoSuchProcess(p)) if p == pid
        ));
        assert!(host.children().reaped.contains(&pid));
    }

    #[test]
    fn reused_pid_is_left_alone() {
        let host = LinuxHost::new();

        // A process this host did not start, sitting on a number it once reaped
        let mut other = std::process::Command::new("sleep")
            .arg("60")
            .spawn()
            .unwrap();
        let pid = other.id();
        host.children().reaped.insert(pid);

        assert!(!host.is_alive(pid));
        assert!(matches!(
            host.signal(pid, SignalKind::Kill),
            Err(HostError::NoSuchProcess(_))
        ));

        // The signal never reached it
        assert!(probe(pid));
        assert!(other.try_wait().unwrap().is_none());

        other.kill().unwrap();
        other.wait().unwrap();
    }

    #[test]
    fn spawn_and_kill() {
        let host = LinuxHost::new();
        let pid = host.spawn("sleep 60", &discard()).unwrap();
        assert!(host.is_alive(pid));

        host.signal(pid, SignalKind::Kill).unwrap();
        std::thread::sleep(Duration::from_millis(200));

        assert!(!host.is_alive(pid));
    }

    #[test]
    fn failing_command_still_yields_pid() {
        let host = LinuxHost::new();
        let pid = host
            .spawn("/nonexistent/solarvisor-load", &discard())
            .unwrap();
        std::thread::sleep(Duration::from_millis(200));
        assert!(!host.is_alive(pid));
    }
}
