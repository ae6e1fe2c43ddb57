//! Process management utilities

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::fs::{File, OpenOptions};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use tracing::debug;

use solarvisor_host_api::{HostError, HostResult, LogTarget, SignalKind};

/// Shell used to interpret the workload command
const SHELL: &str = "/bin/sh";

/// Open the workload log, truncating unless `append` is set
pub fn open_log(log: &LogTarget) -> HostResult<File> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(log.append)
        .truncate(!log.append)
        .open(&log.path)?;
    Ok(file)
}

/// Spawn `command` through the shell as the leader of a new session.
///
/// stdin is /dev/null; stdout and stderr share the log file. Because the
/// child calls `setsid`, its pid doubles as its process group id and it is
/// not touched by terminal signals aimed at the supervisor.
pub fn spawn_shell(command: &str, log: &LogTarget) -> HostResult<Child> {
    if command.trim().is_empty() {
        return Err(HostError::SpawnFailed("Empty command".into()));
    }

    let stdout = open_log(log)?;
    let stderr = stdout.try_clone()?;

    let mut cmd = Command::new(SHELL);
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr));

    // SAFETY: setsid is async-signal-safe and touches no parent state
    unsafe {
        cmd.pre_exec(|| {
            nix::unistd::setsid().map_err(std::io::Error::from)?;
            Ok(())
        });
    }

    let child = cmd
        .spawn()
        .map_err(|e| HostError::SpawnFailed(format!("Failed to spawn {}: {}", command, e)))?;

    debug!(pid = child.id(), command = %command, log = %log.path.display(), "Process spawned");

    Ok(child)
}

fn to_nix_signal(kind: SignalKind) -> Signal {
    match kind {
        SignalKind::Terminate => Signal::SIGTERM,
        SignalKind::Kill => Signal::SIGKILL,
    }
}

fn map_errno(pid: u32, kind: SignalKind, errno: Errno) -> HostError {
    match errno {
        Errno::ESRCH => HostError::NoSuchProcess(pid),
        Errno::EPERM => HostError::PermissionDenied(format!("{} to pid {}", kind, pid)),
        other => HostError::SignalFailed(format!("{} to pid {}: {}", kind, pid, other)),
    }
}

/// Send a termination signal to the process group led by `pid`.
///
/// Falls back to the single process when the group is gone but the pid is
/// not (e.g. the workload moved itself to another group).
pub fn signal_group(pid: u32, kind: SignalKind) -> HostResult<()> {
    let sig = to_nix_signal(kind);
    let pgid = Pid::from_raw(-(pid as i32)); // Negative for process group

    match signal::kill(pgid, sig) {
        Ok(()) => {
            debug!(pgid = pid, signal = %kind, "Sent signal to process group");
            Ok(())
        }
        Err(Errno::ESRCH) => match signal::kill(Pid::from_raw(pid as i32), sig) {
            Ok(()) => {
                debug!(pid = pid, signal = %kind, "Sent signal to process");
                Ok(())
            }
            Err(e) => Err(map_errno(pid, kind, e)),
        },
        Err(e) => Err(map_errno(pid, kind, e)),
    }
}

/// Probe `pid` with the null signal.
///
/// EPERM means the process exists but belongs to someone else, which still
/// counts as alive.
pub fn probe(pid: u32) -> bool {
    if pid == 0 || pid > i32::MAX as u32 {
        return false;
    }

    match signal::kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}
