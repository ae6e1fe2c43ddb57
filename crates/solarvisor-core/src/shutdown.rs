//! Shutdown path run when the supervisor is asked to exit

use solarvisor_host_api::ProcessHost;
use std::fmt;
use tracing::{error, info};

use crate::SharedSupervisor;

/// What happened to the workload on the way out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    NothingToStop,
    Stopped,
    StillRunning { pid: u32 },
}

impl fmt::Display for ShutdownOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NothingToStop => write!(f, "no workload running"),
            Self::Stopped => write!(f, "workload stopped"),
            Self::StillRunning { pid } => write!(f, "workload {} still running", pid),
        }
    }
}

/// Stop the workload if a pid is still held.
///
/// Takes the supervisor lock, so it waits for an in-flight tick to finish
/// and no tick can start a new workload afterwards.
pub async fn shutdown<H: ProcessHost>(supervisor: &SharedSupervisor<H>) -> ShutdownOutcome {
    let mut supervisor = supervisor.lock().await;

    let Some(pid) = supervisor.pid() else {
        info!("No workload running at shutdown");
        return ShutdownOutcome::NothingToStop;
    };

    info!(pid = pid, "Stopping workload before exit");
    if supervisor.stop().await {
        ShutdownOutcome::Stopped
    } else {
        error!(pid = pid, "Workload could not be stopped before exit");
        ShutdownOutcome::StillRunning { pid }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProcessSupervisor;
    use solarvisor_config::StopTimings;
    use solarvisor_host_api::{LogTarget, MockExitBehavior, MockHost, SignalKind};
    use std::sync::Arc;
    use std::time::Duration;

    fn shared(host: Arc<MockHost>) -> SharedSupervisor<MockHost> {
        ProcessSupervisor::new(
            host,
            StopTimings {
                grace: Duration::ZERO,
                kill_wait: Duration::ZERO,
            },
        )
        .into_shared()
    }

    #[tokio::test]
    async fn stops_running_workload() {
        let host = Arc::new(MockHost::new());
        let sup = shared(host.clone());
        let pid = sup
            .lock()
            .await
            .spawn("miner", LogTarget::new("/dev/null", false))
            .pid()
            .unwrap();

        assert_eq!(shutdown(&sup).await, ShutdownOutcome::Stopped);
        assert_eq!(host.signals_sent(), vec![(pid, SignalKind::Terminate)]);
        assert!(host.running_pids().is_empty());
    }

    #[tokio::test]
    async fn nothing_to_stop() {
        let host = Arc::new(MockHost::new());
        let sup = shared(host.clone());

        assert_eq!(shutdown(&sup).await, ShutdownOutcome::NothingToStop);
        assert!(host.signals_sent().is_empty());
    }

    #[tokio::test]
    async fn exited_workload_confirms_without_delivering_signals() {
        let host = Arc::new(MockHost::new());
        let sup = shared(host.clone());
        let pid = sup
            .lock()
            .await
            .spawn("miner", LogTarget::new("/dev/null", false))
            .pid()
            .unwrap();
        host.simulate_exit(pid);

        assert_eq!(shutdown(&sup).await, ShutdownOutcome::Stopped);
        assert!(host.signals_sent().is_empty());
        assert_eq!(sup.lock().await.pid(), None);
    }

    #[tokio::test]
    async fn reports_survivor() {
        let host = Arc::new(MockHost::new().with_exit_behavior(MockExitBehavior::Never));
        let sup = shared(host.clone());
        let pid = sup
            .lock()
            .await
            .spawn("miner", LogTarget::new("/dev/null", false))
            .pid()
            .unwrap();

        assert_eq!(shutdown(&sup).await, ShutdownOutcome::StillRunning { pid });
        assert_eq!(host.signal_count(SignalKind::Kill), 1);
    }
}
