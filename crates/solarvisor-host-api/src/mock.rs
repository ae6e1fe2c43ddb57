//! Mock host adapters for testing

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::{HostError, HostResult, LogTarget, ProcessHost, SignalKind, VoltageSource};

/// How a mock process reacts to termination signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockExitBehavior {
    /// Dies on SIGTERM
    OnTerminate,
    /// Ignores SIGTERM, dies on SIGKILL
    OnKill,
    /// Survives everything (e.g. stuck in uninterruptible sleep)
    Never,
}

/// Mock process state for testing
#[derive(Debug, Clone)]
pub struct MockProcess {
    pub pid: u32,
    pub command: String,
    pub log: LogTarget,
    pub alive: bool,
}

#[derive(Debug)]
struct MockHostState {
    next_pid: u32,
    processes: HashMap<u32, MockProcess>,
    signals: Vec<(u32, SignalKind)>,
    fail_spawn: bool,
    exit_behavior: MockExitBehavior,
}

/// Mock process host for unit/integration testing
#[derive(Debug)]
pub struct MockHost {
    state: Mutex<MockHostState>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockHostState {
                next_pid: 1000,
                processes: HashMap::new(),
                signals: Vec::new(),
                fail_spawn: false,
                exit_behavior: MockExitBehavior::OnTerminate,
            }),
        }
    }

    pub fn with_exit_behavior(self, behavior: MockExitBehavior) -> Self {
        self.set_exit_behavior(behavior);
        self
    }

    /// Change how processes react to signals from now on
    pub fn set_exit_behavior(&self, behavior: MockExitBehavior) {
        self.state.lock().unwrap().exit_behavior = behavior;
    }

    /// Configure spawn to fail
    pub fn set_fail_spawn(&self, fail: bool) {
        self.state.lock().unwrap().fail_spawn = fail;
    }

    /// Simulate the workload exiting on its own
    pub fn simulate_exit(&self, pid: u32) {
        if let Some(p) = self.state.lock().unwrap().processes.get_mut(&pid) {
            p.alive = false;
        }
    }

    /// Every signal delivered so far, in order
    pub fn signals_sent(&self) -> Vec<(u32, SignalKind)> {
        self.state.lock().unwrap().signals.clone()
    }

    /// Number of signals of one kind delivered so far
    pub fn signal_count(&self, kind: SignalKind) -> usize {
        self.state
            .lock()
            .unwrap()
            .signals
            .iter()
            .filter(|(_, k)| *k == kind)
            .count()
    }

    /// Every successfully spawned process, in pid order
    pub fn spawned(&self) -> Vec<MockProcess> {
        let mut procs: Vec<_> = self.state.lock().unwrap().processes.values().cloned().collect();
        procs.sort_by_key(|p| p.pid);
        procs
    }

    pub fn spawn_count(&self) -> usize {
        self.state.lock().unwrap().processes.len()
    }

    /// Pids of processes still alive
    pub fn running_pids(&self) -> Vec<u32> {
        let mut pids: Vec<_> = self
            .state
            .lock()
            .unwrap()
            .processes
            .values()
            .filter(|p| p.alive)
            .map(|p| p.pid)
            .collect();
        pids.sort_unstable();
        pids
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessHost for MockHost {
    fn spawn(&self, command: &str, log: &LogTarget) -> HostResult<u32> {
        let mut state = self.state.lock().unwrap();
        if state.fail_spawn {
            return Err(HostError::SpawnFailed("Mock spawn failure".into()));
        }

        let pid = state.next_pid;
        state.next_pid += 1;
        state.processes.insert(
            pid,
            MockProcess {
                pid,
                command: command.to_string(),
                log: log.clone(),
                alive: true,
            },
        );
        Ok(pid)
    }

    fn signal(&self, pid: u32, kind: SignalKind) -> HostResult<()> {
        let mut state = self.state.lock().unwrap();
        let behavior = state.exit_behavior;

        let Some(process) = state.processes.get_mut(&pid).filter(|p| p.alive) else {
            return Err(HostError::NoSuchProcess(pid));
        };

        match (behavior, kind) {
            (MockExitBehavior::OnTerminate, _) | (MockExitBehavior::OnKill, SignalKind::Kill) => {
                process.alive = false;
            }
            _ => {}
        }

        state.signals.push((pid, kind));
        Ok(())
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.state
            .lock()
            .unwrap()
            .processes
            .get(&pid)
            .is_some_and(|p| p.alive)
    }
}

/// Mock voltage sensor returning whatever was last configured
#[derive(Debug)]
pub struct MockVoltageSource {
    field: String,
    response: Mutex<Option<HashMap<String, String>>>,
    fetches: Mutex<usize>,
}

impl MockVoltageSource {
    /// A sensor that reports readings under `field` and starts out unavailable
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            response: Mutex::new(None),
            fetches: Mutex::new(0),
        }
    }

    pub fn set_volts(&self, volts: f64) {
        self.set_raw(volts.to_string());
    }

    /// Report an arbitrary string for the voltage field
    pub fn set_raw(&self, value: impl Into<String>) {
        let mut fields = HashMap::new();
        fields.insert(self.field.clone(), value.into());
        *self.response.lock().unwrap() = Some(fields);
    }

    /// Report a payload without the voltage field
    pub fn set_fields(&self, fields: HashMap<String, String>) {
        *self.response.lock().unwrap() = Some(fields);
    }

    /// Make every fetch fail
    pub fn set_unavailable(&self) {
        *self.response.lock().unwrap() = None;
    }

    pub fn fetch_count(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl VoltageSource for MockVoltageSource {
    async fn fetch_fields(&self) -> HostResult<HashMap<String, String>> {
        *self.fetches.lock().unwrap() += 1;
        self.response
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| HostError::Sensor("Mock sensor unavailable".into()))
    }
}
