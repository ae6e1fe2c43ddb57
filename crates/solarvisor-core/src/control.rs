//! Control loop
//!
//! One tick reads the voltage, asks the engine for a decision and applies
//! it through the process supervisor. [`ControlLoop::run`] repeats that on
//! the poll interval until the shutdown future resolves.

use chrono::{DateTime, Local};
use solarvisor_config::Settings;
use solarvisor_host_api::{LogTarget, ProcessHost, VoltageSource};
use std::future::Future;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::{
    Decision, RuntimeState, SharedSupervisor, ShutdownOutcome, TickInput, VoltageReading, decide,
    shutdown,
};

/// What a tick did to the workload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    None,
    Spawned { pid: Option<u32> },
    Stopped { confirmed: bool },
}

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub voltage: VoltageReading,
    pub decision: Decision,
    pub action: TickAction,
}

pub struct ControlLoop<H: ProcessHost, V: VoltageSource> {
    settings: Arc<Settings>,
    state: RuntimeState,
    sensor: Arc<V>,
    supervisor: SharedSupervisor<H>,
}

impl<H: ProcessHost, V: VoltageSource> ControlLoop<H, V> {
    pub fn new(
        settings: Arc<Settings>,
        sensor: Arc<V>,
        supervisor: SharedSupervisor<H>,
        now: DateTime<Local>,
    ) -> Self {
        Self {
            settings,
            state: RuntimeState::new(now.date_naive()),
            sensor,
            supervisor,
        }
    }

    pub fn state(&self) -> &RuntimeState {
        &self.state
    }

    /// Poll the sensor. Any failure reads as unavailable.
    pub async fn read_voltage(&self) -> VoltageReading {
        let field = &self.settings.sensor.voltage_field;

        let fields = match self.sensor.fetch_fields().await {
            Ok(fields) => fields,
            Err(e) => {
                warn!(error = %e, "Failed to read battery voltage");
                return VoltageReading::unavailable();
            }
        };

        let reading = VoltageReading::from_fields(&fields, field);
        if reading.value.is_none() {
            warn!(
                field = %field,
                raw = ?fields.get(field),
                "Sensor payload has no usable voltage"
            );
        }
        reading
    }

    /// Run one decision cycle at `now`
    pub async fn tick(&mut self, now: DateTime<Local>) -> TickReport {
        if self.state.roll_day(now.date_naive()) {
            info!(day = %self.state.current_day(), "New day, daily stop counter reset");
        }
        let first_tick = self.state.begin_tick();

        let voltage = self.read_voltage().await;

        let mut supervisor = self.supervisor.lock().await;
        let running = supervisor.is_alive();

        let input = TickInput {
            now,
            voltage,
            running,
            first_tick,
            stops_today: self.state.stops_today(),
        };
        let decision = decide(&self.settings, &input);

        info!(
            tick = self.state.tick_count(),
            voltage = %voltage,
            running = running,
            stops_today = input.stops_today,
            "{}",
            decision
        );

        let action = match decision {
            Decision::Start(_) => {
                let log = LogTarget::new(&self.settings.log_path, self.settings.log_append);
                let pid = supervisor.spawn(&self.settings.load_command, log).pid();
                TickAction::Spawned { pid }
            }
            Decision::Stop(_) => {
                self.state.record_stop();
                debug!(stops_today = self.state.stops_today(), "Stop counted");
                let confirmed = supervisor.stop().await;
                TickAction::Stopped { confirmed }
            }
            Decision::Hold(_) => TickAction::None,
        };

        TickReport {
            voltage,
            decision,
            action,
        }
    }

    /// Tick on the poll interval until `shutdown_signal` resolves, then stop
    /// the workload. The first tick runs immediately.
    pub async fn run<F>(mut self, shutdown_signal: F) -> ShutdownOutcome
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.settings.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown_signal);

        info!(
            poll_interval = ?self.settings.poll_interval,
            "Supervisor running"
        );

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown_signal => {
                    break;
                }

                _ = interval.tick() => {
                    self.tick(solarvisor_util::now()).await;
                }
            }
        }

        info!("Shutting down solarvisor");
        let outcome = shutdown(&self.supervisor).await;
        info!(outcome = %outcome, "Shutdown complete");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HoldReason, ProcessSupervisor, StartReason, StopReason};
    use chrono::TimeZone;
    use solarvisor_config::{RawConfig, RawFailsafeWindow, RawStopConfig};
    use solarvisor_host_api::{MockExitBehavior, MockHost, MockVoltageSource, SignalKind};
    use std::collections::HashMap;

    const FIELD: &str = "Output Voltage";

    fn settings(force_start: bool, max_stops: u32) -> Arc<Settings> {
        Arc::new(
            Settings::from_raw(RawConfig {
                load_cmd: Some("miner --threads 4".into()),
                log_file: Some("/tmp/miner.log".into()),
                log_append: true,
                force_start,
                volts_min: Some(51.0),
                volts_start_min: Some(53.0),
                max_stops_per_day: Some(max_stops),
                failsafe_window: RawFailsafeWindow {
                    start: Some("9:00".into()),
                    stop: Some("19:00".into()),
                },
                stop: RawStopConfig {
                    grace_seconds: Some(0),
                    kill_wait_seconds: Some(0),
                },
                ..Default::default()
            })
            .unwrap(),
        )
    }

    fn at(day: u32, hour: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap()
    }

    struct Harness {
        host: Arc<MockHost>,
        sensor: Arc<MockVoltageSource>,
        control: ControlLoop<MockHost, MockVoltageSource>,
    }

    fn harness(settings: Arc<Settings>) -> Harness {
        let host = Arc::new(MockHost::new());
        let sensor = Arc::new(MockVoltageSource::new(FIELD));
        let supervisor =
            ProcessSupervisor::new(host.clone(), settings.stop_timings).into_shared();
        let control = ControlLoop::new(settings, sensor.clone(), supervisor, at(1, 6));
        Harness {
            host,
            sensor,
            control,
        }
    }

    #[tokio::test]
    async fn recovery_start_uses_configured_command_and_log() {
        let mut h = harness(settings(false, 1));
        h.sensor.set_volts(53.5);

        let report = h.control.tick(at(1, 12)).await;
        assert!(report.decision.is_start());
        assert_eq!(report.action, TickAction::Spawned { pid: Some(1000) });

        let spawned = h.host.spawned();
        assert_eq!(spawned.len(), 1);
        assert_eq!(spawned[0].command, "miner --threads 4");
        assert_eq!(spawned[0].log, LogTarget::new("/tmp/miner.log", true));
    }

    #[tokio::test]
    async fn low_voltage_stop_counts_and_blocks_restart() {
        let mut h = harness(settings(false, 1));
        h.sensor.set_volts(54.0);
        h.control.tick(at(1, 10)).await;

        h.sensor.set_volts(50.0);
        let report = h.control.tick(at(1, 11)).await;
        assert_eq!(
            report.decision,
            Decision::Stop(StopReason::LowVoltage {
                volts: 50.0,
                threshold: 51.0
            })
        );
        assert_eq!(report.action, TickAction::Stopped { confirmed: true });
        assert_eq!(h.control.state().stops_today(), 1);

        // Voltage recovers but the daily limit is spent
        h.sensor.set_volts(56.0);
        let report = h.control.tick(at(1, 12)).await;
        assert!(matches!(
            report.decision,
            Decision::Hold(HoldReason::DailyStopLimit { .. })
        ));
        assert_eq!(h.host.spawn_count(), 1);
    }

    #[tokio::test]
    async fn counter_resets_at_midnight() {
        let mut h = harness(settings(false, 1));
        h.sensor.set_volts(54.0);
        h.control.tick(at(1, 10)).await;
        h.sensor.set_volts(49.0);
        h.control.tick(at(1, 11)).await;

        h.sensor.set_volts(54.0);
        assert!(h.control.tick(at(1, 23)).await.decision.is_hold());

        let report = h.control.tick(at(2, 0)).await;
        assert!(report.decision.is_start());
        assert_eq!(h.control.state().stops_today(), 0);
        assert_eq!(h.host.spawn_count(), 2);
    }

    #[tokio::test]
    async fn unconfirmed_stop_still_counts() {
        let mut h = harness(settings(false, 3));
        h.host.set_exit_behavior(MockExitBehavior::Never);
        h.sensor.set_volts(54.0);
        h.control.tick(at(1, 10)).await;

        h.sensor.set_volts(50.0);
        let report = h.control.tick(at(1, 11)).await;
        assert_eq!(report.action, TickAction::Stopped { confirmed: false });
        assert_eq!(h.control.state().stops_today(), 1);

        // Still alive, so the next low reading tries again
        let report = h.control.tick(at(1, 12)).await;
        assert!(report.decision.is_stop());
        assert_eq!(h.control.state().stops_today(), 2);
        assert_eq!(h.host.signal_count(SignalKind::Kill), 2);
    }

    #[tokio::test]
    async fn force_start_runs_once() {
        let mut h = harness(settings(true, 1));
        h.sensor.set_volts(40.0);

        let report = h.control.tick(at(1, 3)).await;
        assert_eq!(report.decision, Decision::Start(StartReason::Forced));

        // Second tick sees the low voltage and stops it
        let report = h.control.tick(at(1, 3)).await;
        assert!(report.decision.is_stop());
        assert_eq!(h.host.spawn_count(), 1);
    }

    #[tokio::test]
    async fn sensor_outage_uses_failsafe_window() {
        let mut h = harness(settings(false, 1));

        let report = h.control.tick(at(1, 10)).await;
        assert_eq!(report.voltage, VoltageReading::unavailable());
        assert_eq!(report.decision, Decision::Start(StartReason::FailsafeWindow));

        let report = h.control.tick(at(1, 19)).await;
        assert_eq!(
            report.decision,
            Decision::Stop(StopReason::OutsideFailsafeWindow)
        );
        assert_eq!(h.sensor.fetch_count(), 2);
    }

    #[tokio::test]
    async fn sensor_dropping_out_after_start_falls_back_to_window() {
        let mut h = harness(settings(false, 1));
        h.sensor.set_volts(54.0);
        assert!(h.control.tick(at(1, 17)).await.decision.is_start());

        h.sensor.set_unavailable();
        let report = h.control.tick(at(1, 18)).await;
        assert_eq!(
            report.decision,
            Decision::Hold(HoldReason::Failsafe {
                running: true,
                in_window: true
            })
        );

        let report = h.control.tick(at(1, 20)).await;
        assert_eq!(
            report.decision,
            Decision::Stop(StopReason::OutsideFailsafeWindow)
        );
        assert!(h.host.running_pids().is_empty());
    }

    #[tokio::test]
    async fn payload_without_field_is_unavailable() {
        let h = harness(settings(false, 1));
        let mut fields = HashMap::new();
        fields.insert("Output Current".to_string(), "3.0".to_string());
        h.sensor.set_fields(fields);

        assert_eq!(h.control.read_voltage().await, VoltageReading::unavailable());

        h.sensor.set_raw("garbage");
        assert_eq!(h.control.read_voltage().await, VoltageReading::unavailable());
    }

    #[tokio::test]
    async fn self_exited_workload_is_restarted() {
        let mut h = harness(settings(false, 1));
        h.sensor.set_volts(54.0);
        let report = h.control.tick(at(1, 10)).await;
        let TickAction::Spawned { pid: Some(pid) } = report.action else {
            panic!("expected a spawn, got {:?}", report.action);
        };

        h.host.simulate_exit(pid);
        let report = h.control.tick(at(1, 11)).await;
        assert!(report.decision.is_start());
        assert_eq!(h.control.state().stops_today(), 0);
    }

    #[tokio::test]
    async fn failed_spawn_retries_next_tick() {
        let mut h = harness(settings(false, 1));
        h.sensor.set_volts(54.0);
        h.host.set_fail_spawn(true);

        let report = h.control.tick(at(1, 10)).await;
        assert_eq!(report.action, TickAction::Spawned { pid: None });

        h.host.set_fail_spawn(false);
        let report = h.control.tick(at(1, 11)).await;
        assert_eq!(report.action, TickAction::Spawned { pid: Some(1000) });
    }

    #[tokio::test]
    async fn run_stops_workload_on_shutdown() {
        let h = harness(settings(true, 1));
        h.sensor.set_volts(52.0);
        let host = h.host.clone();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(h.control.run(async {
            let _ = rx.await;
        }));

        // Wait for the immediate first tick to force-start the workload
        for _ in 0..100 {
            if host.spawn_count() > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(host.running_pids(), vec![1000]);

        tx.send(()).unwrap();
        let outcome = handle.await.unwrap();
        assert_eq!(outcome, ShutdownOutcome::Stopped);
        assert!(host.running_pids().is_empty());
    }

    #[tokio::test]
    async fn run_exits_immediately_when_already_signalled() {
        let h = harness(settings(true, 1));
        let host = h.host.clone();

        let outcome = h.control.run(async {}).await;
        assert_eq!(outcome, ShutdownOutcome::NothingToStop);
        assert_eq!(host.spawn_count(), 0);
    }
}
