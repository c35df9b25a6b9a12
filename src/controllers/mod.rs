//! Controllers (§4.5): three interchangeable control loops — Idle, Manual,
//! Static-Schedule — sharing a common connect/reconnect/teardown skeleton
//! and a snapshot slot. A `Dynamic` mode is reserved and refuses to start.

mod idle;
mod manual;
mod static_schedule;

use crate::codec::encode_s32;
use crate::dynconfig::{DataManagerConfig, InverterConfig, ManualConfig, Mode, StaticScheduleConfig};
use crate::error::{FusewattError, Result};
use crate::logging::get_logger;
use crate::modbus::{ClientEndpoint, ModbusManager};
use crate::power::{self, PowerSolverResult};
use crate::telemetry::{self, DataManagerPhaseStats, InverterSnapshot, Phase};
use chrono::Timelike;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

const DATA_MANAGER_CLIENT_NAME: &str = "data_manager";

/// Controller state machine (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ControllerState {
    Idle,
    Connecting,
    Running,
    Draining,
    Closed,
}

/// Fixed configuration a controller needs at setup (loaded once per `run()`
/// outer-loop iteration from the dynamic config store, per §5: mid-run
/// config changes take effect only on the next mode-start).
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub inverters: Vec<InverterConfig>,
    pub data_manager: DataManagerConfig,
    pub loop_delay: Duration,
    pub modbus_timeout: Duration,
    pub modbus_reconnect_delay: Duration,
    pub mode_manual: ManualConfig,
    pub mode_static: StaticScheduleConfig,
}

/// Snapshot slot (§3), overwritten in place by the owning controller each
/// iteration and read by the status handler.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Snapshot {
    pub inverters: HashMap<String, InverterSnapshot>,
    pub data_manager: HashMap<Phase, DataManagerPhaseStats>,
    pub inv_control: HashMap<Phase, PowerSolverResult>,
}

pub type SnapshotHandle = Arc<Mutex<Snapshot>>;

/// A running or idle control loop. `run()` drives the outer skeleton until
/// `stop()` is called or the task is cancelled.
pub struct Controller {
    mode: Mode,
    config: ControllerConfig,
    state: Arc<Mutex<ControllerState>>,
    snapshot: SnapshotHandle,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    logger: crate::logging::StructuredLogger,
}

impl Controller {
    pub fn new(mode: Mode, config: ControllerConfig) -> Result<Self> {
        if mode == Mode::Dynamic {
            return Err(FusewattError::programmer("dynamic mode is reserved and not implemented"));
        }
        let (stop_tx, stop_rx) = watch::channel(false);
        Ok(Self {
            mode,
            config,
            state: Arc::new(Mutex::new(ControllerState::Idle)),
            snapshot: Arc::new(Mutex::new(Snapshot::default())),
            stop_tx,
            stop_rx,
            logger: get_logger("controller"),
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn snapshot_handle(&self) -> SnapshotHandle {
        Arc::clone(&self.snapshot)
    }

    pub fn state(&self) -> ControllerState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Request a clean stop. The outer loop observes this at its next
    /// suspension point and transitions to `Draining`.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    fn set_state(&self, state: ControllerState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    fn build_inverter_manager(&self) -> ModbusManager {
        let endpoints = self
            .config
            .inverters
            .iter()
            .filter(|inv| inv.enable)
            .map(|inv| ClientEndpoint {
                name: inv.name.clone(),
                host: inv.host.clone(),
                port: inv.port,
                timeout: self.config.modbus_timeout,
                reconnect_delay: self.config.modbus_reconnect_delay,
            })
            .collect();
        ModbusManager::new(endpoints)
    }

    fn build_data_manager(&self) -> ModbusManager {
        ModbusManager::new(vec![ClientEndpoint {
            name: DATA_MANAGER_CLIENT_NAME.to_string(),
            host: self.config.data_manager.host.clone(),
            port: self.config.data_manager.port,
            timeout: self.config.modbus_timeout,
            reconnect_delay: self.config.modbus_reconnect_delay,
        }])
    }

    /// Drive the outer skeleton (§4.5): connect, run the mode-specific inner
    /// loop until stopped/cancelled/erroring, relinquish control if this is
    /// the static-schedule controller, close, and either exit or back off
    /// and retry.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            if *self.stop_rx.borrow() {
                self.set_state(ControllerState::Closed);
                return Ok(());
            }

            self.set_state(ControllerState::Connecting);
            let mut inverters = self.build_inverter_manager();
            let mut data_manager = self.build_data_manager();

            let connected = tokio::select! {
                res = Self::connect_both(&mut inverters, &mut data_manager) => res,
                _ = self.stop_rx.changed() => Err(FusewattError::Cancelled),
            };

            if let Err(e) = connected {
                self.logger.warn(&format!("connect failed: {e}"));
                self.set_state(ControllerState::Draining);
                inverters.close().await;
                data_manager.close().await;
                if matches!(e, FusewattError::Cancelled) || *self.stop_rx.borrow() {
                    self.set_state(ControllerState::Closed);
                    return Ok(());
                }
                self.sleep_or_stop(self.config.modbus_reconnect_delay).await;
                continue;
            }

            self.set_state(ControllerState::Running);
            let inner_result = self.run_inner_loop(&mut inverters, &mut data_manager).await;

            self.set_state(ControllerState::Draining);
            if self.mode == Mode::Static {
                idle::relinquish_control(&mut inverters).await;
            }
            inverters.close().await;
            data_manager.close().await;

            if let Err(e) = inner_result {
                if !matches!(e, FusewattError::Cancelled) {
                    self.logger.warn(&format!("controller iteration failed: {e}"));
                }
            }

            if *self.stop_rx.borrow() {
                self.set_state(ControllerState::Closed);
                return Ok(());
            }
            self.sleep_or_stop(self.config.modbus_reconnect_delay).await;
        }
    }

    async fn connect_both(inverters: &mut ModbusManager, data_manager: &mut ModbusManager) -> Result<()> {
        inverters.connect().await?;
        data_manager.connect().await?;
        Ok(())
    }

    /// Sleep for `duration`, waking early if a stop is requested.
    async fn sleep_or_stop(&mut self, duration: Duration) {
        tokio::select! {
            () = sleep(duration) => {}
            _ = self.stop_rx.changed() => {}
        }
    }

    async fn run_inner_loop(&mut self, inverters: &mut ModbusManager, data_manager: &mut ModbusManager) -> Result<()> {
        loop {
            if *self.stop_rx.borrow() {
                return Err(FusewattError::Cancelled);
            }

            let iteration = tokio::select! {
                res = self.iterate(inverters, data_manager) => res,
                _ = self.stop_rx.changed() => Err(FusewattError::Cancelled),
            };
            iteration?;

            self.sleep_or_stop(self.config.loop_delay).await;
            if *self.stop_rx.borrow() {
                return Err(FusewattError::Cancelled);
            }
        }
    }

    async fn iterate(&self, inverters: &mut ModbusManager, data_manager: &mut ModbusManager) -> Result<()> {
        match self.mode {
            Mode::Idle => self.iterate_idle(inverters, data_manager).await,
            Mode::Manual => self.iterate_requested(inverters, data_manager, self.manual_phase_requests()).await,
            Mode::Static => {
                let now_minute = local_minute_of_day();
                let amount = static_schedule::effective_amount(&self.config.mode_static, now_minute);
                self.iterate_requested(inverters, data_manager, self.requests_for_amount(amount)).await
            }
            Mode::Dynamic => unreachable!("Dynamic mode refused at construction"),
        }
    }

    fn manual_phase_requests(&self) -> HashMap<Phase, i64> {
        manual::phase_requests(&self.config.mode_manual, &self.config.inverters)
    }

    fn requests_for_amount(&self, amount: i64) -> HashMap<Phase, i64> {
        let inverters_by_phase = manual::phase_inverters(&self.config.inverters);
        Phase::ALL
            .into_iter()
            .map(|phase| (phase, if inverters_by_phase.contains_key(&phase) { amount } else { 0 }))
            .collect()
    }

    async fn iterate_idle(&self, inverters: &mut ModbusManager, data_manager: &mut ModbusManager) -> Result<()> {
        idle::write_idle(inverters).await?;
        self.refresh_snapshot(inverters, data_manager).await
    }

    async fn iterate_requested(
        &self,
        inverters: &mut ModbusManager,
        data_manager: &mut ModbusManager,
        phase_requests: HashMap<Phase, i64>,
    ) -> Result<()> {
        idle::write_active(inverters).await?;
        self.refresh_snapshot(inverters, data_manager).await?;

        let inverters_by_phase = manual::phase_inverters(&self.config.inverters);
        let mut snapshot = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());

        for phase in Phase::ALL {
            let pb_app = *phase_requests.get(&phase).unwrap_or(&0);
            if pb_app == 0 {
                continue;
            }
            let Some(dm_stats) = snapshot.data_manager.get(&phase) else { continue };
            let Some(names) = inverters_by_phase.get(&phase) else { continue };

            let pb_now: f64 = names
                .iter()
                .filter_map(|n| snapshot.inverters.get(n))
                .map(|s| s.ac_side.p)
                .sum();

            let result = power::solve(power::PowerSolverInput {
                pb_app: pb_app as f64,
                pb_now,
                pg_now: dm_stats.p,
                vg_now: dm_stats.v,
                imax: self.config.data_manager.max_fuse_current,
            });
            snapshot.inv_control.insert(phase, result);

            for name in names {
                let words = encode_s32(result.pb_sent as i32);
                inverters.write_one(name, idle::RENDEMENT_ADDR, &words, 3).await?;
            }
        }
        Ok(())
    }

    async fn refresh_snapshot(&self, inverters: &mut ModbusManager, data_manager: &mut ModbusManager) -> Result<()> {
        let phase_map: HashMap<String, Phase> = self
            .config
            .inverters
            .iter()
            .filter(|inv| inv.enable)
            .map(|inv| (inv.name.clone(), inv.connected_phase))
            .collect();

        let battery = telemetry::battery_stats(inverters, &phase_map).await?;
        let dm = telemetry::data_manager_stats(data_manager, self.config.data_manager.max_fuse_current).await?;

        let mut snapshot = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
        snapshot.inverters = battery;
        snapshot.data_manager = dm;
        Ok(())
    }
}

fn local_minute_of_day() -> u32 {
    let now = chrono::Local::now();
    now.hour() * 60 + now.minute()
}

/// A lightweight, `Clone`-free remote control for a controller running as a
/// spawned task (§4.6): the Supervisor holds this instead of the `Controller`
/// itself, which is moved into the task by [`Controller::spawn`].
pub struct ControllerHandle {
    mode: Mode,
    state: Arc<Mutex<ControllerState>>,
    snapshot: SnapshotHandle,
    stop_tx: watch::Sender<bool>,
}

impl ControllerHandle {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn state(&self) -> ControllerState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

impl Controller {
    /// Move this controller onto a background task, returning a handle the
    /// caller can use to observe state/stop it without awaiting the task.
    pub fn spawn(mut self) -> (ControllerHandle, tokio::task::JoinHandle<Result<()>>) {
        let handle = ControllerHandle {
            mode: self.mode,
            state: Arc::clone(&self.state),
            snapshot: Arc::clone(&self.snapshot),
            stop_tx: self.stop_tx.clone(),
        };
        let join = tokio::spawn(async move { self.run().await });
        (handle, join)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynconfig::Direction;
    use crate::telemetry::Phase;

    fn test_config(mode_manual: ManualConfig, mode_static: StaticScheduleConfig) -> ControllerConfig {
        ControllerConfig {
            inverters: vec![InverterConfig {
                name: "inv1".to_string(),
                enable: true,
                host: "test".to_string(),
                port: 502,
                connected_phase: Phase::L1,
                battery_charge_limit: 3000,
                battery_discharge_limit: 3000,
            }],
            data_manager: DataManagerConfig { host: "test".to_string(), port: 502, max_fuse_current: 25.0 },
            loop_delay: Duration::from_millis(5),
            modbus_timeout: Duration::from_secs(1),
            modbus_reconnect_delay: Duration::from_secs(1),
            mode_manual,
            mode_static,
        }
    }

    #[test]
    fn dynamic_mode_refuses_construction() {
        let config = test_config(ManualConfig::default(), StaticScheduleConfig::default());
        let err = Controller::new(Mode::Dynamic, config).unwrap_err();
        assert!(matches!(err, FusewattError::Programmer { .. }));
    }

    #[tokio::test]
    async fn idle_controller_runs_one_iteration_then_stops() {
        let config = test_config(ManualConfig::default(), StaticScheduleConfig::default());
        let mut controller = Controller::new(Mode::Idle, config).unwrap();
        let snapshot = controller.snapshot_handle();
        let stop_handle = controller.stop_tx.clone();

        let handle = tokio::spawn(async move { controller.run().await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        let _ = stop_handle.send(true);
        handle.await.unwrap().unwrap();

        let snap = snapshot.lock().unwrap();
        assert!(snap.inverters.contains_key("inv1"));
    }

    #[tokio::test]
    async fn manual_controller_against_dummy_clients_populates_inv_control() {
        let manual = ManualConfig { amount: 1000, direction: Direction::Discharge };
        let config = test_config(manual, StaticScheduleConfig::default());
        let mut controller = Controller::new(Mode::Manual, config).unwrap();
        let snapshot = controller.snapshot_handle();
        let stop_handle = controller.stop_tx.clone();

        let handle = tokio::spawn(async move { controller.run().await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        let _ = stop_handle.send(true);
        handle.await.unwrap().unwrap();

        let snap = snapshot.lock().unwrap();
        assert!(snap.inv_control.contains_key(&Phase::L1));
    }

    #[test]
    fn state_starts_idle() {
        let config = test_config(ManualConfig::default(), StaticScheduleConfig::default());
        let controller = Controller::new(Mode::Idle, config).unwrap();
        assert_eq!(controller.state(), ControllerState::Idle);
    }
}
