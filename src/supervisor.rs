//! Supervisor (§4.6): holds at most one active controller, handles mode
//! switches, start/stop, and exposes status to the HTTP layer.

use crate::controllers::{Controller, ControllerConfig, ControllerHandle, Snapshot};
use crate::dynconfig::{ConfigStore, Mode};
use crate::error::Result;
use crate::logging::get_logger;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

struct ActiveController {
    handle: ControllerHandle,
    join: JoinHandle<Result<()>>,
    started_at: DateTime<Utc>,
}

/// Status returned by `GET /api/` (§4.6, §6).
#[derive(Debug, Clone, serde::Serialize)]
pub struct SupervisorStatus {
    pub status: &'static str,
    pub running: bool,
    pub running_start: Option<DateTime<Utc>>,
    pub mode: Mode,
    pub stats: Option<Snapshot>,
}

/// Owns the single active [`Controller`], constructed from the dynamic
/// config store's current `general.mode`.
pub struct Supervisor {
    store: Arc<Mutex<ConfigStore>>,
    modbus_timeout: Duration,
    modbus_reconnect_delay: Duration,
    active: Option<ActiveController>,
    logger: crate::logging::StructuredLogger,
}

impl Supervisor {
    pub fn new(store: Arc<Mutex<ConfigStore>>, modbus_timeout: Duration, modbus_reconnect_delay: Duration) -> Self {
        Self {
            store,
            modbus_timeout,
            modbus_reconnect_delay,
            active: None,
            logger: get_logger("supervisor"),
        }
    }

    /// Construct and spawn the controller matching `general.mode`, unless
    /// one is already running (§4.6 "start").
    pub async fn start(&mut self) -> Result<()> {
        if self.active.is_some() {
            return Ok(());
        }

        let store = self.store.lock().await;
        let mode = store.general().mode;
        let config = ControllerConfig {
            inverters: store.inverters().to_vec(),
            data_manager: store.data_manager().clone(),
            loop_delay: Duration::from_secs(store.general().loop_delay_seconds),
            modbus_timeout: self.modbus_timeout,
            modbus_reconnect_delay: self.modbus_reconnect_delay,
            mode_manual: store.mode_manual().clone(),
            mode_static: store.mode_static().clone(),
        };
        drop(store);

        self.logger.info(&format!("starting controller in mode {mode:?}"));
        let controller = Controller::new(mode, config)?;
        let (handle, join) = controller.spawn();
        self.active = Some(ActiveController { handle, join, started_at: Utc::now() });
        Ok(())
    }

    /// Stop the active controller and wait for its task to finish (§4.6
    /// "stop"). A no-op if nothing is running.
    pub async fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            self.logger.info("stopping controller");
            active.handle.stop();
            if let Err(e) = active.join.await {
                self.logger.warn(&format!("controller task panicked: {e}"));
            }
        }
    }

    /// Set the supervisor's running target: `true` starts the controller
    /// matching the current mode, `false` stops it.
    pub async fn set_running(&mut self, running: bool) -> Result<()> {
        if running {
            self.start().await
        } else {
            self.stop().await;
            Ok(())
        }
    }

    /// A mode change is a stop-then-start with the new mode already
    /// persisted in the config store (§4.6 "Mode change").
    pub async fn restart_for_mode_change(&mut self) -> Result<()> {
        let was_running = self.active.is_some();
        self.stop().await;
        if was_running {
            self.start().await?;
        }
        Ok(())
    }

    pub fn status(&self) -> SupervisorStatus {
        match &self.active {
            Some(active) => SupervisorStatus {
                status: "ok",
                running: true,
                running_start: Some(active.started_at),
                mode: active.handle.mode(),
                stats: Some(active.handle.snapshot()),
            },
            None => SupervisorStatus { status: "ok", running: false, running_start: None, mode: Mode::Idle, stats: None },
        }
    }
}
