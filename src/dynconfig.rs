//! Dynamic Config Store (§4.7): the single JSON document that parameterises
//! inverters, the grid meter, mode selection, and the two static/manual mode
//! bodies. Validated before every mutation and persisted atomically so a
//! reader never observes a partially written file.

use crate::error::{FusewattError, Result};
use crate::logging::get_logger;
use crate::telemetry::Phase;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    Idle,
    Manual,
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Standby,
    Charge,
    Discharge,
}

impl Direction {
    /// Effective signed power contribution for a given magnitude (§3, §4.5).
    pub fn signed_amount(self, amount: u32) -> i64 {
        match self {
            Direction::Standby => 0,
            Direction::Charge => -i64::from(amount),
            Direction::Discharge => i64::from(amount),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    pub mode: Mode,
    pub autostart: bool,
    pub debug: bool,
    pub loop_delay_seconds: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { mode: Mode::Idle, autostart: false, debug: false, loop_delay_seconds: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InverterConfig {
    pub name: String,
    pub enable: bool,
    pub host: String,
    pub port: u16,
    pub connected_phase: Phase,
    pub battery_charge_limit: u32,
    pub battery_discharge_limit: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataManagerConfig {
    pub host: String,
    pub port: u16,
    pub max_fuse_current: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManualConfig {
    pub amount: u32,
    pub direction: Direction,
}

impl Default for ManualConfig {
    fn default() -> Self {
        Self { amount: 0, direction: Direction::Standby }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleEntry {
    pub time_of_day: String,
    pub direction: Direction,
    pub amount: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticScheduleConfig {
    pub schedule: Vec<ScheduleEntry>,
}

/// The full persisted document (§6 "Persisted state").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicConfig {
    pub general: GeneralConfig,
    pub inverters: Vec<InverterConfig>,
    pub data_manager: DataManagerConfig,
    pub mode_manual: ManualConfig,
    pub mode_static: StaticScheduleConfig,
    pub mode_dynamic: serde_json::Value,
}

impl Default for DynamicConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            inverters: Vec::new(),
            data_manager: DataManagerConfig::default(),
            mode_manual: ManualConfig::default(),
            mode_static: StaticScheduleConfig::default(),
            mode_dynamic: serde_json::json!({}),
        }
    }
}

/// Owns the dynamic config document on disk, validating every mutation and
/// persisting atomically (write-temp-then-rename).
pub struct ConfigStore {
    path: PathBuf,
    document: DynamicConfig,
    logger: crate::logging::StructuredLogger,
}

impl ConfigStore {
    /// Load the document from `path`, or write and return the defaults if
    /// the file does not exist (§4.7, §8 scenario "bootstrap config fallback"
    /// equivalent for the dynamic document).
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let logger = get_logger("dynconfig");

        let document = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            logger.info("no dynamic config file found, writing defaults");
            DynamicConfig::default()
        };

        let mut store = Self { path, document, logger };
        if !store.path.exists() {
            store.persist()?;
        }
        Ok(store)
    }

    pub fn general(&self) -> &GeneralConfig {
        &self.document.general
    }

    pub fn inverters(&self) -> &[InverterConfig] {
        &self.document.inverters
    }

    pub fn data_manager(&self) -> &DataManagerConfig {
        &self.document.data_manager
    }

    pub fn mode_manual(&self) -> &ManualConfig {
        &self.document.mode_manual
    }

    pub fn mode_static(&self) -> &StaticScheduleConfig {
        &self.document.mode_static
    }

    pub fn mode_dynamic(&self) -> &serde_json::Value {
        &self.document.mode_dynamic
    }

    pub fn document(&self) -> &DynamicConfig {
        &self.document
    }

    pub fn set_general(&mut self, value: GeneralConfig) -> Result<()> {
        Self::validate_general(&value)?;
        self.document.general = value;
        self.persist()
    }

    pub fn set_inverters(&mut self, value: Vec<InverterConfig>) -> Result<()> {
        Self::validate_inverters(&value)?;
        self.document.inverters = value;
        self.persist()
    }

    pub fn set_data_manager(&mut self, value: DataManagerConfig) -> Result<()> {
        self.document.data_manager = value;
        self.persist()
    }

    pub fn set_mode_manual(&mut self, value: ManualConfig) -> Result<()> {
        self.document.mode_manual = value;
        self.persist()
    }

    pub fn set_mode_static(&mut self, value: StaticScheduleConfig) -> Result<()> {
        Self::validate_static_schedule(&value)?;
        self.document.mode_static = value;
        self.persist()
    }

    pub fn set_mode_dynamic(&mut self, value: serde_json::Value) -> Result<()> {
        self.document.mode_dynamic = value;
        self.persist()
    }

    fn validate_general(value: &GeneralConfig) -> Result<()> {
        if value.loop_delay_seconds == 0 {
            return Err(FusewattError::validation(
                "loop_delay_seconds",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    fn validate_inverters(value: &[InverterConfig]) -> Result<()> {
        let mut seen = HashSet::new();
        for inv in value {
            if inv.enable && !seen.insert(inv.name.clone()) {
                return Err(FusewattError::validation(
                    "inverters",
                    format!("duplicate enabled inverter name '{}'", inv.name),
                ));
            }
            if inv.name.trim().is_empty() {
                return Err(FusewattError::validation("inverters", "name must not be empty"));
            }
        }
        Ok(())
    }

    fn validate_static_schedule(value: &StaticScheduleConfig) -> Result<()> {
        for entry in &value.schedule {
            if parse_time_of_day(&entry.time_of_day).is_none() {
                return Err(FusewattError::validation(
                    "mode_static",
                    format!("invalid time_of_day '{}'", entry.time_of_day),
                ));
            }
        }
        Ok(())
    }

    /// Serialise the whole document, write it to a sibling temp file, then
    /// rename it over the target path — the rename is the only observable
    /// state transition (§4.7, §8 "atomic persistence").
    fn persist(&self) -> Result<()> {
        let contents = serde_json::to_string_pretty(&self.document)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, contents)?;
        std::fs::rename(&tmp_path, &self.path)?;
        self.logger.debug("persisted dynamic config");
        Ok(())
    }
}

/// Parse a `HH:MM` time-of-day string into minutes since midnight.
pub fn parse_time_of_day(s: &str) -> Option<u32> {
    let (h, m) = s.split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    if h >= 24 || m >= 60 {
        return None;
    }
    Some(h * 60 + m)
}
