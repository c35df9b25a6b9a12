//! Telemetry collectors (§4.3): fixed SMA register maps for per-inverter
//! battery/AC-side properties and per-phase grid-meter properties.

use crate::codec::{DType, Scaling};
use crate::modbus::ModbusManager;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which house phase an inverter (or a data-manager reading) is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    L1,
    L2,
    L3,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::L1, Phase::L2, Phase::L3];
}

/// Flow direction for an inverter's AC-side power (§3: sign of `ac_side.P`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryFlow {
    #[serde(rename = "no flow")]
    NoFlow,
    Charging,
    Discharging,
}

impl BatteryFlow {
    fn from_power(p: f64) -> Self {
        if p < 0.0 {
            BatteryFlow::Charging
        } else if p > 0.0 {
            BatteryFlow::Discharging
        } else {
            BatteryFlow::NoFlow
        }
    }
}

/// Flow direction for a grid-meter phase (§3: sign of data-manager `P`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridFlow {
    #[serde(rename = "no flow")]
    NoFlow,
    #[serde(rename = "drawing from grid")]
    DrawingFromGrid,
    #[serde(rename = "supplying to grid")]
    SupplyingToGrid,
}

impl GridFlow {
    fn from_power(p: f64) -> Self {
        if p < 0.0 {
            GridFlow::DrawingFromGrid
        } else if p > 0.0 {
            GridFlow::SupplyingToGrid
        } else {
            GridFlow::NoFlow
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BatteryStats {
    #[serde(rename = "A")]
    pub a: f64,
    #[serde(rename = "V")]
    pub v: f64,
    pub status: BatteryFlow,
    pub charge_percent: f64,
    pub temp_low: f64,
    pub temp_high: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AcSideStats {
    #[serde(rename = "A")]
    pub a: f64,
    #[serde(rename = "V")]
    pub v: f64,
    #[serde(rename = "P")]
    pub p: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InverterSnapshot {
    pub phase: Phase,
    pub battery: BatteryStats,
    pub ac_side: AcSideStats,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DataManagerPhaseStats {
    #[serde(rename = "A")]
    pub a: f64,
    pub a_max: f64,
    #[serde(rename = "V")]
    pub v: f64,
    #[serde(rename = "P")]
    pub p: f64,
    pub status: GridFlow,
}

const DEVICE_ID_INVERTER: u8 = 3;
const DEVICE_ID_DATA_MANAGER: u8 = 2;

const TEMP_HIGH_ADDR: u16 = 32221;
const TEMP_LOW_ADDR: u16 = 32227;
const CHARGE_PERCENT_ADDR: u16 = 32233;
const BATTERY_V_ADDR: u16 = 30851;
const BATTERY_A_ADDR: u16 = 30843;

fn phase_registers(phase: Phase) -> (u16, u16, u16) {
    match phase {
        Phase::L1 => (30777, 30783, 30977),
        Phase::L2 => (30779, 30785, 30979),
        Phase::L3 => (30781, 30787, 30981),
    }
}

fn data_manager_registers(phase: Phase) -> (u16, u16, u16) {
    match phase {
        Phase::L1 => (31529, 31535, 31503),
        Phase::L2 => (31531, 31537, 31505),
        Phase::L3 => (31533, 31539, 31507),
    }
}

/// Collect per-inverter battery and AC-side telemetry for every inverter
/// present in `phase_map` (§4.3).
pub async fn battery_stats(
    manager: &mut ModbusManager,
    phase_map: &HashMap<String, Phase>,
) -> Result<HashMap<String, InverterSnapshot>> {
    let temp_high = manager
        .read_all(TEMP_HIGH_ADDR, DType::S32, DEVICE_ID_INVERTER, Some(&Scaling::Temp))
        .await?;
    let temp_low = manager
        .read_all(TEMP_LOW_ADDR, DType::S32, DEVICE_ID_INVERTER, Some(&Scaling::Temp))
        .await?;
    let charge_percent = manager
        .read_all(CHARGE_PERCENT_ADDR, DType::U32, DEVICE_ID_INVERTER, Some(&Scaling::Fix2))
        .await?;
    let battery_v = manager
        .read_all(BATTERY_V_ADDR, DType::U32, DEVICE_ID_INVERTER, Some(&Scaling::Fix2))
        .await?;
    let battery_a = manager
        .read_all(BATTERY_A_ADDR, DType::S32, DEVICE_ID_INVERTER, Some(&Scaling::Fix3))
        .await?;

    let mut out = HashMap::with_capacity(phase_map.len());
    for (name, phase) in phase_map {
        let (Some(th), Some(tl), Some(cp), Some(bv), Some(ba)) = (
            temp_high.get(name),
            temp_low.get(name),
            charge_percent.get(name),
            battery_v.get(name),
            battery_a.get(name),
        ) else {
            continue;
        };

        let (p_addr, v_addr, i_addr) = phase_registers(*phase);
        let p = manager
            .read_one(name, p_addr, DType::S32, DEVICE_ID_INVERTER, Some(&Scaling::Fix0))
            .await?;
        let v = manager
            .read_one(name, v_addr, DType::U32, DEVICE_ID_INVERTER, Some(&Scaling::Fix2))
            .await?;
        let i = manager
            .read_one(name, i_addr, DType::S32, DEVICE_ID_INVERTER, Some(&Scaling::Fix3))
            .await?;
        let p_value = p.as_f64();

        out.insert(
            name.clone(),
            InverterSnapshot {
                phase: *phase,
                battery: BatteryStats {
                    a: ba.as_f64(),
                    v: bv.as_f64(),
                    // charge percent is read as FIX2 then multiplied by 10 (§4.3, §9 open question)
                    status: BatteryFlow::from_power(p_value),
                    charge_percent: cp.as_f64() * 10.0,
                    temp_low: tl.as_f64(),
                    temp_high: th.as_f64(),
                },
                ac_side: AcSideStats { a: i.as_f64(), v: v.as_f64(), p: p_value },
            },
        );
    }

    Ok(out)
}

/// Collect per-phase grid-meter telemetry (§4.3).
pub async fn data_manager_stats(
    manager: &mut ModbusManager,
    max_fuse_current: f64,
) -> Result<HashMap<Phase, DataManagerPhaseStats>> {
    let mut out = HashMap::with_capacity(3);
    for phase in Phase::ALL {
        let (v_addr, i_addr, p_addr) = data_manager_registers(phase);
        let clients = manager.client_names();
        let Some(name) = clients.first() else {
            continue;
        };

        let v = manager
            .read_one(name, v_addr, DType::U32, DEVICE_ID_DATA_MANAGER, Some(&Scaling::Fix2))
            .await?;
        let i = manager
            .read_one(name, i_addr, DType::S32, DEVICE_ID_DATA_MANAGER, Some(&Scaling::Fix3))
            .await?;
        let p = manager
            .read_one(name, p_addr, DType::S32, DEVICE_ID_DATA_MANAGER, Some(&Scaling::Fix0))
            .await?;
        let p_value = p.as_f64();

        out.insert(
            phase,
            DataManagerPhaseStats {
                a: i.as_f64(),
                a_max: max_fuse_current,
                v: v.as_f64(),
                p: p_value,
                status: GridFlow::from_power(p_value),
            },
        );
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn battery_flow_sign_convention() {
        assert_eq!(BatteryFlow::from_power(-1.0), BatteryFlow::Charging);
        assert_eq!(BatteryFlow::from_power(1.0), BatteryFlow::Discharging);
        assert_eq!(BatteryFlow::from_power(0.0), BatteryFlow::NoFlow);
    }

    #[test]
    fn grid_flow_sign_convention() {
        assert_eq!(GridFlow::from_power(-1.0), GridFlow::DrawingFromGrid);
        assert_eq!(GridFlow::from_power(1.0), GridFlow::SupplyingToGrid);
        assert_eq!(GridFlow::from_power(0.0), GridFlow::NoFlow);
    }

    #[test]
    fn phase_register_maps_are_distinct() {
        let l1 = phase_registers(Phase::L1);
        let l2 = phase_registers(Phase::L2);
        let l3 = phase_registers(Phase::L3);
        assert_ne!(l1, l2);
        assert_ne!(l2, l3);
        assert_eq!(l1, (30777, 30783, 30977));
    }

    #[test]
    fn battery_flow_serializes_as_spec_strings() {
        assert_eq!(serde_json::to_string(&BatteryFlow::NoFlow).unwrap(), "\"no flow\"");
        assert_eq!(serde_json::to_string(&GridFlow::DrawingFromGrid).unwrap(), "\"drawing from grid\"");
    }

    #[tokio::test]
    async fn battery_stats_against_dummy_clients_returns_sentinel_derived_values() {
        use crate::modbus::{ClientEndpoint, ModbusManager};
        use std::time::Duration;

        let mut manager = ModbusManager::new(vec![ClientEndpoint {
            name: "inv1".to_string(),
            host: "test".to_string(),
            port: 502,
            timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(10),
        }]);
        manager.connect().await.unwrap();

        let mut phase_map = HashMap::new();
        phase_map.insert("inv1".to_string(), Phase::L1);

        let stats = battery_stats(&mut manager, &phase_map).await.unwrap();
        let snapshot = stats.get("inv1").unwrap();
        assert_eq!(snapshot.phase, Phase::L1);
        // dummy sentinel 12345 decoded as FIX3 -> discharging (positive)
        assert_eq!(snapshot.ac_side.p, 12345.0);
        assert_eq!(snapshot.battery.status, BatteryFlow::Discharging);
    }
}
