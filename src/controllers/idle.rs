//! Idle-mode register writes (§4.5): reset rendement and mark every
//! inverter inactive, on every iteration.

use crate::error::Result;
use crate::modbus::ModbusManager;

/// Register 40149 (rendement / power setpoint), written as two words.
pub const RENDEMENT_ADDR: u16 = 40149;
/// Register 40151 (inverter control-mode state), written as two words.
pub const STATE_ADDR: u16 = 40151;
/// State code written to 40151 to assume external power control.
pub const STATE_ACTIVE: u16 = 802;
/// State code written to 40151 to relinquish external power control.
pub const STATE_INACTIVE: u16 = 803;

const DEVICE_ID_INVERTER: u8 = 3;

/// Write `40149:=[0,0]` then `40151:=[0,803]` across every inverter, in
/// that order (§4.5, §8 scenario 4).
pub async fn write_idle(inverters: &mut ModbusManager) -> Result<()> {
    inverters.write_all(RENDEMENT_ADDR, &[0, 0], DEVICE_ID_INVERTER).await?;
    inverters.write_all(STATE_ADDR, &[0, STATE_INACTIVE], DEVICE_ID_INVERTER).await?;
    Ok(())
}

/// Mark every inverter as under active external control (Manual/Static
/// setup step 1, §4.5).
pub async fn write_active(inverters: &mut ModbusManager) -> Result<()> {
    inverters.write_all(STATE_ADDR, &[0, STATE_ACTIVE], DEVICE_ID_INVERTER).await
}

/// Best-effort relinquish-control write, swallowing errors (§4.5 "Guaranteed
/// release" — used only by the static-schedule controller on teardown).
pub async fn relinquish_control(inverters: &mut ModbusManager) {
    let _ = inverters.write_all(RENDEMENT_ADDR, &[0, 0], DEVICE_ID_INVERTER).await;
    let _ = inverters.write_all(STATE_ADDR, &[0, STATE_INACTIVE], DEVICE_ID_INVERTER).await;
}
