//! Manual-mode request derivation (§4.5).

use crate::dynconfig::{Direction, InverterConfig, ManualConfig};
use crate::telemetry::Phase;
use std::collections::HashMap;

/// Derive the per-phase requested power map for manual mode: every phase
/// with at least one enabled inverter gets the single effective request;
/// phases with no inverter get `0`.
pub fn phase_requests(manual: &ManualConfig, inverters: &[InverterConfig]) -> HashMap<Phase, i64> {
    let effective = manual.direction.signed_amount(manual.amount);
    let mut out = HashMap::new();
    for phase in Phase::ALL {
        let has_inverter = inverters.iter().any(|inv| inv.enable && inv.connected_phase == phase);
        out.insert(phase, if has_inverter { effective } else { 0 });
    }
    out
}

/// Inverters (by name) attached to each phase, enabled only.
pub fn phase_inverters(inverters: &[InverterConfig]) -> HashMap<Phase, Vec<String>> {
    let mut out: HashMap<Phase, Vec<String>> = HashMap::new();
    for inv in inverters {
        if inv.enable {
            out.entry(inv.connected_phase).or_default().push(inv.name.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inverter(name: &str, phase: Phase) -> InverterConfig {
        InverterConfig {
            name: name.to_string(),
            enable: true,
            host: "test".to_string(),
            port: 502,
            connected_phase: phase,
            battery_charge_limit: 3000,
            battery_discharge_limit: 3000,
        }
    }

    #[test]
    fn standby_is_zero_on_every_phase() {
        let manual = ManualConfig { amount: 2000, direction: Direction::Standby };
        let inverters = vec![inverter("inv1", Phase::L1)];
        let requests = phase_requests(&manual, &inverters);
        assert_eq!(requests[&Phase::L1], 0);
        assert_eq!(requests[&Phase::L2], 0);
    }

    #[test]
    fn charge_is_negative_only_on_occupied_phases() {
        let manual = ManualConfig { amount: 2000, direction: Direction::Charge };
        let inverters = vec![inverter("inv1", Phase::L2)];
        let requests = phase_requests(&manual, &inverters);
        assert_eq!(requests[&Phase::L1], 0);
        assert_eq!(requests[&Phase::L2], -2000);
        assert_eq!(requests[&Phase::L3], 0);
    }

    #[test]
    fn disabled_inverters_do_not_count_as_occupying_a_phase() {
        let manual = ManualConfig { amount: 1500, direction: Direction::Discharge };
        let mut inv = inverter("inv1", Phase::L3);
        inv.enable = false;
        let requests = phase_requests(&manual, &[inv]);
        assert_eq!(requests[&Phase::L3], 0);
    }

    #[test]
    fn phase_inverters_groups_by_connected_phase() {
        let inverters = vec![inverter("a", Phase::L1), inverter("b", Phase::L1), inverter("c", Phase::L2)];
        let grouped = phase_inverters(&inverters);
        assert_eq!(grouped[&Phase::L1].len(), 2);
        assert_eq!(grouped[&Phase::L2], vec!["c".to_string()]);
        assert!(!grouped.contains_key(&Phase::L3));
    }
}
