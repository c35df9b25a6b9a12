//! Static-schedule request derivation (§4.5).

use crate::dynconfig::{StaticScheduleConfig, parse_time_of_day};

/// A schedule entry normalised to minutes-since-midnight and a signed watt amount.
#[derive(Debug, Clone, Copy)]
struct NormalizedEntry {
    minute_of_day: u32,
    amount: i64,
}

/// Normalise and sort a schedule's entries by time of day. Entries whose
/// `time_of_day` fails to parse are skipped (validated at write time, but a
/// stale document could predate stricter validation).
fn normalize(schedule: &StaticScheduleConfig) -> Vec<NormalizedEntry> {
    let mut entries: Vec<NormalizedEntry> = schedule
        .schedule
        .iter()
        .filter_map(|entry| {
            let minute_of_day = parse_time_of_day(&entry.time_of_day)?;
            Some(NormalizedEntry { minute_of_day, amount: entry.direction.signed_amount(entry.amount) })
        })
        .collect();
    entries.sort_by_key(|e| e.minute_of_day);
    entries
}

/// Derive the single effective requested power for the given local
/// minute-of-day (§4.5): the amount of the last entry whose time has
/// passed, or the previous day's final entry if none has passed yet today.
/// An empty schedule means idle (`0`).
pub fn effective_amount(schedule: &StaticScheduleConfig, now_minute_of_day: u32) -> i64 {
    let entries = normalize(schedule);
    let Some(last) = entries.last() else {
        return 0;
    };

    entries
        .iter()
        .rev()
        .find(|e| e.minute_of_day <= now_minute_of_day)
        .unwrap_or(last)
        .amount
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynconfig::{Direction, ScheduleEntry};

    fn schedule(entries: &[(&str, Direction, u32)]) -> StaticScheduleConfig {
        StaticScheduleConfig {
            schedule: entries
                .iter()
                .map(|(t, d, a)| ScheduleEntry { time_of_day: t.to_string(), direction: *d, amount: *a })
                .collect(),
        }
    }

    #[test]
    fn empty_schedule_is_idle() {
        let s = StaticScheduleConfig::default();
        assert_eq!(effective_amount(&s, 720), 0);
    }

    #[test]
    fn scenario_6_midday_uses_mornings_charge_entry() {
        let s = schedule(&[("07:00", Direction::Charge, 3000), ("19:00", Direction::Discharge, 2000)]);
        // local time 12:00 -> effective -3000
        assert_eq!(effective_amount(&s, 12 * 60), -3000);
    }

    #[test]
    fn scenario_6_early_morning_carries_over_previous_days_last_entry() {
        let s = schedule(&[("07:00", Direction::Charge, 3000), ("19:00", Direction::Discharge, 2000)]);
        // local time 03:00 -> carry-over from previous day's last entry (+2000)
        assert_eq!(effective_amount(&s, 3 * 60), 2000);
    }

    #[test]
    fn unsorted_input_is_sorted_before_selection() {
        let s = schedule(&[("19:00", Direction::Discharge, 2000), ("07:00", Direction::Charge, 3000)]);
        assert_eq!(effective_amount(&s, 12 * 60), -3000);
    }

    #[test]
    fn standby_entry_yields_zero() {
        let s = schedule(&[("08:00", Direction::Standby, 0)]);
        assert_eq!(effective_amount(&s, 10 * 60), 0);
    }
}
