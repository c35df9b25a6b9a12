//! The `PBsent` power solver (§4.4): clamps a requested battery power to the
//! per-phase fuse envelope given current grid and battery flows.

use serde::{Deserialize, Serialize};

/// Inputs to the power solver for a single phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerSolverInput {
    /// Requested battery power, watts; negative = charge, positive = discharge
    pub pb_app: f64,
    /// Currently measured battery AC-side power, watts
    pub pb_now: f64,
    /// Currently measured grid power, watts
    pub pg_now: f64,
    /// Grid voltage, volts (always positive)
    pub vg_now: f64,
    /// Main-fuse current limit, amps (always positive)
    pub imax: f64,
}

/// Full computed result for one phase, matching the `inv_control[phase]` snapshot shape (§3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerSolverResult {
    pub pb_app: f64,
    pub pb_now: f64,
    pub pg_now: f64,
    pub vg_now: f64,
    pub imax: f64,
    pub pg_max: f64,
    pub pg_min: f64,
    pub pother: f64,
    pub pb_lim_min: f64,
    pub pb_lim_max: f64,
    pub pb_sent: i64,
}

/// Compute `PBsent`: the safe charge/discharge amount commandable to the
/// battery inverter given the fuse envelope (§4.4, §8 scenarios 1-3).
pub fn solve(input: PowerSolverInput) -> PowerSolverResult {
    let pg_max = (input.vg_now * input.imax).abs();
    let pg_min = -pg_max;
    let pother = input.pg_now - input.pb_now;
    let pb_lim_min = pg_min - pother;
    let pb_lim_max = pg_max - pother;

    let pb_sent = if input.pb_app < 0.0 {
        input.pb_app.max(pb_lim_min).trunc() as i64
    } else {
        input.pb_app.min(pb_lim_max).trunc() as i64
    };

    PowerSolverResult {
        pb_app: input.pb_app,
        pb_now: input.pb_now,
        pg_now: input.pg_now,
        vg_now: input.vg_now,
        imax: input.imax,
        pg_max,
        pg_min,
        pother,
        pb_lim_min,
        pb_lim_max,
        pb_sent,
    }
}
