//! # fusewatt - residential battery energy-management controller
//!
//! Drives grid-tied battery inverters and reads a three-phase grid meter over
//! Modbus/TCP, computing fuse-safe power setpoints and exposing mode and
//! schedule management over an HTTP API.
//!
//! ## Architecture
//!
//! - `config`: bootstrap (process-deployment) configuration and validation
//! - `logging`: structured logging with daily-rolling file output
//! - `codec`: Modbus register scaling and decode/encode helpers
//! - `modbus`: Modbus/TCP client fan-out manager
//! - `telemetry`: inverter and grid-meter register reads
//! - `power`: the fuse-safe power solver
//! - `controllers`: Idle/Manual/Static-Schedule control loops
//! - `supervisor`: owns the single active controller, handles mode switches
//! - `dynconfig`: the HTTP-managed dynamic configuration document
//! - `web`: HTTP server and REST API
//! - `error`: the crate's error taxonomy

pub mod codec;
pub mod config;
pub mod controllers;
pub mod dynconfig;
pub mod error;
pub mod logging;
pub mod modbus;
pub mod power;
pub mod supervisor;
pub mod telemetry;
pub mod web;

pub use config::Config;
pub use error::{FusewattError, Result};
pub use supervisor::Supervisor;
