//! Driver library for Gossen MAVO photometers.
//!
//! This library talks to MAVOLUX, MAVOMONITOR and MAVO SPOT2 instruments over
//! their RS-232 interface. It contains the line transports, the query engine
//! with device error accounting, and the session type exposing the instrument's
//! command set. It is used by the `mavo_daq` measurement binary.

pub mod adapters;
pub mod config;
pub mod error;
pub mod instrument;

pub use config::MavoConfig;
pub use error::{AppResult, MavoError};
pub use instrument::{Mavo, ReactionPolicy};
