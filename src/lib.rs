//! # Flux Library
//!
//! Internal library for the flux daemon binary.
//!
//! This library exists to enable testing of the engine and driver internals
//! and to keep CLI dispatch (main.rs) separate from application logic.
//!
//! ## Architecture
//!
//! - **Entry Point**: `Flux` struct wires settings, bus, signals and driver together
//! - **Engine**: `flux` module with the pure signal pipeline (moments, windows,
//!   curves, weather, seasons, light types)
//! - **Driver**: `core` module owning runtime state, smoothing and fan-out
//! - **Transport**: `bus` module serving the local message socket
//! - **Configuration**: `config` module for TOML daemon settings
//! - **Infrastructure**: signal handling, time source, logging

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod logger;

pub mod args;
pub mod bus;
pub mod config;
pub mod constants;
pub mod core;
pub mod flux;
pub mod sensor;
pub mod signals;
pub mod time_source;

mod daemon;

pub use daemon::Flux;
