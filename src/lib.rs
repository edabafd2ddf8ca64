//! Chamberctl firmware library.
//!
//! Exposes the pure-logic modules for integration testing and host-side
//! simulation.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod fsm;
pub mod modes;
pub mod pins;
pub mod safety;
pub mod scheduler;

// Hardware-facing layers.  Each carries a host simulation path so the
// crate compiles and tests off-target.
pub mod adapters;
pub mod drivers;
pub mod sensors;

#[cfg(target_os = "espidf")]
mod esp_link_shims;
