//! Application core: pure domain logic, zero I/O.
//!
//! The engine orchestrates fault supervision, the mode state machine and
//! the two controllers.  All interaction with hardware and storage goes
//! through the **port traits** in [`ports`], so this layer is fully
//! testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
