//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ThermalEngine (domain)
//! ```
//!
//! Driven adapters (sensors, actuators, event sinks, storage) implement these
//! traits.  The [`ThermalEngine`](super::service::ThermalEngine) consumes them
//! via generics, so the domain core never touches hardware directly.
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - **ModeStorePort** loads are range-checked again by the engine; the
//!   store is trusted for availability, not for content.

use crate::config::ThermalConfig;
use crate::drivers::fan::FanOutput;
use crate::drivers::vent::{VentState, VentTarget};
use crate::error::StorageError;
use crate::fsm::context::SensorSnapshot;
use crate::scheduler::Millis;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

pub trait SensorPort {
    /// Advance every sampler and return the latest known values.
    /// Must never block on sensor hardware.
    fn sample(&mut self, now: Millis) -> SensorSnapshot;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

pub trait ActuatorPort {
    /// Start the vent's boot calibration cycle.
    fn begin_calibration(&mut self, now: Millis);

    /// Request a vent position.  `true` if a new transition started.
    fn command_vent(&mut self, target: VentTarget, now: Millis) -> bool;

    /// Advance the vent's timed state.  Returns the stable state reached
    /// when a transition completed during this call.
    fn advance_vent(&mut self, now: Millis) -> Option<VentState>;

    fn vent_state(&self) -> VentState;

    /// Calibration has completed and the vent accepts commands.
    fn vent_ready(&self) -> bool;

    /// Set fan duty (0 hard-kills).  Returns the output actually applied.
    fn set_fan_duty(&mut self, duty: u8, allow_below_minimum: bool) -> FanOutput;

    fn fan_output(&self) -> FanOutput;

    /// Hard reset: fan off and vent closing, regardless of mode.
    fn all_off(&mut self, now: Millis);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Mode store (driven adapter: domain ↔ persisted selection)
// ───────────────────────────────────────────────────────────────

/// Persists the last selected mode and the custom target.
pub trait ModeStorePort {
    /// Stored mode index; `Ok(None)` when idle was stored or nothing was.
    fn load_mode(&self) -> Result<Option<u8>, StorageError>;

    fn load_custom_target(&self) -> Result<Option<f32>, StorageError>;

    /// Persist the mode index, `None` for idle.
    fn save_mode(&mut self, index: Option<u8>) -> Result<(), StorageError>;

    fn save_custom_target(&mut self, target_c: f32) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists [`ThermalConfig`].
///
/// Implementations MUST validate before persisting.  Invalid ranges are
/// rejected with [`StorageError::ValidationFailed`], not clamped.
pub trait ConfigPort {
    /// Load configuration.  `Err(NotFound)` on first boot.
    fn load(&self) -> Result<ThermalConfig, StorageError>;

    /// Validate and persist configuration.
    fn save(&mut self, config: &ThermalConfig) -> Result<(), StorageError>;
}
