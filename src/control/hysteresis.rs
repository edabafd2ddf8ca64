//! Directional-hysteresis vent/fan controller.
//!
//! Thresholds are offsets from the active target.  Each vent family has
//! its own entry and exit thresholds, so a temperature parked between two
//! of them holds the current position instead of toggling:
//!
//! ```text
//!   target + to_closed   target + to_half   target + from_full   target + to_full
//!   ──────────┬──────────────────┬────────────────────┬────────────────────┬──────▶ °C
//!   half→closed        closed→half           full→half      closed|half→full
//! ```
//!
//! Entering half or full fires at or above the threshold and full→half
//! fires at or below it.  Only half→closed is strict, so a reading
//! sitting exactly on `to_closed` holds half.

use serde::Serialize;

use crate::config::ThermalConfig;
use crate::drivers::vent::{VentState, VentTarget};

/// Fan demand issued alongside the vent command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FanCommand {
    Off,
    Low,
    High,
}

impl FanCommand {
    /// Duty for this demand (0–255).
    pub fn duty(self, config: &ThermalConfig) -> u8 {
        match self {
            Self::Off => 0,
            Self::Low => config.fan_low_duty,
            Self::High => config.fan_high_duty,
        }
    }

    fn for_vent(target: VentTarget) -> Self {
        match target {
            VentTarget::Closed => Self::Off,
            VentTarget::Half => Self::Low,
            VentTarget::Full => Self::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThermalCommand {
    pub vent: VentTarget,
    pub fan: FanCommand,
}

/// Band offsets relative to the target (°C).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HysteresisBands {
    pub to_half: f32,
    pub to_closed: f32,
    pub to_full: f32,
    pub from_full: f32,
}

impl HysteresisBands {
    pub fn from_config(config: &ThermalConfig) -> Self {
        Self {
            to_half: config.band_to_half_c,
            to_closed: config.band_to_closed_c,
            to_full: config.band_to_full_c,
            from_full: config.band_from_full_c,
        }
    }
}

impl Default for HysteresisBands {
    fn default() -> Self {
        Self::from_config(&ThermalConfig::default())
    }
}

/// Map a chamber reading to a vent/fan command.
///
/// In-flight vent states count as the family they are heading to, so a
/// command issued mid-travel is judged against the destination.
pub fn evaluate(
    chamber_c: f32,
    target_c: f32,
    vent: VentState,
    bands: &HysteresisBands,
) -> ThermalCommand {
    let reached = |offset: f32| chamber_c >= target_c + offset;

    let next = match vent.target() {
        VentTarget::Closed => {
            if reached(bands.to_full) {
                VentTarget::Full
            } else if reached(bands.to_half) {
                VentTarget::Half
            } else {
                VentTarget::Closed
            }
        }
        VentTarget::Half => {
            if reached(bands.to_full) {
                VentTarget::Full
            } else if chamber_c < target_c + bands.to_closed {
                VentTarget::Closed
            } else {
                VentTarget::Half
            }
        }
        // Never straight to closed: full always steps down through half.
        VentTarget::Full => {
            if chamber_c <= target_c + bands.from_full {
                VentTarget::Half
            } else {
                VentTarget::Full
            }
        }
    };

    ThermalCommand {
        vent: next,
        fan: FanCommand::for_vent(next),
    }
}
