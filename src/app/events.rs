//! Outbound engine events.
//!
//! The [`ThermalEngine`](super::service::ThermalEngine) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, refresh a display,
//! serve them on a status endpoint.

use serde::Serialize;

use crate::drivers::vent::VentState;
use crate::error::CommandError;
use crate::fsm::StateId;

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The engine has started (carries initial state).
    Started(StateId),

    /// The FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// Mode selection changed; `None` is idle.
    ModeChanged {
        mode: Option<&'static str>,
        target_c: Option<f32>,
    },

    /// A vent transition started or settled.
    VentChanged(VentState),

    /// Boot calibration finished; external commands are now accepted.
    CalibrationComplete,

    FaultAsserted { differential_c: f32 },
    FaultCleared { differential_c: f32 },

    /// A cooldown sampling window closed.
    CooldownProgress {
        duty: u8,
        rate_c_per_min: f32,
        progress: f32,
        remaining_secs: i32,
    },

    CooldownFinished,

    /// Periodic point-in-time snapshot.
    Status(StatusSnapshot),

    /// A queued command could not be applied.
    CommandRejected(CommandError),
}

/// Point-in-time snapshot for displays and the status endpoint.
///
/// Unknown readings serialize as `null`.  `cooldown_eta_secs` is `-1`
/// while not computable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub engine_state: &'static str,
    pub chamber_c: Option<f32>,
    pub intake_c: Option<f32>,
    pub ambient_c: Option<f32>,
    pub humidity_pct: Option<f32>,
    pub fan_duty_percent: u8,
    pub fan_rpm: Option<u32>,
    pub vent_state: &'static str,
    pub mode: &'static str,
    pub active_target_c: Option<f32>,
    pub fault_active: bool,
    pub cooldown_progress: Option<f32>,
    pub cooldown_eta_secs: Option<i32>,
}

impl StatusSnapshot {
    /// Render as a flat JSON object.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
