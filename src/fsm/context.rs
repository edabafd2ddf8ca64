//! Shared mutable context threaded through every FSM handler.
//!
//! `ThermalContext` is the single struct that state handlers read from and
//! write to.  It carries the latest sensor snapshot, the vent position and
//! fan duty as last reported by the actuators, the active mode and cooldown
//! session, the fault flag, and the actuator commands produced this tick.
//! Think of it as the "blackboard" in a blackboard architecture.

use crate::config::ThermalConfig;
use crate::control::cooldown::{CooldownSession, CooldownStep};
use crate::drivers::vent::{VentState, VentTarget};
use crate::modes::ActiveMode;
use crate::scheduler::Millis;

// ---------------------------------------------------------------------------
// Sensor snapshot (read-only to state handlers; written by the sensor hub)
// ---------------------------------------------------------------------------

/// Latest known value of every sensor.  `None` means unknown: never
/// read, failed, or judged disconnected.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorSnapshot {
    pub chamber_c: Option<f32>,
    pub intake_c: Option<f32>,
    pub ambient_c: Option<f32>,
    pub humidity_pct: Option<f32>,
    /// From the most recent complete tachometer window.
    pub fan_rpm: Option<u32>,
}

// ---------------------------------------------------------------------------
// Actuator commands (written by state handlers; applied by the service)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanDemand {
    pub duty: u8,
    /// Bypass the minimum-duty floor (cooldown only).
    pub allow_below_minimum: bool,
}

/// What the handlers want the actuators to do this tick.  `None` leaves
/// the actuator where it is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActuatorCommands {
    pub vent: Option<VentTarget>,
    pub fan: Option<FanDemand>,
}

impl ActuatorCommands {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

// ---------------------------------------------------------------------------
// ThermalContext
// ---------------------------------------------------------------------------

pub struct ThermalContext {
    // -- Timing --
    /// Monotonic time of the current tick.
    pub now_ms: Millis,

    // -- Inputs --
    pub sensors: SensorSnapshot,
    /// Mirror of the vent actuator, refreshed before every FSM tick.
    pub vent_state: VentState,
    /// Startup calibration has completed.
    pub vent_ready: bool,
    /// Duty the fan actuator last applied.
    pub fan_duty: u8,

    // -- Outputs --
    pub commands: ActuatorCommands,

    // -- Configuration --
    pub config: ThermalConfig,

    // -- Safety --
    /// Intake fault asserted.  Set by the fault monitor.
    pub fault_active: bool,

    // -- Mode --
    pub mode: Option<ActiveMode>,
    pub custom_target_c: f32,
    /// Survives a fault overlay; cleared by the service when the mode
    /// is changed or exited.
    pub cooldown: Option<CooldownSession>,
    /// What the cooldown controller did this tick, for event reporting.
    pub cooldown_step: Option<CooldownStep>,
}

impl ThermalContext {
    pub fn new(config: ThermalConfig) -> Self {
        Self {
            now_ms: 0,
            sensors: SensorSnapshot::default(),
            vent_state: VentState::Closed,
            vent_ready: false,
            fan_duty: 0,
            commands: ActuatorCommands::default(),
            config,
            fault_active: false,
            mode: None,
            custom_target_c: crate::modes::DEFAULT_CUSTOM_TARGET_C,
            cooldown: None,
            cooldown_step: None,
        }
    }

    /// Regulation target of the active mode, if it has one.
    pub fn active_target(&self) -> Option<f32> {
        self.mode.and_then(|m| m.target(self.custom_target_c))
    }

    pub fn command_vent(&mut self, target: VentTarget) {
        self.commands.vent = Some(target);
    }

    pub fn command_fan(&mut self, duty: u8, allow_below_minimum: bool) {
        self.commands.fan = Some(FanDemand {
            duty,
            allow_below_minimum,
        });
    }
}
