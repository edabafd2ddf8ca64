//! Timed vent actuator (continuous-rotation servo, open loop).
//!
//! The vent has no position feedback.  Position is inferred purely from how
//! long the motor was driven in which direction:
//!
//! ```text
//!            open(half) T_half            open(full) T_open
//!  CLOSED ─────────────▶ OPENING_HALF ─▶ HALF_OPEN ─────▶ OPENING_FULL ─▶ FULL_OPEN
//!    ▲                        ▲                                              │
//!    │                        └──────── open(half) T_full_to_half ───────────┤
//!    │                                                                       │
//!    └──────────── CLOSING ◀──────────── close() T_close ◀───────────────────┘
//! ```
//!
//! Every transition start writes a stop pulse and then the directional
//! pulse.  `tick` completes an in-flight transition once its deadline has
//! passed and re-asserts stop.
//!
//! Because timing drifts, a calibration cycle (close, pause, open, pause,
//! close, pause) establishes a known position at boot.  No external
//! command is accepted until it has finished.

use embedded_hal::pwm::SetDutyCycle;
use log::{debug, info, warn};
use serde::Serialize;

use crate::config::ThermalConfig;
use crate::error::ActuatorError;
use crate::scheduler::{Deadline, Millis};

/// Motor drive output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VentDrive {
    Stop,
    Open,
    Close,
}

/// Anything that can turn the vent motor.
pub trait VentMotor {
    fn drive(&mut self, drive: VentDrive) -> Result<(), ActuatorError>;
}

/// Requested vent position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VentTarget {
    Closed,
    Half,
    Full,
}

/// Current vent state.  In-flight states carry the deadline of the
/// transition they are executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VentState {
    Closed,
    OpeningHalf(Deadline),
    HalfOpen,
    OpeningFull(Deadline),
    FullOpen,
    Closing(Deadline),
}

impl VentState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Closed => "Closed",
            Self::OpeningHalf(_) => "OpeningHalf",
            Self::HalfOpen => "HalfOpen",
            Self::OpeningFull(_) => "OpeningFull",
            Self::FullOpen => "FullOpen",
            Self::Closing(_) => "Closing",
        }
    }

    pub fn deadline(&self) -> Option<Deadline> {
        match *self {
            Self::OpeningHalf(d) | Self::OpeningFull(d) | Self::Closing(d) => Some(d),
            _ => None,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.deadline().is_some()
    }

    /// The position this state is at or heading to.
    pub fn target(&self) -> VentTarget {
        match self {
            Self::Closed | Self::Closing(_) => VentTarget::Closed,
            Self::HalfOpen | Self::OpeningHalf(_) => VentTarget::Half,
            Self::FullOpen | Self::OpeningFull(_) => VentTarget::Full,
        }
    }

    /// Stable state an in-flight state settles into.
    fn settled(self) -> Self {
        match self {
            Self::OpeningHalf(_) => Self::HalfOpen,
            Self::OpeningFull(_) => Self::FullOpen,
            Self::Closing(_) => Self::Closed,
            stable => stable,
        }
    }
}

/// Travel times, all in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VentTimings {
    pub open_ms: u32,
    pub half_ms: u32,
    pub full_to_half_ms: u32,
    pub close_ms: u32,
    pub calibration_pause_ms: u32,
}

impl VentTimings {
    pub fn from_config(config: &ThermalConfig) -> Self {
        Self {
            open_ms: config.vent_open_ms,
            half_ms: config.vent_half_ms,
            full_to_half_ms: config.vent_full_to_half_ms,
            close_ms: config.vent_close_ms,
            calibration_pause_ms: config.vent_calibration_pause_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CalibrationStep {
    Close,
    SettleClosed,
    Open,
    SettleOpen,
    Reclose,
    SettleFinal,
}

#[derive(Debug, Clone, Copy)]
struct Calibration {
    step: CalibrationStep,
    deadline: Deadline,
}

pub struct VentActuator<M> {
    motor: M,
    timings: VentTimings,
    state: VentState,
    calibration: Option<Calibration>,
    calibrated: bool,
    /// Directional pulses issued since construction.
    pulses: u32,
}

impl<M: VentMotor> VentActuator<M> {
    /// The vent starts uncalibrated; its state reads `Closed` but the
    /// physical position is unknown until [`begin_calibration`] finishes.
    ///
    /// [`begin_calibration`]: Self::begin_calibration
    pub fn new(motor: M, timings: VentTimings) -> Self {
        Self {
            motor,
            timings,
            state: VentState::Closed,
            calibration: None,
            calibrated: false,
            pulses: 0,
        }
    }

    /// Start the boot calibration cycle.  No-op if one is already running.
    pub fn begin_calibration(&mut self, now: Millis) {
        if self.calibration.is_some() {
            return;
        }
        info!("vent: calibration started");
        self.calibrated = false;
        let deadline = self.start_motion(now, VentTarget::Closed, VentDrive::Close, self.timings.close_ms);
        self.calibration = Some(Calibration {
            step: CalibrationStep::Close,
            deadline,
        });
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibration.is_some()
    }

    /// Request a position.  Returns `true` if a new transition started.
    ///
    /// Idempotent: a request for the position the vent is already at or
    /// already moving toward does nothing.  Ignored until calibrated.
    pub fn command(&mut self, target: VentTarget, now: Millis) -> bool {
        if !self.calibrated {
            debug!("vent: {:?} ignored, not calibrated", target);
            return false;
        }

        let t = self.timings;
        let plan = match (target, self.state) {
            (VentTarget::Full, VentState::FullOpen | VentState::OpeningFull(_)) => None,
            (VentTarget::Full, _) => Some((VentDrive::Open, t.open_ms)),

            (VentTarget::Half, VentState::HalfOpen | VentState::OpeningHalf(_)) => None,
            (VentTarget::Half, VentState::Closed | VentState::Closing(_)) => {
                Some((VentDrive::Open, t.half_ms))
            }
            (VentTarget::Half, VentState::FullOpen) => Some((VentDrive::Close, t.full_to_half_ms)),
            // Travel toward full has no known midpoint; settle first.  The
            // regulator repeats the request every tick, so it lands on the
            // first tick after full open while the fan already runs at the
            // half duty.
            (VentTarget::Half, VentState::OpeningFull(_)) => None,

            (VentTarget::Closed, VentState::Closed | VentState::Closing(_)) => None,
            (VentTarget::Closed, _) => Some((VentDrive::Close, t.close_ms)),
        };

        let Some((drive, duration_ms)) = plan else {
            return false;
        };
        let from = self.state;
        self.start_motion(now, target, drive, duration_ms);
        info!("vent: {} -> {}", from.label(), self.state.label());
        true
    }

    /// Advance timed transitions and calibration.  Returns the stable state
    /// reached when a transition completed during this call.
    pub fn tick(&mut self, now: Millis) -> Option<VentState> {
        if let Some(cal) = self.calibration {
            return self.tick_calibration(cal, now);
        }

        let deadline = self.state.deadline()?;
        if !deadline.is_due(now) {
            return None;
        }
        self.settle();
        info!("vent: settled {}", self.state.label());
        Some(self.state)
    }

    pub fn state(&self) -> VentState {
        self.state
    }

    pub fn pulse_count(&self) -> u32 {
        self.pulses
    }

    pub fn motor_mut(&mut self) -> &mut M {
        &mut self.motor
    }

    // ── Internal ──────────────────────────────────────────────

    fn tick_calibration(&mut self, cal: Calibration, now: Millis) -> Option<VentState> {
        if !cal.deadline.is_due(now) {
            return None;
        }
        let t = self.timings;
        let pause = Deadline::new(now, t.calibration_pause_ms);

        let (next, settled) = match cal.step {
            CalibrationStep::Close => {
                self.settle();
                (Some((CalibrationStep::SettleClosed, pause)), true)
            }
            CalibrationStep::SettleClosed => {
                let d = self.start_motion(now, VentTarget::Full, VentDrive::Open, t.open_ms);
                (Some((CalibrationStep::Open, d)), false)
            }
            CalibrationStep::Open => {
                self.settle();
                (Some((CalibrationStep::SettleOpen, pause)), true)
            }
            CalibrationStep::SettleOpen => {
                let d = self.start_motion(now, VentTarget::Closed, VentDrive::Close, t.close_ms);
                (Some((CalibrationStep::Reclose, d)), false)
            }
            CalibrationStep::Reclose => {
                self.settle();
                (Some((CalibrationStep::SettleFinal, pause)), true)
            }
            CalibrationStep::SettleFinal => (None, false),
        };

        match next {
            Some((step, deadline)) => {
                debug!("vent: calibration step {:?}", step);
                self.calibration = Some(Calibration { step, deadline });
            }
            None => {
                self.calibration = None;
                self.calibrated = true;
                info!("vent: calibration complete, position {}", self.state.label());
            }
        }
        settled.then_some(self.state)
    }

    /// Stop pulse, directional pulse, then record the in-flight state.
    fn start_motion(
        &mut self,
        now: Millis,
        target: VentTarget,
        drive: VentDrive,
        duration_ms: u32,
    ) -> Deadline {
        self.write(VentDrive::Stop);
        self.write(drive);
        self.pulses = self.pulses.wrapping_add(1);

        let deadline = Deadline::new(now, duration_ms);
        self.state = match target {
            VentTarget::Closed => VentState::Closing(deadline),
            VentTarget::Half => VentState::OpeningHalf(deadline),
            VentTarget::Full => VentState::OpeningFull(deadline),
        };
        deadline
    }

    fn settle(&mut self) {
        self.state = self.state.settled();
        self.write(VentDrive::Stop);
    }

    fn write(&mut self, drive: VentDrive) {
        if let Err(e) = self.motor.drive(drive) {
            warn!("vent: {:?} failed: {}", drive, e);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Servo motor on a PWM channel
// ───────────────────────────────────────────────────────────────

/// Standard hobby-servo frame.
const SERVO_PERIOD_US: u32 = 20_000;
const SERVO_STOP_US: u32 = 1_500;
const SERVO_OPEN_US: u32 = 2_000;
const SERVO_CLOSE_US: u32 = 1_000;

/// Continuous-rotation servo: 1.5 ms = stop, longer pulses turn one way,
/// shorter pulses the other.
pub struct ServoVentMotor<P> {
    pwm: P,
}

impl<P: SetDutyCycle> ServoVentMotor<P> {
    pub fn new(pwm: P) -> Self {
        Self { pwm }
    }

    fn duty_for(&self, pulse_us: u32) -> u16 {
        (u32::from(self.pwm.max_duty_cycle()) * pulse_us / SERVO_PERIOD_US) as u16
    }

    pub fn pwm(&self) -> &P {
        &self.pwm
    }
}

impl<P: SetDutyCycle> VentMotor for ServoVentMotor<P> {
    fn drive(&mut self, drive: VentDrive) -> Result<(), ActuatorError> {
        let pulse_us = match drive {
            VentDrive::Stop => SERVO_STOP_US,
            VentDrive::Open => SERVO_OPEN_US,
            VentDrive::Close => SERVO_CLOSE_US,
        };
        let duty = self.duty_for(pulse_us);
        self.pwm
            .set_duty_cycle(duty)
            .map_err(|_| ActuatorError::PwmWriteFailed)
    }
}
