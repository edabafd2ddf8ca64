//! Exhaust fan driver: PWM duty plus a hard-kill power line.
//!
//! A 4-wire PC fan keeps spinning slowly at 0 % PWM, so "off" is enforced
//! by cutting its supply through a high-side switch.
//!
//! ## Output contract
//!
//! - duty > 0  ⇒ power line enabled, enabled *before* the duty is written
//! - duty == 0 ⇒ PWM forced to 0 first, then power cut
//! - no nonzero duty is ever written while power is cut
//! - unless the caller opts out, nonzero requests are raised to the
//!   configured minimum duty

use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;
use log::{debug, warn};
use serde::Serialize;

use crate::error::ActuatorError;

/// What the fan hardware is actually doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FanOutput {
    /// Duty byte, 0–255.
    pub duty: u8,
    /// `false` = hard-kill asserted (supply cut).
    pub power_enabled: bool,
}

impl FanOutput {
    pub const OFF: Self = Self {
        duty: 0,
        power_enabled: false,
    };

    /// Duty as a whole percentage.
    pub fn duty_percent(&self) -> u8 {
        ((u16::from(self.duty) * 100 + 127) / 255) as u8
    }
}

/// Compute the duty the fan should run at for a request.
pub fn effective_duty(requested: u8, allow_below_minimum: bool, min_duty: u8) -> u8 {
    if requested == 0 || allow_below_minimum {
        requested
    } else {
        requested.max(min_duty)
    }
}

pub struct FanActuator<P, K> {
    pwm: P,
    power: K,
    min_duty: u8,
    output: FanOutput,
}

impl<P: SetDutyCycle, K: OutputPin> FanActuator<P, K> {
    /// Takes ownership of the pins and forces them to the off state.
    pub fn new(pwm: P, power: K, min_duty: u8) -> Self {
        let mut fan = Self {
            pwm,
            power,
            min_duty,
            // Force the first write to touch both lines.
            output: FanOutput {
                duty: 1,
                power_enabled: true,
            },
        };
        fan.set_duty(0, true);
        fan
    }

    /// Request a duty (0–255).  0 hard-kills regardless of the flag.
    pub fn set_duty(&mut self, duty: u8, allow_below_minimum: bool) -> FanOutput {
        let duty = effective_duty(duty, allow_below_minimum, self.min_duty);
        if duty == self.output.duty && self.output.power_enabled == (duty > 0) {
            return self.output;
        }

        if duty == 0 {
            self.write_pwm(0);
            self.write_power(false);
        } else {
            if !self.output.power_enabled {
                self.write_power(true);
            }
            self.write_pwm(duty);
        }

        debug!("fan: duty {} -> {}", self.output.duty, duty);
        self.output = FanOutput {
            duty,
            power_enabled: duty > 0,
        };
        self.output
    }

    pub fn output(&self) -> FanOutput {
        self.output
    }

    pub fn min_duty(&self) -> u8 {
        self.min_duty
    }

    pub fn pins(&self) -> (&P, &K) {
        (&self.pwm, &self.power)
    }

    fn write_pwm(&mut self, duty: u8) {
        if let Err(e) = self
            .pwm
            .set_duty_cycle_fraction(u16::from(duty), 255)
            .map_err(|_| ActuatorError::PwmWriteFailed)
        {
            warn!("fan: {}", e);
        }
    }

    fn write_power(&mut self, on: bool) {
        let res = if on {
            self.power.set_high()
        } else {
            self.power.set_low()
        };
        if res.is_err() {
            warn!("fan: {}", ActuatorError::GpioWriteFailed);
        }
    }
}
