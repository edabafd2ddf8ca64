//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the [`SensorHub`] and both actuator drivers, exposing them
//! through [`SensorPort`] and [`ActuatorPort`].  Generic over the
//! `embedded-hal` types so the same adapter runs on the ESP32 pin
//! wrappers and on host-side mocks.

use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;

use crate::app::ports::{ActuatorPort, SensorPort};
use crate::drivers::fan::{FanActuator, FanOutput};
use crate::drivers::vent::{VentActuator, VentMotor, VentState, VentTarget};
use crate::fsm::context::SensorSnapshot;
use crate::scheduler::Millis;
use crate::sensors::ambient::AmbientProbe;
use crate::sensors::temperature::ProbeBus;
use crate::sensors::SensorHub;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<B, A, M, P, K> {
    sensor_hub: SensorHub<B, A>,
    vent: VentActuator<M>,
    fan: FanActuator<P, K>,
}

impl<B, A, M, P, K> HardwareAdapter<B, A, M, P, K>
where
    B: ProbeBus,
    A: AmbientProbe,
    M: VentMotor,
    P: SetDutyCycle,
    K: OutputPin,
{
    pub fn new(sensor_hub: SensorHub<B, A>, vent: VentActuator<M>, fan: FanActuator<P, K>) -> Self {
        Self {
            sensor_hub,
            vent,
            fan,
        }
    }

    pub fn sensors_mut(&mut self) -> &mut SensorHub<B, A> {
        &mut self.sensor_hub
    }

    pub fn vent(&self) -> &VentActuator<M> {
        &self.vent
    }

    pub fn vent_mut(&mut self) -> &mut VentActuator<M> {
        &mut self.vent
    }

    pub fn fan(&self) -> &FanActuator<P, K> {
        &self.fan
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<B, A, M, P, K> SensorPort for HardwareAdapter<B, A, M, P, K>
where
    B: ProbeBus,
    A: AmbientProbe,
{
    fn sample(&mut self, now: Millis) -> SensorSnapshot {
        self.sensor_hub.read_all(now)
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl<B, A, M, P, K> ActuatorPort for HardwareAdapter<B, A, M, P, K>
where
    M: VentMotor,
    P: SetDutyCycle,
    K: OutputPin,
{
    fn begin_calibration(&mut self, now: Millis) {
        self.vent.begin_calibration(now);
    }

    fn command_vent(&mut self, target: VentTarget, now: Millis) -> bool {
        self.vent.command(target, now)
    }

    fn advance_vent(&mut self, now: Millis) -> Option<VentState> {
        self.vent.tick(now)
    }

    fn vent_state(&self) -> VentState {
        self.vent.state()
    }

    fn vent_ready(&self) -> bool {
        self.vent.is_calibrated()
    }

    fn set_fan_duty(&mut self, duty: u8, allow_below_minimum: bool) -> FanOutput {
        self.fan.set_duty(duty, allow_below_minimum)
    }

    fn fan_output(&self) -> FanOutput {
        self.fan.output()
    }

    fn all_off(&mut self, now: Millis) {
        self.fan.set_duty(0, true);
        self.vent.command(VentTarget::Closed, now);
    }
}
