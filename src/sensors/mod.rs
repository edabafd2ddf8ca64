//! Sensor subsystem: individual samplers and the aggregating [`SensorHub`].
//!
//! The hub owns every sampler and produces a [`SensorSnapshot`] each tick
//! that gets written into `ThermalContext.sensors`.  Each sampler runs on
//! its own cadence; the snapshot always carries the latest cached values.

pub mod ambient;
pub mod tach;
pub mod temperature;

use crate::config::ThermalConfig;
use crate::fsm::context::SensorSnapshot;
use crate::scheduler::Millis;
use ambient::{AmbientProbe, AmbientSampler};
use tach::{PulseCounter, TachCounter};
use temperature::{ProbeBus, TemperatureSampler};

/// Aggregates all samplers and produces a unified snapshot.
pub struct SensorHub<B, A> {
    pub temperature: TemperatureSampler<B>,
    pub ambient: AmbientSampler<A>,
    pub tach: TachCounter,
}

impl<B: ProbeBus, A: AmbientProbe> SensorHub<B, A> {
    /// Construct a new hub.  Drivers are built in `main` where peripheral
    /// ownership is established.
    pub fn new(
        probes: B,
        ambient: A,
        tach_source: &'static PulseCounter,
        config: &ThermalConfig,
    ) -> Self {
        Self {
            temperature: TemperatureSampler::new(probes, config),
            ambient: AmbientSampler::new(ambient, config),
            tach: TachCounter::new(
                tach_source,
                config.tach_window_ms,
                config.tach_pulses_per_rev,
            ),
        }
    }

    /// Advance every sampler and return the latest known values.
    ///
    /// Individual read failures are contained inside each sampler; a flaky
    /// probe shows up as `None`, never as an error out of the loop.
    pub fn read_all(&mut self, now: Millis) -> SensorSnapshot {
        self.temperature.step(now);
        self.ambient.poll(now);
        self.tach.poll(now);

        SensorSnapshot {
            chamber_c: self.temperature.chamber(),
            intake_c: self.temperature.intake(),
            ambient_c: self.ambient.temperature(),
            humidity_pct: self.ambient.humidity(),
            fan_rpm: self.tach.rpm(),
        }
    }
}
