//! Contact temperature probes (chamber + intake, DS18B20 on 1-Wire).
//!
//! A DS18B20 conversion takes up to 750 ms at 12-bit resolution.  Rather
//! than block for it, acquisition is split in two:
//!
//! ```text
//!  request() ──▶ Converting{deadline} ──poll_ready(now)──▶ collect()
//!      ▲                                                      │
//!      └────────────── next cadence slot ◀────────────────────┘
//! ```
//!
//! Readings are cached per probe.  The cache is "unknown" until the first
//! valid read, then sticky: a bad read does not replace a good value until
//! the probe has failed `failure_limit` times in a row, at which point the
//! cache drops back to unknown.

use log::{info, warn};

use crate::config::ThermalConfig;
use crate::error::SensorError;
use crate::scheduler::{Deadline, Interval, Millis};

/// Value a DS18B20 reports when it does not answer.
pub const DISCONNECTED_C: f32 = -127.0;

/// A contact probe on the shared bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Chamber,
    Intake,
}

/// Optional Celsius value; `None` means unknown.
pub type TemperatureReading = Option<f32>;

/// Hardware side of the probes.  Implemented by the 1-Wire driver on
/// device and by scripted fakes in tests.
pub trait ProbeBus {
    /// Start a conversion on every probe on the bus (non-blocking).
    fn request_conversion(&mut self) -> Result<(), SensorError>;

    /// Read the last converted value of one probe, in °C.
    fn read_celsius(&mut self, probe: Probe) -> Result<f32, SensorError>;
}

/// Map a raw read onto a reading, folding the sentinel into "unknown".
pub fn normalize(raw: Result<f32, SensorError>) -> TemperatureReading {
    match raw {
        Ok(c) if c.is_finite() && c > DISCONNECTED_C => Some(c),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ProbeCache {
    last_good: Option<f32>,
    consecutive_failures: u8,
}

impl ProbeCache {
    fn update(&mut self, probe: Probe, fresh: TemperatureReading, failure_limit: u8) {
        match fresh {
            Some(c) => {
                if self.consecutive_failures >= failure_limit {
                    info!("{:?} probe recovered ({:.2}°C)", probe, c);
                }
                self.last_good = Some(c);
                self.consecutive_failures = 0;
            }
            None => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if self.consecutive_failures == failure_limit {
                    warn!(
                        "{:?} probe failed {} reads in a row; reading now unknown",
                        probe, failure_limit
                    );
                    self.last_good = None;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Converting(Deadline),
}

/// Drives both contact probes through the convert-then-read cycle.
pub struct TemperatureSampler<B> {
    bus: B,
    phase: Phase,
    cadence: Interval,
    conversion_ms: u32,
    failure_limit: u8,
    chamber: ProbeCache,
    intake: ProbeCache,
}

impl<B: ProbeBus> TemperatureSampler<B> {
    pub fn new(bus: B, config: &ThermalConfig) -> Self {
        Self {
            bus,
            phase: Phase::Idle,
            cadence: Interval::immediate(config.probe_interval_ms),
            conversion_ms: config.probe_conversion_ms,
            failure_limit: config.probe_failure_limit,
            chamber: ProbeCache::default(),
            intake: ProbeCache::default(),
        }
    }

    /// Start a conversion on both probes.  No-op while one is in flight.
    /// Returns `true` if a conversion was started.
    pub fn request(&mut self, now: Millis) -> bool {
        if self.phase != Phase::Idle {
            return false;
        }
        match self.bus.request_conversion() {
            Ok(()) => {
                self.phase = Phase::Converting(Deadline::new(now, self.conversion_ms));
                true
            }
            Err(e) => {
                warn!("probe conversion request failed: {}", e);
                self.chamber.update(Probe::Chamber, None, self.failure_limit);
                self.intake.update(Probe::Intake, None, self.failure_limit);
                false
            }
        }
    }

    /// True once the conversion latency has elapsed.
    pub fn poll_ready(&self, now: Millis) -> bool {
        matches!(self.phase, Phase::Converting(d) if d.is_due(now))
    }

    /// Read both probes.  Only meaningful after [`poll_ready`](Self::poll_ready)
    /// returned `true`; returns the fresh (not cached) readings.
    pub fn collect(&mut self) -> (TemperatureReading, TemperatureReading) {
        debug_assert!(
            matches!(self.phase, Phase::Converting(_)),
            "collect() without a pending conversion"
        );
        self.phase = Phase::Idle;

        let chamber = normalize(self.bus.read_celsius(Probe::Chamber));
        let intake = normalize(self.bus.read_celsius(Probe::Intake));
        self.chamber.update(Probe::Chamber, chamber, self.failure_limit);
        self.intake.update(Probe::Intake, intake, self.failure_limit);
        (chamber, intake)
    }

    /// One scheduler pass: request on cadence, collect when ready.
    /// Returns `true` when a collection happened this pass.
    pub fn step(&mut self, now: Millis) -> bool {
        if self.phase == Phase::Idle && self.cadence.poll(now).is_some() {
            self.request(now);
        }
        if self.poll_ready(now) {
            self.collect();
            return true;
        }
        false
    }

    /// Latest known chamber temperature.
    pub fn chamber(&self) -> TemperatureReading {
        self.chamber.last_good
    }

    /// Latest known intake temperature.
    pub fn intake(&self) -> TemperatureReading {
        self.intake.last_good
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}
