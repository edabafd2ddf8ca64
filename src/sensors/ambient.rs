//! Ambient (room air) temperature and humidity probe.
//!
//! The DHT22 takes ~5 ms to clock out a frame and returns garbage if it is
//! polled more often than every two seconds, so it runs on its own slow
//! cadence, entirely decoupled from the contact-probe cycle.  A failed read
//! keeps the previous value; the cached reading is only dropped after
//! `failure_limit` consecutive failures.

use log::{debug, warn};

use crate::config::ThermalConfig;
use crate::error::SensorError;
use crate::scheduler::{Interval, Millis};

/// One ambient sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientReading {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

impl AmbientReading {
    fn is_plausible(&self) -> bool {
        self.temperature_c.is_finite()
            && self.humidity_pct.is_finite()
            && (-40.0..=80.0).contains(&self.temperature_c)
            && (0.0..=100.0).contains(&self.humidity_pct)
    }
}

/// Hardware side of the ambient probe.
pub trait AmbientProbe {
    fn read(&mut self) -> Result<AmbientReading, SensorError>;
}

/// Slow-cadence wrapper around an [`AmbientProbe`].
pub struct AmbientSampler<A> {
    probe: A,
    cadence: Interval,
    failure_limit: u8,
    consecutive_failures: u8,
    last: Option<AmbientReading>,
}

impl<A: AmbientProbe> AmbientSampler<A> {
    pub fn new(probe: A, config: &ThermalConfig) -> Self {
        Self {
            probe,
            cadence: Interval::immediate(config.ambient_interval_ms),
            failure_limit: config.probe_failure_limit,
            consecutive_failures: 0,
            last: None,
        }
    }

    /// Read the probe if its cadence slot is due.  Returns `true` when a
    /// read was attempted.
    pub fn poll(&mut self, now: Millis) -> bool {
        if self.cadence.poll(now).is_none() {
            return false;
        }
        match self.probe.read() {
            Ok(r) if r.is_plausible() => {
                debug!(
                    "ambient: {:.1}°C {:.0}%RH",
                    r.temperature_c, r.humidity_pct
                );
                self.last = Some(r);
                self.consecutive_failures = 0;
            }
            Ok(r) => self.record_failure(&format_args!("implausible {:?}", r)),
            Err(e) => self.record_failure(&e),
        }
        true
    }

    fn record_failure(&mut self, why: &dyn core::fmt::Display) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        warn!(
            "ambient read failed ({}), {} in a row",
            why, self.consecutive_failures
        );
        if self.consecutive_failures >= self.failure_limit {
            self.last = None;
        }
    }

    pub fn temperature(&self) -> Option<f32> {
        self.last.map(|r| r.temperature_c)
    }

    pub fn humidity(&self) -> Option<f32> {
        self.last.map(|r| r.humidity_pct)
    }

    pub fn probe_mut(&mut self) -> &mut A {
        &mut self.probe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted(Result<AmbientReading, SensorError>, u32);

    impl AmbientProbe for Scripted {
        fn read(&mut self) -> Result<AmbientReading, SensorError> {
            self.1 += 1;
            self.0
        }
    }

    const ROOM: AmbientReading = AmbientReading {
        temperature_c: 23.5,
        humidity_pct: 41.0,
    };

    #[test]
    fn reads_once_per_cadence() {
        let mut s = AmbientSampler::new(Scripted(Ok(ROOM), 0), &ThermalConfig::default());
        assert!(s.poll(0));
        assert!(!s.poll(1_000));
        assert!(!s.poll(4_999));
        assert!(s.poll(5_000));
        assert_eq!(s.probe_mut().1, 2);
        assert_eq!(s.temperature(), Some(23.5));
        assert_eq!(s.humidity(), Some(41.0));
    }

    #[test]
    fn failures_keep_last_value_until_limit() {
        let cfg = ThermalConfig::default();
        let mut s = AmbientSampler::new(Scripted(Ok(ROOM), 0), &cfg);
        s.poll(0);
        s.probe_mut().0 = Err(SensorError::ChecksumMismatch);

        let period = u64::from(cfg.ambient_interval_ms);
        for i in 1..u64::from(cfg.probe_failure_limit) {
            s.poll(i * period);
            assert_eq!(s.temperature(), Some(23.5));
        }
        s.poll(u64::from(cfg.probe_failure_limit) * period);
        assert_eq!(s.temperature(), None);
    }

    #[test]
    fn implausible_frame_is_a_failure() {
        let bad = AmbientReading {
            temperature_c: 23.0,
            humidity_pct: 140.0,
        };
        let mut s = AmbientSampler::new(Scripted(Ok(bad), 0), &ThermalConfig::default());
        s.poll(0);
        assert_eq!(s.humidity(), None);
    }
}
