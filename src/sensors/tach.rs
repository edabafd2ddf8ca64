//! Fan tachometer pulse counter.
//!
//! The fan's open-collector tach output pulls low twice per revolution.  A
//! GPIO ISR increments an atomic counter on each falling edge and does
//! nothing else; the control loop drains the counter once per sampling
//! window to compute RPM.
//!
//! The counter is the only state shared with interrupt context.  `record`
//! is its only producer-side operation and `drain` its only consumer-side
//! one: an atomic swap to zero, so a pulse landing mid-drain is counted in
//! exactly one window.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::scheduler::{Interval, Millis};

/// Interrupt-fed pulse accumulator.
pub struct PulseCounter {
    pulses: AtomicU32,
}

impl PulseCounter {
    pub const fn new() -> Self {
        Self {
            pulses: AtomicU32::new(0),
        }
    }

    /// Called from the GPIO ISR on each tach edge.
    /// Lock-free, safe to call from interrupt context.
    #[inline]
    pub fn record(&self) {
        self.pulses.fetch_add(1, Ordering::Relaxed);
    }

    /// Read and reset in one atomic step.
    pub fn drain(&self) -> u32 {
        self.pulses.swap(0, Ordering::AcqRel)
    }
}

impl Default for PulseCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Global counter for the exhaust fan.  `static` because ISR callbacks in
/// ESP-IDF cannot capture closures.
pub static FAN_TACH_PULSES: PulseCounter = PulseCounter::new();

/// Called from the tach GPIO ISR.
pub fn fan_tach_isr_handler() {
    FAN_TACH_PULSES.record();
}

/// Pulses counted over one sampling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanRpmSample {
    pub pulses: u32,
    pub elapsed_ms: u64,
}

impl FanRpmSample {
    /// `pulses × (60 / window_s) / pulses_per_rev`.
    pub fn rpm(&self, pulses_per_rev: u8) -> u32 {
        if self.elapsed_ms == 0 || pulses_per_rev == 0 {
            return 0;
        }
        let per_minute = u64::from(self.pulses) * 60_000 / self.elapsed_ms;
        (per_minute / u64::from(pulses_per_rev)) as u32
    }
}

/// Windowed consumer of a [`PulseCounter`].
pub struct TachCounter {
    source: &'static PulseCounter,
    window: Interval,
    pulses_per_rev: u8,
    last_rpm: Option<u32>,
}

impl TachCounter {
    pub fn new(source: &'static PulseCounter, window_ms: u32, pulses_per_rev: u8) -> Self {
        Self {
            source,
            window: Interval::immediate(window_ms),
            pulses_per_rev,
            last_rpm: None,
        }
    }

    /// Drain the counter once the window has elapsed and refresh the RPM
    /// estimate.  Returns the sample that was consumed, if any.
    pub fn poll(&mut self, now: Millis) -> Option<FanRpmSample> {
        let elapsed_ms = self.window.poll(now)?;
        let pulses = self.source.drain();
        if elapsed_ms == 0 {
            // Priming poll: discard whatever accumulated before the first
            // window so the first estimate covers a full window.
            return None;
        }
        let sample = FanRpmSample { pulses, elapsed_ms };
        self.last_rpm = Some(sample.rpm(self.pulses_per_rev));
        Some(sample)
    }

    /// Latest RPM estimate (`None` until the first full window).
    pub fn rpm(&self) -> Option<u32> {
        self.last_rpm
    }
}
