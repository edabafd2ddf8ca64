//! Adaptive cooldown-rate controller.
//!
//! Once per sampling window the measured cooling rate is compared against
//! the target rate and the fan duty is nudged by a fixed step.  The session
//! is exempt from the normal-mode minimum duty: it starts at 0 and may
//! return to 0.
//!
//! ```text
//!  rate < target − tol  →  duty += step
//!  rate > target + tol  →  duty −= step
//!  otherwise            →  hold
//! ```
//!
//! The session finishes once the chamber is within the finish margin of
//! `ambient + offset`.  A finished session stays finished (fan off, vent
//! closed) until the mode is left.

use log::info;

use crate::config::ThermalConfig;
use crate::scheduler::Millis;

/// `remaining_secs` value while no estimate exists.
pub const ETA_UNKNOWN: i32 = -1;

/// Rates at or below this (°C/min) are too small to extrapolate from.
const MIN_ESTIMATE_RATE: f32 = 0.05;

/// Result of one [`CooldownSession::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CooldownStep {
    /// Mid-window, or already finished.
    Hold,
    /// A window closed; duty may have changed.
    Sampled { duty: u8, rate_c_per_min: f32 },
    /// The chamber reached its target during this window.
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CooldownSession {
    pub started_at: Millis,
    pub last_sample_at: Millis,
    pub start_temp_c: f32,
    pub last_temp_c: f32,
    pub duty: u8,
    pub target_c: f32,
    /// 0.0 – 1.0
    pub progress: f32,
    /// Estimated seconds to target, [`ETA_UNKNOWN`] if not computable.
    pub remaining_secs: i32,
    pub finished: bool,
}

/// `ambient + offset`, with the fallback ambient when unknown.
pub fn target_temperature(ambient_c: Option<f32>, config: &ThermalConfig) -> f32 {
    ambient_c.unwrap_or(config.cooldown_fallback_ambient_c) + config.cooldown_ambient_offset_c
}

impl CooldownSession {
    pub fn start(
        now: Millis,
        chamber_c: f32,
        ambient_c: Option<f32>,
        config: &ThermalConfig,
    ) -> Self {
        let target_c = target_temperature(ambient_c, config);
        info!(
            "cooldown: session started at {:.1}°C, target {:.1}°C",
            chamber_c, target_c
        );
        Self {
            started_at: now,
            last_sample_at: now,
            start_temp_c: chamber_c,
            last_temp_c: chamber_c,
            duty: 0,
            target_c,
            progress: 0.0,
            remaining_secs: ETA_UNKNOWN,
            finished: false,
        }
    }

    /// Feed the current chamber reading.  Only acts once a full sampling
    /// window has elapsed since the previous sample.
    pub fn update(
        &mut self,
        now: Millis,
        chamber_c: f32,
        ambient_c: Option<f32>,
        config: &ThermalConfig,
    ) -> CooldownStep {
        if self.finished {
            return CooldownStep::Hold;
        }
        let elapsed_ms = now.saturating_sub(self.last_sample_at);
        if elapsed_ms < u64::from(config.cooldown_window_ms) {
            return CooldownStep::Hold;
        }

        let rate = (self.last_temp_c - chamber_c) * (60_000.0 / elapsed_ms as f32);
        self.target_c = target_temperature(ambient_c, config);

        let wanted = config.cooldown_target_rate_c_per_min;
        let tolerance = config.cooldown_rate_tolerance;
        if rate < wanted - tolerance {
            self.duty = self.duty.saturating_add(config.cooldown_duty_step);
        } else if rate > wanted + tolerance {
            self.duty = self.duty.saturating_sub(config.cooldown_duty_step);
        }

        let span = self.start_temp_c - self.target_c;
        self.progress = if span > 0.0 {
            ((self.start_temp_c - chamber_c) / span).clamp(0.0, 1.0)
        } else {
            1.0
        };

        self.remaining_secs = if rate > MIN_ESTIMATE_RATE {
            ((chamber_c - self.target_c).max(0.0) / rate * 60.0).round() as i32
        } else {
            ETA_UNKNOWN
        };

        self.last_sample_at = now;
        self.last_temp_c = chamber_c;

        if chamber_c <= self.target_c + config.cooldown_finish_margin_c {
            self.finish();
            return CooldownStep::Finished;
        }

        info!(
            "cooldown: {:.1}°C, {:.2}°C/min, duty {}, {:.0}%",
            chamber_c,
            rate,
            self.duty,
            self.progress * 100.0
        );
        CooldownStep::Sampled {
            duty: self.duty,
            rate_c_per_min: rate,
        }
    }

    fn finish(&mut self) {
        info!(
            "cooldown: target {:.1}°C reached after {} s",
            self.target_c,
            self.last_sample_at.saturating_sub(self.started_at) / 1000
        );
        self.duty = 0;
        self.progress = 1.0;
        self.remaining_secs = 0;
        self.finished = true;
    }
}
