//! System configuration parameters
//!
//! All tunable parameters for the chamber controller.
//! Values can be overridden via NVS (non-volatile storage).

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalConfig {
    // --- Vent actuator (open-loop, timed) ---
    /// Closed (or half) to fully open travel time (ms)
    pub vent_open_ms: u32,
    /// Closed to half-open travel time (ms)
    pub vent_half_ms: u32,
    /// Fully open back to half-open travel time (ms)
    pub vent_full_to_half_ms: u32,
    /// Any open position to closed travel time (ms)
    pub vent_close_ms: u32,
    /// Pause between startup calibration strokes (ms)
    pub vent_calibration_pause_ms: u32,

    // --- Hysteresis bands (offsets relative to the active target, °C) ---
    pub band_to_half_c: f32,
    pub band_to_closed_c: f32,
    pub band_to_full_c: f32,
    pub band_from_full_c: f32,

    // --- Intake fault ---
    /// Intake − chamber differential that asserts the fault (°C)
    pub fault_assert_delta_c: f32,
    /// Intake − chamber differential at or below which it clears (°C)
    pub fault_clear_delta_c: f32,

    // --- Fan ---
    /// Minimum non-zero duty outside cooldown (0-255)
    pub fan_min_duty: u8,
    /// Duty for `FanCommand::Low`
    pub fan_low_duty: u8,
    /// Duty for `FanCommand::High`
    pub fan_high_duty: u8,
    /// Tachometer sampling window (ms)
    pub tach_window_ms: u32,
    /// Tachometer pulses per fan revolution
    pub tach_pulses_per_rev: u8,

    // --- Temperature acquisition ---
    /// Contact-probe request cadence (ms), conversion included
    pub probe_interval_ms: u32,
    /// Contact-probe conversion latency (ms)
    pub probe_conversion_ms: u32,
    /// Consecutive invalid reads before a probe is judged failed
    pub probe_failure_limit: u8,
    /// Ambient temperature/humidity read cadence (ms)
    pub ambient_interval_ms: u32,

    // --- Cooldown ---
    /// Sampling window for the rate controller (ms)
    pub cooldown_window_ms: u32,
    /// Target cooling rate (°C/min)
    pub cooldown_target_rate_c_per_min: f32,
    /// Dead band around the target rate (°C/min)
    pub cooldown_rate_tolerance: f32,
    /// Duty adjustment per window (0-255 scale)
    pub cooldown_duty_step: u8,
    /// Cooldown target = ambient + this offset (°C)
    pub cooldown_ambient_offset_c: f32,
    /// Ambient assumed when the ambient probe has no reading (°C)
    pub cooldown_fallback_ambient_c: f32,
    /// Session finishes once chamber ≤ target + margin (°C)
    pub cooldown_finish_margin_c: f32,

    // --- Reporting ---
    /// Status snapshot publish interval (ms)
    pub status_interval_ms: u32,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            // Vent
            vent_open_ms: 4000,
            vent_half_ms: 2000,
            vent_full_to_half_ms: 2000,
            vent_close_ms: 4000,
            vent_calibration_pause_ms: 1500,

            // Hysteresis
            band_to_half_c: -1.0,
            band_to_closed_c: -2.0,
            band_to_full_c: 2.0,
            band_from_full_c: 1.0,

            // Intake fault
            fault_assert_delta_c: 5.0,
            fault_clear_delta_c: 2.0,

            // Fan
            fan_min_duty: 51, // 20 %
            fan_low_duty: 128,
            fan_high_duty: 255,
            tach_window_ms: 1000,
            tach_pulses_per_rev: 2,

            // Temperature acquisition
            probe_interval_ms: 1000,
            probe_conversion_ms: 750, // DS18B20 at 12-bit
            probe_failure_limit: 5,
            ambient_interval_ms: 5000,

            // Cooldown
            cooldown_window_ms: 60_000,
            cooldown_target_rate_c_per_min: 1.0,
            cooldown_rate_tolerance: 0.5,
            cooldown_duty_step: 20,
            cooldown_ambient_offset_c: 3.0,
            cooldown_fallback_ambient_c: 22.0,
            cooldown_finish_margin_c: 0.5,

            // Reporting
            status_interval_ms: 1000,
        }
    }
}

impl ThermalConfig {
    /// Range-check every field and the ordering between related fields.
    ///
    /// Invalid values are rejected rather than clamped so a bad stored blob
    /// falls back to defaults instead of running with a half-fixed config.
    pub fn validate(&self) -> Result<(), Error> {
        let timings = [
            self.vent_open_ms,
            self.vent_half_ms,
            self.vent_full_to_half_ms,
            self.vent_close_ms,
        ];
        if timings.iter().any(|t| !(100..=60_000).contains(t)) {
            return Err(Error::Config("vent travel times must be 100–60000 ms"));
        }
        if self.vent_half_ms >= self.vent_open_ms {
            return Err(Error::Config("vent_half_ms must be < vent_open_ms"));
        }
        if !(self.band_to_closed_c < self.band_to_half_c
            && self.band_to_half_c < self.band_from_full_c
            && self.band_from_full_c < self.band_to_full_c)
        {
            return Err(Error::Config(
                "hysteresis bands must satisfy to_closed < to_half < from_full < to_full",
            ));
        }
        if !(self.fault_clear_delta_c >= 0.0 && self.fault_clear_delta_c < self.fault_assert_delta_c)
        {
            return Err(Error::Config(
                "fault_clear_delta_c must be in [0, fault_assert_delta_c)",
            ));
        }
        if self.fan_min_duty == 0 || self.fan_low_duty < self.fan_min_duty {
            return Err(Error::Config("fan_low_duty must be ≥ fan_min_duty > 0"));
        }
        if self.fan_high_duty < self.fan_low_duty {
            return Err(Error::Config("fan_high_duty must be ≥ fan_low_duty"));
        }
        if self.tach_window_ms == 0 || self.tach_pulses_per_rev == 0 {
            return Err(Error::Config("tachometer window and pulses/rev must be > 0"));
        }
        if self.probe_conversion_ms >= self.probe_interval_ms {
            return Err(Error::Config("probe_conversion_ms must be < probe_interval_ms"));
        }
        if self.probe_failure_limit == 0 {
            return Err(Error::Config("probe_failure_limit must be > 0"));
        }
        if self.ambient_interval_ms < 2000 {
            return Err(Error::Config("ambient_interval_ms must be ≥ 2000"));
        }
        if !(10_000..=600_000).contains(&self.cooldown_window_ms) {
            return Err(Error::Config("cooldown_window_ms must be 10000–600000"));
        }
        if !(self.cooldown_target_rate_c_per_min > 0.0)
            || !(self.cooldown_rate_tolerance >= 0.0)
            || self.cooldown_rate_tolerance >= self.cooldown_target_rate_c_per_min
        {
            return Err(Error::Config(
                "cooldown rate must be > 0 and tolerance in [0, rate)",
            ));
        }
        if self.cooldown_duty_step == 0 {
            return Err(Error::Config("cooldown_duty_step must be > 0"));
        }
        if !(0.0..=20.0).contains(&self.cooldown_ambient_offset_c) {
            return Err(Error::Config("cooldown_ambient_offset_c must be 0–20"));
        }
        if self.status_interval_ms == 0 {
            return Err(Error::Config("status_interval_ms must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(ThermalConfig::default().validate(), Ok(()));
    }

    #[test]
    fn default_bands_create_dead_zone() {
        let c = ThermalConfig::default();
        assert!(
            c.band_to_closed_c < c.band_to_half_c,
            "closing must need a lower temperature than opening"
        );
        assert!(c.band_from_full_c < c.band_to_full_c);
    }

    #[test]
    fn fault_thresholds_are_asymmetric() {
        let c = ThermalConfig::default();
        assert!(c.fault_assert_delta_c > c.fault_clear_delta_c);
    }

    #[test]
    fn rejects_inverted_fault_thresholds() {
        let c = ThermalConfig {
            fault_clear_delta_c: 6.0,
            ..ThermalConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_conversion_slower_than_cadence() {
        let c = ThermalConfig {
            probe_conversion_ms: 1200,
            ..ThermalConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_nan_rate() {
        let c = ThermalConfig {
            cooldown_target_rate_c_per_min: f32::NAN,
            ..ThermalConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn postcard_roundtrip() {
        let c = ThermalConfig::default();
        let bytes = postcard::to_allocvec(&c).unwrap();
        let c2: ThermalConfig = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(c, c2);
    }
}
