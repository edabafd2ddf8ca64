//! Intake-fault monitor.
//!
//! Runs **every tick before the FSM**.  The fresh-air intake should never
//! be hotter than the chamber; when it is, the enclosure is breathing its
//! own exhaust.  The monitor asserts a fault when
//! `intake − chamber > assert_delta` and clears it once
//! `intake − chamber ≤ clear_delta`.  Between the two the state holds in
//! either direction.
//!
//! ## Fault lifecycle
//!
//! 1. Differential crosses the assert threshold.
//! 2. The monitor returns [`FaultTransition::Asserted`]; the service forces
//!    the FSM into `IntakeFault`, which drives vent full / fan max.
//! 3. Each tick the monitor re-evaluates.  Unknown readings never change
//!    the state.
//! 4. On [`FaultTransition::Cleared`] the FSM `intake_fault_update` handler
//!    hands control back to whichever mode is active.

use log::{error, info};

use crate::config::ThermalConfig;
use crate::sensors::temperature::TemperatureReading;

/// A change of fault state.  Carries the differential that caused it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FaultTransition {
    Asserted { differential_c: f32 },
    Cleared { differential_c: f32 },
}

pub struct FaultMonitor {
    assert_delta_c: f32,
    clear_delta_c: f32,
    active: bool,
}

impl FaultMonitor {
    pub fn new(config: &ThermalConfig) -> Self {
        Self {
            assert_delta_c: config.fault_assert_delta_c,
            clear_delta_c: config.fault_clear_delta_c,
            active: false,
        }
    }

    /// Evaluate one pair of readings.  Returns `Some` only on a change.
    pub fn evaluate(
        &mut self,
        chamber: TemperatureReading,
        intake: TemperatureReading,
    ) -> Option<FaultTransition> {
        let (Some(chamber_c), Some(intake_c)) = (chamber, intake) else {
            return None;
        };
        let diff = intake_c - chamber_c;

        if !self.active && diff > self.assert_delta_c {
            error!(
                "SAFETY FAULT SET: intake {:.1}°C exceeds chamber {:.1}°C by {:.1}°C",
                intake_c, chamber_c, diff
            );
            self.active = true;
            return Some(FaultTransition::Asserted {
                differential_c: diff,
            });
        }
        if self.active && diff <= self.clear_delta_c {
            info!("SAFETY FAULT CLEARED: intake differential {:.1}°C", diff);
            self.active = false;
            return Some(FaultTransition::Cleared {
                differential_c: diff,
            });
        }
        None
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> FaultMonitor {
        FaultMonitor::new(&ThermalConfig::default())
    }

    #[test]
    fn asserts_above_five() {
        let mut m = monitor();
        assert_eq!(m.evaluate(Some(30.0), Some(35.0)), None);
        assert!(matches!(
            m.evaluate(Some(30.0), Some(35.5)),
            Some(FaultTransition::Asserted { .. })
        ));
        assert!(m.is_active());
    }

    #[test]
    fn dead_zone_holds_both_ways() {
        let mut m = monitor();
        m.evaluate(Some(30.0), Some(34.0));
        assert!(!m.is_active());

        m.evaluate(Some(30.0), Some(40.0));
        assert!(m.is_active());
        for intake in [35.0, 33.0, 32.1] {
            assert_eq!(m.evaluate(Some(30.0), Some(intake)), None);
            assert!(m.is_active());
        }
    }

    #[test]
    fn clears_at_two() {
        let mut m = monitor();
        m.evaluate(Some(30.0), Some(40.0));
        assert!(matches!(
            m.evaluate(Some(30.0), Some(32.0)),
            Some(FaultTransition::Cleared { .. })
        ));
        assert!(!m.is_active());
    }

    #[test]
    fn unknown_reading_holds_state() {
        let mut m = monitor();
        m.evaluate(Some(30.0), Some(40.0));
        assert_eq!(m.evaluate(None, Some(20.0)), None);
        assert_eq!(m.evaluate(Some(30.0), None), None);
        assert!(m.is_active());
    }

    #[test]
    fn no_repeat_transition_while_asserted() {
        let mut m = monitor();
        m.evaluate(Some(30.0), Some(40.0));
        assert_eq!(m.evaluate(Some(30.0), Some(45.0)), None);
    }
}
