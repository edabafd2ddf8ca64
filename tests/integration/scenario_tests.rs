//! End-to-end thermal scenarios: warm-up ladder, intake fault overlay and
//! a full cooldown session, driven through simulated probe readings.

use chamberctl::app::commands::EngineCommand;
use chamberctl::app::events::AppEvent;
use chamberctl::drivers::vent::{VentState, VentTarget};
use chamberctl::fsm::StateId;

use crate::mock_hw::Rig;

const PLA: u8 = 0;

fn vent_target(rig: &Rig) -> VentTarget {
    rig.hw.vent().state().target()
}

fn fan_pwm(rig: &Rig) -> u16 {
    rig.plant.borrow().last_fan_pwm().unwrap_or(0)
}

/// Hold the chamber at `chamber_c` until a fresh reading lands.
fn settle_at(rig: &mut Rig, chamber_c: f32) -> (VentTarget, u16) {
    rig.set_chamber(chamber_c);
    rig.settle_sensors();
    (vent_target(rig), fan_pwm(rig))
}

fn pla_rig() -> Rig {
    let mut rig = Rig::new();
    rig.set_temps(25.0, 25.0);
    rig.set_ambient(22.0);
    rig.calibrate();
    rig.command(EngineCommand::SelectMode(PLA));
    rig
}

// ── Hysteresis ladder ─────────────────────────────────────────

#[test]
fn pla_warm_up_and_settle() {
    let mut rig = pla_rig();
    assert_eq!(vent_target(&rig), VentTarget::Closed);
    assert!(!rig.plant.borrow().fan_powered());

    rig.set_chamber(29.5);
    rig.settle_sensors();
    assert_eq!(vent_target(&rig), VentTarget::Half);
    assert_eq!(fan_pwm(&rig), 128);

    // Between half and full thresholds: hold.
    rig.set_chamber(31.5);
    rig.settle_sensors();
    assert_eq!(vent_target(&rig), VentTarget::Half);

    rig.set_chamber(32.5);
    rig.settle_sensors();
    assert_eq!(vent_target(&rig), VentTarget::Full);
    assert_eq!(fan_pwm(&rig), 255);
    rig.run_for(4_000);
    assert_eq!(rig.hw.vent().state(), VentState::FullOpen);

    // Still above the full exit threshold.
    rig.set_chamber(31.5);
    rig.settle_sensors();
    assert_eq!(vent_target(&rig), VentTarget::Full);

    rig.set_chamber(31.0);
    rig.settle_sensors();
    assert_eq!(vent_target(&rig), VentTarget::Half);
    assert_eq!(fan_pwm(&rig), 128);

    rig.set_chamber(28.5);
    rig.settle_sensors();
    assert_eq!(vent_target(&rig), VentTarget::Half);

    rig.set_chamber(27.5);
    rig.settle_sensors();
    assert_eq!(vent_target(&rig), VentTarget::Closed);
    assert_eq!(fan_pwm(&rig), 0);
    assert!(!rig.plant.borrow().fan_powered());
}

#[test]
fn pla_integer_ladder_hits_thresholds_exactly() {
    let mut rig = pla_rig();

    assert_eq!(settle_at(&mut rig, 28.0), (VentTarget::Closed, 0));
    assert_eq!(settle_at(&mut rig, 29.0), (VentTarget::Half, 128));
    assert_eq!(settle_at(&mut rig, 30.0), (VentTarget::Half, 128));
    assert_eq!(settle_at(&mut rig, 32.0), (VentTarget::Full, 255));
    assert_eq!(settle_at(&mut rig, 33.0), (VentTarget::Full, 255));
    rig.run_for(4_000);
    assert_eq!(rig.hw.vent().state(), VentState::FullOpen);

    assert_eq!(settle_at(&mut rig, 32.0), (VentTarget::Full, 255));
    assert_eq!(settle_at(&mut rig, 31.0), (VentTarget::Half, 128));
    for chamber in [30.0, 29.0, 28.0] {
        assert_eq!(settle_at(&mut rig, chamber), (VentTarget::Half, 128), "{chamber}");
    }
    assert_eq!(settle_at(&mut rig, 27.0), (VentTarget::Closed, 0));
}

#[test]
fn half_request_during_full_stroke_lands_after_settle() {
    let mut rig = pla_rig();
    rig.set_chamber(33.0);
    while !matches!(rig.hw.vent().state(), VentState::OpeningFull(_)) {
        rig.tick();
    }

    rig.set_chamber(31.0);
    while rig.engine.status().chamber_c != Some(31.0) {
        rig.tick();
    }
    // Fan already at the half duty; the vent finishes its stroke first.
    assert!(matches!(rig.hw.vent().state(), VentState::OpeningFull(_)));
    assert_eq!(fan_pwm(&rig), 128);

    rig.run_for(7_000);
    assert_eq!(rig.hw.vent().state(), VentState::HalfOpen);
    assert_eq!(fan_pwm(&rig), 128);
}

#[test]
fn steady_temperature_does_not_retrigger_vent() {
    let mut rig = pla_rig();
    rig.set_chamber(29.5);
    rig.settle_sensors();
    rig.run_for(10_000);

    let pulses = rig.hw.vent().pulse_count();
    rig.run_for(30_000);
    assert_eq!(rig.hw.vent().pulse_count(), pulses);
    assert_eq!(rig.hw.vent().state(), VentState::HalfOpen);
}

#[test]
fn regulation_never_writes_below_minimum_duty() {
    let mut rig = pla_rig();
    for chamber in [29.5, 33.0, 30.5, 27.0, 29.8, 35.0] {
        rig.set_chamber(chamber);
        rig.settle_sensors();
    }
    let min = u16::from(rig.engine.config().fan_min_duty);
    assert!(rig.plant.borrow().fan_pwm.iter().all(|&d| d == 0 || d >= min));
}

// ── Intake fault ──────────────────────────────────────────────

#[test]
fn intake_fault_overrides_regulation() {
    let mut rig = pla_rig();
    rig.sink.clear();

    // Exactly at the threshold does not assert.
    rig.set_intake(30.0);
    rig.settle_sensors();
    assert!(!rig.engine.fault_active());

    rig.set_intake(30.5);
    rig.settle_sensors();
    assert!(rig.engine.fault_active());
    assert_eq!(rig.engine.state(), StateId::IntakeFault);
    assert_eq!(vent_target(&rig), VentTarget::Full);
    assert_eq!(fan_pwm(&rig), 255);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::FaultAsserted { .. })),
        1
    );

    // Inside the dead zone: still faulted.
    rig.set_intake(28.0);
    rig.settle_sensors();
    assert_eq!(rig.engine.state(), StateId::IntakeFault);

    rig.set_intake(26.5);
    rig.settle_sensors();
    assert!(!rig.engine.fault_active());
    assert_eq!(rig.engine.state(), StateId::Regulating);

    // Full steps down through half before closing.
    rig.run_for(6_000);
    assert_eq!(vent_target(&rig), VentTarget::Closed);
    assert_eq!(fan_pwm(&rig), 0);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::FaultCleared { .. })),
        1
    );
}

#[test]
fn mode_change_during_fault_waits_for_clear() {
    let mut rig = pla_rig();
    rig.set_intake(31.0);
    rig.settle_sensors();
    assert_eq!(rig.engine.state(), StateId::IntakeFault);

    rig.command(EngineCommand::ExitActiveMode);
    assert_eq!(rig.engine.state(), StateId::IntakeFault);
    assert_eq!(fan_pwm(&rig), 255);
    assert_eq!(rig.engine.context().mode, None);

    rig.set_intake(25.0);
    rig.settle_sensors();
    assert_eq!(rig.engine.state(), StateId::Idle);
    assert_eq!(vent_target(&rig), VentTarget::Closed);
    assert!(!rig.plant.borrow().fan_powered());
}

#[test]
fn fault_during_calibration_returns_to_calibrating() {
    let mut rig = Rig::new();
    rig.set_temps(25.0, 31.0);
    rig.run_for(2_000);
    assert_eq!(rig.engine.state(), StateId::IntakeFault);
    assert_eq!(fan_pwm(&rig), 255);

    rig.set_intake(25.0);
    rig.run_for(2_000);
    assert_eq!(rig.engine.state(), StateId::Calibrating);

    rig.calibrate();
    assert_eq!(rig.engine.state(), StateId::Idle);
}

// ── Cooldown ──────────────────────────────────────────────────

#[test]
fn cooldown_session_end_to_end() {
    let mut rig = Rig::new();
    rig.set_temps(60.0, 25.0);
    rig.set_ambient(22.0);
    rig.calibrate();

    rig.command(EngineCommand::StartCooldown);
    assert_eq!(rig.engine.state(), StateId::CoolingDown);
    assert_eq!(vent_target(&rig), VentTarget::Full);
    assert!(!rig.plant.borrow().fan_powered());
    assert_eq!(rig.engine.active_target(), Some(25.0));

    // Not cooling at all: duty steps up, below the regulation minimum.
    rig.run_for(60_000);
    assert!(rig.sink.any(|e| matches!(
        e,
        AppEvent::CooldownProgress { duty: 20, .. }
    )));
    assert_eq!(fan_pwm(&rig), 20);

    rig.run_for(60_000);
    assert_eq!(fan_pwm(&rig), 40);

    // 2 °C in one window: too fast, duty steps back down.
    rig.set_chamber(58.0);
    rig.run_for(60_000);
    let session = rig.engine.context().cooldown.clone().unwrap();
    assert_eq!(session.duty, 20);
    assert!((session.progress - 2.0 / 35.0).abs() < 1e-4);
    assert_eq!(session.remaining_secs, 990);

    rig.set_chamber(25.3);
    rig.run_for(60_000);
    assert!(rig.sink.any(|e| *e == AppEvent::CooldownFinished));
    assert_eq!(vent_target(&rig), VentTarget::Closed);
    assert!(!rig.plant.borrow().fan_powered());
    let status = rig.engine.status();
    assert_eq!(status.cooldown_progress, Some(1.0));
    assert_eq!(status.cooldown_eta_secs, Some(0));
    assert_eq!(rig.engine.state(), StateId::CoolingDown);
}

#[test]
fn preset_after_cooldown_floors_fan_without_chamber_reading() {
    let mut rig = Rig::new();
    rig.set_temps(60.0, 25.0);
    rig.set_ambient(22.0);
    rig.calibrate();
    rig.command(EngineCommand::StartCooldown);
    rig.run_for(60_000);
    assert_eq!(fan_pwm(&rig), 20);

    rig.disconnect_chamber();
    rig.run_for(8_000);
    assert_eq!(rig.engine.status().chamber_c, None);
    assert_eq!(fan_pwm(&rig), 20);

    let writes_before = rig.plant.borrow().fan_pwm.len();
    rig.command(EngineCommand::SelectMode(PLA));
    rig.run_for(2_000);

    assert_eq!(rig.engine.state(), StateId::Regulating);
    let min = u16::from(rig.engine.config().fan_min_duty);
    assert_eq!(fan_pwm(&rig), min);
    assert!(rig.plant.borrow().fan_powered());
    assert!(
        rig.plant.borrow().fan_pwm[writes_before..]
            .iter()
            .all(|&d| d == 0 || d >= min)
    );
}

#[test]
fn cooldown_survives_fault_overlay() {
    let mut rig = Rig::new();
    rig.set_temps(50.0, 25.0);
    rig.calibrate();
    rig.command(EngineCommand::StartCooldown);
    rig.run_for(60_000);
    let before = rig.engine.context().cooldown.clone().unwrap();

    rig.set_intake(56.0);
    rig.settle_sensors();
    assert_eq!(rig.engine.state(), StateId::IntakeFault);
    assert_eq!(fan_pwm(&rig), 255);

    rig.set_intake(25.0);
    rig.settle_sensors();
    assert_eq!(rig.engine.state(), StateId::CoolingDown);
    let after = rig.engine.context().cooldown.clone().unwrap();
    assert_eq!(after.started_at, before.started_at);
    assert_eq!(fan_pwm(&rig), u16::from(after.duty));
}

#[test]
fn repeated_start_does_not_restart_running_session() {
    let mut rig = Rig::new();
    rig.set_temps(50.0, 25.0);
    rig.calibrate();
    rig.command(EngineCommand::StartCooldown);
    rig.run_for(5_000);
    let started = rig.engine.context().cooldown.as_ref().unwrap().started_at;

    rig.command(EngineCommand::StartCooldown);
    rig.command(EngineCommand::SelectMode(chamberctl::modes::COOLDOWN_INDEX));
    assert_eq!(
        rig.engine.context().cooldown.as_ref().unwrap().started_at,
        started
    );
}

#[test]
fn selecting_preset_ends_cooldown_session() {
    let mut rig = Rig::new();
    rig.set_temps(50.0, 25.0);
    rig.calibrate();
    rig.command(EngineCommand::StartCooldown);
    rig.run_for(1_000);
    assert!(rig.engine.context().cooldown.is_some());

    rig.command(EngineCommand::SelectMode(PLA));
    assert!(rig.engine.context().cooldown.is_none());
    assert_eq!(rig.engine.state(), StateId::Regulating);
    // 50 °C against a 30 °C target.
    assert_eq!(vent_target(&rig), VentTarget::Full);
    assert_eq!(fan_pwm(&rig), 255);
}
