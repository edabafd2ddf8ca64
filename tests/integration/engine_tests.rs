//! Integration tests for the command → engine → actuator pipeline.
//!
//! These run on the host (x86_64) and check boot, mode selection,
//! persistence and reporting through the full `ThermalEngine` with the
//! real vent and fan drivers underneath.

use chamberctl::app::commands::{COMMAND_DEPTH, EngineCommand};
use chamberctl::app::events::AppEvent;
use chamberctl::config::ThermalConfig;
use chamberctl::drivers::vent::{VentState, VentTarget};
use chamberctl::error::CommandError;
use chamberctl::fsm::StateId;
use chamberctl::modes::{COOLDOWN_INDEX, CUSTOM_INDEX};
use chamberctl::sensors::tach::PulseCounter;

use crate::mock_hw::{MockStore, QUIET_TACH, Rig};

const PLA: u8 = 0;
const ABS: u8 = 3;

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn boot_calibrates_then_idles() {
    let mut rig = Rig::new();
    assert_eq!(rig.engine.state(), StateId::Calibrating);
    assert!(rig.sink.any(|e| matches!(e, AppEvent::Started(StateId::Calibrating))));

    rig.calibrate();

    assert_eq!(rig.engine.state(), StateId::Idle);
    assert_eq!(rig.sink.count(|e| *e == AppEvent::CalibrationComplete), 1);
    assert_eq!(rig.hw.vent().state(), VentState::Closed);
    assert!(!rig.plant.borrow().fan_powered());
}

#[test]
fn calibration_runs_close_open_close() {
    use chamberctl::drivers::vent::VentDrive::{Close, Open};

    let mut rig = Rig::new();
    rig.calibrate();

    let strokes: Vec<_> = rig
        .plant
        .borrow()
        .drives
        .iter()
        .copied()
        .filter(|d| matches!(d, Open | Close))
        .collect();
    assert_eq!(strokes, vec![Close, Open, Close]);
}

#[test]
fn mode_selected_during_calibration_applies_afterwards() {
    let mut rig = Rig::new();
    rig.run_for(1_000);
    rig.command(EngineCommand::SelectMode(PLA));

    assert_eq!(rig.engine.state(), StateId::Calibrating);
    rig.calibrate();
    assert_eq!(rig.engine.state(), StateId::Regulating);
}

#[test]
fn stored_preset_restored_at_boot() {
    let mut rig = Rig::with(ThermalConfig::default(), MockStore::with_mode(ABS), &QUIET_TACH);
    assert!(rig.sink.any(|e| matches!(
        e,
        AppEvent::ModeChanged {
            mode: Some("ABS"),
            target_c: Some(t),
        } if *t == 45.0
    )));

    rig.calibrate();
    assert_eq!(rig.engine.state(), StateId::Regulating);
    assert_eq!(rig.engine.active_target(), Some(45.0));
}

#[test]
fn stored_cooldown_restores_to_idle() {
    let mut rig = Rig::with(
        ThermalConfig::default(),
        MockStore::with_mode(COOLDOWN_INDEX),
        &QUIET_TACH,
    );
    rig.calibrate();
    assert_eq!(rig.engine.state(), StateId::Idle);
    assert_eq!(rig.engine.context().mode, None);
}

#[test]
fn corrupt_store_falls_back_to_defaults() {
    let store = MockStore {
        mode: Some(42),
        custom_target: Some(500.0),
        ..MockStore::default()
    };
    let rig = Rig::with(ThermalConfig::default(), store, &QUIET_TACH);
    assert_eq!(rig.engine.context().mode, None);
    assert_eq!(rig.engine.context().custom_target_c, 35.0);

    let failing = MockStore {
        fail_loads: true,
        ..MockStore::default()
    };
    let rig = Rig::with(ThermalConfig::default(), failing, &QUIET_TACH);
    assert_eq!(rig.engine.context().mode, None);
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn out_of_range_commands_rejected_at_submit() {
    let rig = Rig::new();
    assert_eq!(
        rig.queue.submit(EngineCommand::SelectMode(COOLDOWN_INDEX + 1)),
        Err(CommandError::ModeOutOfRange(COOLDOWN_INDEX + 1))
    );
    assert_eq!(
        rig.queue.submit(EngineCommand::SetCustomTarget(f32::NAN)),
        Err(CommandError::TargetOutOfRange)
    );
    assert!(rig.queue.is_empty());
}

#[test]
fn queue_reports_full() {
    let rig = Rig::new();
    for _ in 0..COMMAND_DEPTH {
        rig.queue.submit(EngineCommand::StartCooldown).unwrap();
    }
    assert_eq!(
        rig.queue.submit(EngineCommand::ExitActiveMode),
        Err(CommandError::QueueFull)
    );
}

#[test]
fn commands_apply_only_at_tick_boundary() {
    let mut rig = Rig::new();
    rig.calibrate();
    rig.submit(EngineCommand::SelectMode(PLA));
    assert_eq!(rig.engine.context().mode, None);
    rig.tick();
    assert_eq!(rig.engine.state(), StateId::Regulating);
}

#[test]
fn select_mode_persists_once() {
    let mut rig = Rig::new();
    rig.calibrate();
    rig.sink.clear();

    rig.command(EngineCommand::SelectMode(PLA));
    rig.command(EngineCommand::SelectMode(PLA));

    assert_eq!(rig.store.mode, Some(PLA));
    assert_eq!(rig.store.writes, 1);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::ModeChanged { .. })),
        1
    );
}

#[test]
fn storage_failure_does_not_block_selection() {
    let store = MockStore {
        fail_writes: true,
        ..MockStore::default()
    };
    let mut rig = Rig::with(ThermalConfig::default(), store, &QUIET_TACH);
    rig.calibrate();
    rig.command(EngineCommand::SelectMode(ABS));
    assert_eq!(rig.engine.state(), StateId::Regulating);
    assert_eq!(rig.store.mode, None);
}

#[test]
fn custom_target_drives_custom_mode() {
    let mut rig = Rig::new();
    rig.calibrate();
    rig.submit(EngineCommand::SetCustomTarget(40.0));
    rig.submit(EngineCommand::SelectMode(CUSTOM_INDEX));
    rig.tick();

    assert_eq!(rig.engine.active_target(), Some(40.0));
    assert_eq!(rig.store.custom_target, Some(40.0));
    assert_eq!(rig.store.mode, Some(CUSTOM_INDEX));
    assert!(rig.sink.any(|e| matches!(
        e,
        AppEvent::ModeChanged {
            mode: Some("Custom"),
            target_c: Some(t),
        } if *t == 40.0
    )));
}

#[test]
fn exit_active_mode_is_a_hard_reset() {
    let mut rig = Rig::new();
    rig.set_temps(33.0, 25.0);
    rig.calibrate();
    rig.command(EngineCommand::SelectMode(PLA));
    assert_eq!(rig.hw.vent().state().target(), VentTarget::Full);
    assert!(rig.plant.borrow().fan_powered());

    rig.command(EngineCommand::ExitActiveMode);

    assert_eq!(rig.engine.state(), StateId::Idle);
    assert!(matches!(rig.hw.vent().state(), VentState::Closing(_)));
    let plant = rig.plant.borrow();
    assert_eq!(plant.last_fan_pwm(), Some(0));
    assert!(!plant.fan_powered());
    drop(plant);
    assert_eq!(rig.store.mode, None);
}

#[test]
fn exit_while_idle_is_silent() {
    let mut rig = Rig::new();
    rig.calibrate();
    rig.sink.clear();
    rig.command(EngineCommand::ExitActiveMode);

    assert_eq!(rig.store.writes, 0);
    assert!(!rig.sink.any(|e| matches!(e, AppEvent::ModeChanged { .. })));
}

// ── Reporting ─────────────────────────────────────────────────

#[test]
fn status_published_on_interval() {
    let mut rig = Rig::new();
    rig.run_for(3_000);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::Status(_))), 3);
}

#[test]
fn status_reflects_sensors_and_mode() {
    let mut rig = Rig::new();
    rig.set_temps(29.5, 24.0);
    rig.set_ambient(21.0);
    rig.calibrate();
    rig.command(EngineCommand::SelectMode(PLA));

    let status = rig.engine.status();
    assert_eq!(status.engine_state, "Regulating");
    assert_eq!(status.mode, "PLA");
    assert_eq!(status.active_target_c, Some(30.0));
    assert_eq!(status.chamber_c, Some(29.5));
    assert_eq!(status.ambient_c, Some(21.0));
    assert_eq!(status.humidity_pct, Some(40.0));
    assert_eq!(status.fan_duty_percent, 50);
    assert!(!status.fault_active);

    let json = status.to_json().unwrap();
    assert!(json.contains("\"mode\":\"PLA\""));
}

#[test]
fn fan_rpm_from_tach_window() {
    static TACH: PulseCounter = PulseCounter::new();

    let mut rig = Rig::with(ThermalConfig::default(), MockStore::new(), &TACH);
    rig.tick(); // priming window
    for _ in 0..40 {
        TACH.record();
    }
    rig.run_for(1_000);

    // 40 pulses in 1 s at 2 pulses/rev
    assert_eq!(rig.engine.status().fan_rpm, Some(1_200));
}

#[test]
fn disconnected_probes_report_unknown() {
    let mut rig = Rig::new();
    rig.calibrate();
    rig.command(EngineCommand::SelectMode(PLA));

    let status = rig.engine.status();
    assert_eq!(status.chamber_c, None);
    assert_eq!(status.intake_c, None);
    // No reading: regulation holds the actuators where they were.
    assert_eq!(rig.hw.vent().state(), VentState::Closed);
    assert!(!rig.plant.borrow().fan_powered());
}
