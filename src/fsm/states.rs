//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers; nothing is boxed.
//!
//! ```text
//!  CALIBRATING ──[vent ready]──▶ IDLE ◀──[mode cleared]──┐
//!                                  │                      │
//!                          [mode selected]                │
//!                          ▼               ▼              │
//!                     REGULATING ◀──▶ COOLING_DOWN ───────┘
//!
//!  Any state ──[intake fault]──▶ INTAKE_FAULT ──[cleared]──▶ mode state
//!                                              (CALIBRATING if the vent
//!                                               never finished calibrating)
//! ```
//!
//! Handlers that own the actuators re-issue their command every tick.
//! The actuators are idempotent, so a repeated command is free, and a
//! skipped command leaves the previous output in place.

use log::{info, warn};

use super::context::ThermalContext;
use super::{StateDescriptor, StateId};
use crate::control::cooldown::{CooldownSession, CooldownStep};
use crate::control::hysteresis::{self, HysteresisBands};
use crate::drivers::vent::VentTarget;
use crate::modes::ActiveMode;

/// Fan duty forced while the intake fault holds.
pub const FAULT_FAN_DUTY: u8 = u8::MAX;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Calibrating
        StateDescriptor {
            id: StateId::Calibrating,
            name: "Calibrating",
            on_enter: Some(calibrating_enter),
            on_exit: None,
            on_update: calibrating_update,
        },
        // Index 1: Idle
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        // Index 2: Regulating
        StateDescriptor {
            id: StateId::Regulating,
            name: "Regulating",
            on_enter: Some(regulating_enter),
            on_exit: None,
            on_update: regulating_update,
        },
        // Index 3: CoolingDown
        StateDescriptor {
            id: StateId::CoolingDown,
            name: "CoolingDown",
            on_enter: Some(cooling_enter),
            on_exit: None,
            on_update: cooling_update,
        },
        // Index 4: IntakeFault
        StateDescriptor {
            id: StateId::IntakeFault,
            name: "IntakeFault",
            on_enter: Some(fault_enter),
            on_exit: Some(fault_exit),
            on_update: fault_update,
        },
    ]
}

/// The state that serves the currently selected mode.
pub fn state_for_mode(mode: Option<ActiveMode>) -> StateId {
    match mode {
        None => StateId::Idle,
        Some(ActiveMode::Cooldown) => StateId::CoolingDown,
        Some(_) => StateId::Regulating,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  CALIBRATING: vent running its boot cycle, no external commands yet
// ═══════════════════════════════════════════════════════════════════════════

fn calibrating_enter(ctx: &mut ThermalContext) {
    ctx.command_fan(0, false);
    info!("CALIBRATING: establishing vent position");
}

fn calibrating_update(ctx: &mut ThermalContext) -> Option<StateId> {
    if ctx.fault_active {
        return Some(StateId::IntakeFault);
    }
    if ctx.vent_ready {
        return Some(state_for_mode(ctx.mode));
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE: no active mode: vent closed, fan hard-killed
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut ThermalContext) {
    rest(ctx);
    info!("IDLE: vent closed, fan off");
}

fn idle_update(ctx: &mut ThermalContext) -> Option<StateId> {
    if ctx.fault_active {
        return Some(StateId::IntakeFault);
    }
    if ctx.mode.is_some() {
        return Some(state_for_mode(ctx.mode));
    }
    rest(ctx);
    None
}

fn rest(ctx: &mut ThermalContext) {
    ctx.command_vent(VentTarget::Closed);
    ctx.command_fan(0, false);
}

// ═══════════════════════════════════════════════════════════════════════════
//  REGULATING: preset or custom target, hysteresis control
// ═══════════════════════════════════════════════════════════════════════════

fn regulating_enter(ctx: &mut ThermalContext) {
    if let (Some(mode), Some(target)) = (ctx.mode, ctx.active_target()) {
        info!("REGULATING: {} at {:.1}°C", mode.label(), target);
    }
    regulate(ctx);
}

fn regulating_update(ctx: &mut ThermalContext) -> Option<StateId> {
    if ctx.fault_active {
        return Some(StateId::IntakeFault);
    }
    let next = state_for_mode(ctx.mode);
    if next != StateId::Regulating {
        return Some(next);
    }
    regulate(ctx);
    None
}

/// Without a chamber reading the vent holds and the fan keeps its duty,
/// re-applied with the floor so a low cooldown duty cannot carry over.
fn regulate(ctx: &mut ThermalContext) {
    let (Some(chamber_c), Some(target_c)) = (ctx.sensors.chamber_c, ctx.active_target()) else {
        ctx.command_fan(ctx.fan_duty, false);
        return;
    };
    let bands = HysteresisBands::from_config(&ctx.config);
    let cmd = hysteresis::evaluate(chamber_c, target_c, ctx.vent_state, &bands);
    ctx.command_vent(cmd.vent);
    ctx.command_fan(cmd.fan.duty(&ctx.config), false);
}

// ═══════════════════════════════════════════════════════════════════════════
//  COOLING_DOWN: adaptive fan duty toward ambient + offset
// ═══════════════════════════════════════════════════════════════════════════

fn cooling_enter(ctx: &mut ThermalContext) {
    match &ctx.cooldown {
        Some(s) => info!("COOLING_DOWN: resuming session (duty {})", s.duty),
        None => info!("COOLING_DOWN: waiting for chamber reading"),
    }
    cool(ctx);
}

fn cooling_update(ctx: &mut ThermalContext) -> Option<StateId> {
    if ctx.fault_active {
        return Some(StateId::IntakeFault);
    }
    let next = state_for_mode(ctx.mode);
    if next != StateId::CoolingDown {
        return Some(next);
    }
    cool(ctx);
    None
}

fn cool(ctx: &mut ThermalContext) {
    let now = ctx.now_ms;
    let chamber = ctx.sensors.chamber_c;
    let ambient = ctx.sensors.ambient_c;

    if ctx.cooldown.is_none() {
        if let Some(chamber_c) = chamber {
            ctx.cooldown = Some(CooldownSession::start(now, chamber_c, ambient, &ctx.config));
        }
    } else if let (Some(session), Some(chamber_c)) = (ctx.cooldown.as_mut(), chamber) {
        let step = session.update(now, chamber_c, ambient, &ctx.config);
        if step != CooldownStep::Hold {
            ctx.cooldown_step = Some(step);
        }
    }

    let (vent, duty) = match &ctx.cooldown {
        Some(s) if s.finished => (VentTarget::Closed, 0),
        Some(s) => (VentTarget::Full, s.duty),
        None => (VentTarget::Full, 0),
    };
    ctx.command_vent(vent);
    ctx.command_fan(duty, true);
}

// ═══════════════════════════════════════════════════════════════════════════
//  INTAKE_FAULT: vent full, fan max, every other intent suppressed
// ═══════════════════════════════════════════════════════════════════════════

fn fault_enter(ctx: &mut ThermalContext) {
    warn!("INTAKE_FAULT: forcing vent open, fan max");
    purge(ctx);
}

fn fault_exit(ctx: &mut ThermalContext) {
    let resume = ctx.mode.map_or("idle", ActiveMode::label);
    info!("INTAKE_FAULT: cleared, resuming {}", resume);
}

fn fault_update(ctx: &mut ThermalContext) -> Option<StateId> {
    if !ctx.fault_active {
        if !ctx.vent_ready {
            return Some(StateId::Calibrating);
        }
        return Some(state_for_mode(ctx.mode));
    }
    purge(ctx);
    None
}

fn purge(ctx: &mut ThermalContext) {
    ctx.command_vent(VentTarget::Full);
    ctx.command_fan(FAULT_FAN_DUTY, false);
}
