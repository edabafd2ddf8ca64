//! Thermal engine: the hexagonal core.
//!
//! [`ThermalEngine`] owns the FSM, the intake-fault monitor, and the shared
//! context.  All I/O flows through port traits injected at call sites,
//! making the whole engine testable with mock adapters.
//!
//! ```text
//!  SensorPort ──▶ ┌─────────────────────────────┐ ──▶ EventSink
//!                 │        ThermalEngine         │
//! ActuatorPort ◀──│ FSM · FaultMonitor · control │ ◀── CommandQueue
//!                 └─────────────────────────────┘
//!                              ▲▼
//!                         ModeStorePort
//! ```
//!
//! One [`tick`](ThermalEngine::tick) runs, strictly in this order:
//!
//! 1. drain queued commands
//! 2. sample sensors
//! 3. advance the vent's timed state
//! 4. evaluate the intake fault (may force `IntakeFault`)
//! 5. FSM update (hysteresis or cooldown)
//! 6. apply actuator commands
//! 7. emit events and, on its interval, a status snapshot

use log::{info, warn};

use crate::config::ThermalConfig;
use crate::control::cooldown::CooldownStep;
use crate::drivers::fan::FanOutput;
use crate::error::{CommandError, StorageError};
use crate::fsm::context::ThermalContext;
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::modes::{self, ActiveMode};
use crate::safety::{FaultMonitor, FaultTransition};
use crate::scheduler::{Interval, Millis};

use super::commands::{CommandQueue, EngineCommand};
use super::events::{AppEvent, StatusSnapshot};
use super::ports::{ActuatorPort, EventSink, ModeStorePort, SensorPort};

// ───────────────────────────────────────────────────────────────
// ThermalEngine
// ───────────────────────────────────────────────────────────────

pub struct ThermalEngine<'q> {
    fsm: Fsm,
    ctx: ThermalContext,
    monitor: FaultMonitor,
    commands: &'q CommandQueue,
    status_interval: Interval,
    /// Fan output as last applied.
    fan: FanOutput,
}

impl<'q> ThermalEngine<'q> {
    /// Does **not** touch hardware; call [`start`](Self::start) next.
    pub fn new(config: ThermalConfig, commands: &'q CommandQueue) -> Self {
        let monitor = FaultMonitor::new(&config);
        let status_interval = Interval::immediate(config.status_interval_ms);
        let ctx = ThermalContext::new(config);
        let fsm = Fsm::new(build_state_table(), StateId::Calibrating);

        Self {
            fsm,
            ctx,
            monitor,
            commands,
            status_interval,
            fan: FanOutput::OFF,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Restore the stored selection, start vent calibration and enter
    /// the FSM.  The restored mode takes effect once calibration ends.
    pub fn start(
        &mut self,
        hw: &mut impl ActuatorPort,
        store: &impl ModeStorePort,
        sink: &mut impl EventSink,
        now: Millis,
    ) {
        self.ctx.now_ms = now;
        self.ctx.custom_target_c = restore_custom_target(store);
        self.ctx.mode = restore_mode(store);

        hw.begin_calibration(now);
        self.fsm.start(&mut self.ctx);
        self.apply_actuators(hw, sink, now);

        sink.emit(&AppEvent::Started(self.fsm.current_state()));
        if self.ctx.mode.is_some() {
            self.emit_mode(sink);
        }
        info!(
            "ThermalEngine started, restored mode: {}",
            self.mode_label()
        );
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle.
    ///
    /// The `hw` parameter satisfies **both** [`SensorPort`] and
    /// [`ActuatorPort`], which avoids a double mutable borrow while
    /// keeping the port boundary explicit.
    pub fn tick(
        &mut self,
        hw: &mut (impl SensorPort + ActuatorPort),
        store: &mut impl ModeStorePort,
        sink: &mut impl EventSink,
        now: Millis,
    ) {
        let prev_state = self.fsm.current_state();
        self.ctx.now_ms = now;
        self.ctx.commands.clear();
        self.ctx.cooldown_step = None;

        // 1. Requests are applied at the tick boundary only.
        while let Some(cmd) = self.commands.take() {
            self.handle_command(cmd, hw, store, sink, now);
        }

        // 2. Sensors
        self.ctx.sensors = hw.sample(now);

        // 3. Vent timing runs regardless of who issued the last command.
        if let Some(settled) = hw.advance_vent(now) {
            sink.emit(&AppEvent::VentChanged(settled));
        }
        self.sync_vent(&*hw, sink);

        // 4. Intake fault, strictly before any mode logic.
        match self
            .monitor
            .evaluate(self.ctx.sensors.chamber_c, self.ctx.sensors.intake_c)
        {
            Some(FaultTransition::Asserted { differential_c }) => {
                self.ctx.fault_active = true;
                self.fsm.force_transition(StateId::IntakeFault, &mut self.ctx);
                sink.emit(&AppEvent::FaultAsserted { differential_c });
            }
            Some(FaultTransition::Cleared { differential_c }) => {
                self.ctx.fault_active = false;
                sink.emit(&AppEvent::FaultCleared { differential_c });
            }
            None => {}
        }

        // 5. FSM
        self.fsm.tick(&mut self.ctx);

        // 6. Actuators
        self.apply_actuators(hw, sink, now);

        // 7. Events
        self.emit_cooldown(sink);
        let new_state = self.fsm.current_state();
        if new_state != prev_state {
            sink.emit(&AppEvent::StateChanged {
                from: prev_state,
                to: new_state,
            });
        }
        if self.status_interval.poll(now).is_some() {
            sink.emit(&AppEvent::Status(self.status()));
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply one command.  Called from [`tick`](Self::tick) for every
    /// queued command; each is idempotent.
    pub fn handle_command(
        &mut self,
        cmd: EngineCommand,
        hw: &mut impl ActuatorPort,
        store: &mut impl ModeStorePort,
        sink: &mut impl EventSink,
        now: Millis,
    ) {
        if let Err(e) = cmd.validate() {
            warn!("command {:?} rejected: {}", cmd, e);
            sink.emit(&AppEvent::CommandRejected(e));
            return;
        }

        match cmd {
            EngineCommand::SelectMode(index) => match ActiveMode::from_index(index) {
                Ok(ActiveMode::Cooldown) => self.start_cooldown(store, sink),
                Ok(mode) => self.select_mode(mode, store, sink),
                Err(e) => sink.emit(&AppEvent::CommandRejected(e)),
            },
            EngineCommand::SetCustomTarget(target_c) => {
                self.set_custom_target(target_c, store, sink);
            }
            EngineCommand::StartCooldown => self.start_cooldown(store, sink),
            EngineCommand::ExitActiveMode => self.exit_active_mode(hw, store, sink, now),
        }
    }

    fn select_mode(
        &mut self,
        mode: ActiveMode,
        store: &mut impl ModeStorePort,
        sink: &mut impl EventSink,
    ) {
        if self.ctx.mode == Some(mode) {
            return;
        }
        self.ctx.mode = Some(mode);
        self.ctx.cooldown = None;
        persist(store.save_mode(Some(mode.index())), "mode");
        self.emit_mode(sink);
    }

    fn set_custom_target(
        &mut self,
        target_c: f32,
        store: &mut impl ModeStorePort,
        sink: &mut impl EventSink,
    ) {
        if self.ctx.custom_target_c == target_c {
            return;
        }
        self.ctx.custom_target_c = target_c;
        persist(store.save_custom_target(target_c), "custom target");
        if self.ctx.mode == Some(ActiveMode::Custom) {
            self.emit_mode(sink);
        }
    }

    /// No-op while a session is running; restarts a finished one.
    fn start_cooldown(&mut self, store: &mut impl ModeStorePort, sink: &mut impl EventSink) {
        if self.ctx.mode == Some(ActiveMode::Cooldown) {
            match &self.ctx.cooldown {
                Some(s) if s.finished => {
                    info!("cooldown: restarting finished session");
                    self.ctx.cooldown = None;
                    self.emit_mode(sink);
                }
                _ => {}
            }
            return;
        }
        self.ctx.mode = Some(ActiveMode::Cooldown);
        self.ctx.cooldown = None;
        persist(store.save_mode(Some(modes::COOLDOWN_INDEX)), "mode");
        self.emit_mode(sink);
    }

    /// Hard reset.  Fan off and vent closing right now, unless the intake
    /// fault holds them, in which case the engine idles once it clears.
    fn exit_active_mode(
        &mut self,
        hw: &mut impl ActuatorPort,
        store: &mut impl ModeStorePort,
        sink: &mut impl EventSink,
        now: Millis,
    ) {
        let was = self.ctx.mode.take();
        self.ctx.cooldown = None;

        if !self.ctx.fault_active {
            hw.all_off(now);
            self.fan = hw.fan_output();
            self.ctx.fan_duty = self.fan.duty;
            self.sync_vent(&*hw, sink);
        }

        if was.is_some() {
            persist(store.save_mode(None), "mode");
            self.emit_mode(sink);
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn context(&self) -> &ThermalContext {
        &self.ctx
    }

    pub fn fault_active(&self) -> bool {
        self.ctx.fault_active
    }

    pub fn config(&self) -> &ThermalConfig {
        &self.ctx.config
    }

    pub fn status(&self) -> StatusSnapshot {
        let session = self.ctx.cooldown.as_ref();
        StatusSnapshot {
            engine_state: self.fsm.current_state().name(),
            chamber_c: self.ctx.sensors.chamber_c,
            intake_c: self.ctx.sensors.intake_c,
            ambient_c: self.ctx.sensors.ambient_c,
            humidity_pct: self.ctx.sensors.humidity_pct,
            fan_duty_percent: self.fan.duty_percent(),
            fan_rpm: self.ctx.sensors.fan_rpm,
            vent_state: self.ctx.vent_state.label(),
            mode: self.mode_label(),
            active_target_c: self.active_target(),
            fault_active: self.ctx.fault_active,
            cooldown_progress: session.map(|s| s.progress),
            cooldown_eta_secs: session.map(|s| s.remaining_secs),
        }
    }

    /// Target of the active mode; for cooldown, the session's target.
    pub fn active_target(&self) -> Option<f32> {
        match self.ctx.mode {
            Some(ActiveMode::Cooldown) => self.ctx.cooldown.as_ref().map(|s| s.target_c),
            _ => self.ctx.active_target(),
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn mode_label(&self) -> &'static str {
        self.ctx.mode.map_or("Idle", ActiveMode::label)
    }

    fn emit_mode(&self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::ModeChanged {
            mode: self.ctx.mode.map(ActiveMode::label),
            target_c: self.active_target(),
        });
    }

    /// Mirror vent state into the context; report calibration completion.
    fn sync_vent(&mut self, hw: &impl ActuatorPort, sink: &mut impl EventSink) {
        let was_ready = self.ctx.vent_ready;
        self.ctx.vent_state = hw.vent_state();
        self.ctx.vent_ready = hw.vent_ready();
        if self.ctx.vent_ready && !was_ready {
            sink.emit(&AppEvent::CalibrationComplete);
        }
    }

    fn apply_actuators(&mut self, hw: &mut impl ActuatorPort, sink: &mut impl EventSink, now: Millis) {
        let commands = self.ctx.commands;
        if let Some(target) = commands.vent {
            if hw.command_vent(target, now) {
                self.ctx.vent_state = hw.vent_state();
                sink.emit(&AppEvent::VentChanged(self.ctx.vent_state));
            }
        }
        if let Some(fan) = commands.fan {
            self.fan = hw.set_fan_duty(fan.duty, fan.allow_below_minimum);
            self.ctx.fan_duty = self.fan.duty;
        }
    }

    fn emit_cooldown(&self, sink: &mut impl EventSink) {
        let (Some(step), Some(session)) = (self.ctx.cooldown_step, self.ctx.cooldown.as_ref())
        else {
            return;
        };
        match step {
            CooldownStep::Sampled {
                duty,
                rate_c_per_min,
            } => sink.emit(&AppEvent::CooldownProgress {
                duty,
                rate_c_per_min,
                progress: session.progress,
                remaining_secs: session.remaining_secs,
            }),
            CooldownStep::Finished => sink.emit(&AppEvent::CooldownFinished),
            CooldownStep::Hold => {}
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Boot restore
// ───────────────────────────────────────────────────────────────

fn restore_custom_target(store: &impl ModeStorePort) -> f32 {
    match store.load_custom_target() {
        Ok(Some(t)) => modes::validate_target(t).unwrap_or_else(|_| {
            warn!("stored custom target {} out of range, using default", t);
            modes::DEFAULT_CUSTOM_TARGET_C
        }),
        Ok(None) => modes::DEFAULT_CUSTOM_TARGET_C,
        Err(e) => {
            warn!("custom target load failed ({}), using default", e);
            modes::DEFAULT_CUSTOM_TARGET_C
        }
    }
}

/// A stored cooldown is not resumed: the session it belonged to is gone.
fn restore_mode(store: &impl ModeStorePort) -> Option<ActiveMode> {
    let index = match store.load_mode() {
        Ok(index) => index?,
        Err(e) => {
            warn!("mode load failed ({}), starting idle", e);
            return None;
        }
    };
    match ActiveMode::from_index(index) {
        Ok(ActiveMode::Cooldown) => {
            info!("stored cooldown mode not resumed");
            None
        }
        Ok(mode) => Some(mode),
        Err(CommandError::ModeOutOfRange(i)) => {
            warn!("stored mode index {} out of range, starting idle", i);
            None
        }
        Err(_) => None,
    }
}

fn persist(result: Result<(), StorageError>, what: &str) {
    if let Err(e) = result {
        warn!("failed to persist {}: {}", what, e);
    }
}
