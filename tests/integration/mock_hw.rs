//! Mock hardware for integration tests.
//!
//! The real [`HardwareAdapter`] runs on top of scripted `embedded-hal`
//! doubles, so the vent timing, fan output contract and sensor cadences
//! under test are the production ones.  Every write to a motor, PWM or
//! power pin lands in a shared [`Plant`] record that tests inspect.

use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;

use chamberctl::adapters::hardware::HardwareAdapter;
use chamberctl::app::commands::{CommandQueue, EngineCommand};
use chamberctl::app::events::AppEvent;
use chamberctl::app::ports::{EventSink, ModeStorePort};
use chamberctl::app::service::ThermalEngine;
use chamberctl::config::ThermalConfig;
use chamberctl::drivers::fan::FanActuator;
use chamberctl::drivers::vent::{VentActuator, VentDrive, VentMotor, VentTimings};
use chamberctl::error::{ActuatorError, SensorError, StorageError};
use chamberctl::scheduler::Millis;
use chamberctl::sensors::SensorHub;
use chamberctl::sensors::ambient::{AmbientProbe, AmbientReading};
use chamberctl::sensors::tach::PulseCounter;
use chamberctl::sensors::temperature::{Probe, ProbeBus};

/// Loop period used by [`Rig::tick`].
pub const TICK_MS: Millis = 100;

// ── Plant record ──────────────────────────────────────────────

/// Simulated environment plus the log of everything written to it.
#[derive(Debug, Default)]
pub struct Plant {
    /// `None` = probe disconnected.
    pub chamber_c: Option<f32>,
    pub intake_c: Option<f32>,
    pub ambient_c: Option<f32>,
    pub drives: Vec<VentDrive>,
    pub fan_pwm: Vec<u16>,
    pub fan_power: Vec<bool>,
}

pub type SharedPlant = Rc<RefCell<Plant>>;

#[allow(dead_code)]
impl Plant {
    pub fn last_fan_pwm(&self) -> Option<u16> {
        self.fan_pwm.last().copied()
    }

    pub fn fan_powered(&self) -> bool {
        self.fan_power.last().copied().unwrap_or(false)
    }
}

// ── Sensor doubles ────────────────────────────────────────────

pub struct MockProbes(SharedPlant);

impl ProbeBus for MockProbes {
    fn request_conversion(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    fn read_celsius(&mut self, probe: Probe) -> Result<f32, SensorError> {
        let plant = self.0.borrow();
        let value = match probe {
            Probe::Chamber => plant.chamber_c,
            Probe::Intake => plant.intake_c,
        };
        value.ok_or(SensorError::Disconnected)
    }
}

pub struct MockAmbient(SharedPlant);

impl AmbientProbe for MockAmbient {
    fn read(&mut self) -> Result<AmbientReading, SensorError> {
        self.0
            .borrow()
            .ambient_c
            .map(|temperature_c| AmbientReading {
                temperature_c,
                humidity_pct: 40.0,
            })
            .ok_or(SensorError::ChecksumMismatch)
    }
}

// ── Actuator doubles ──────────────────────────────────────────

pub struct MockMotor(SharedPlant);

impl VentMotor for MockMotor {
    fn drive(&mut self, drive: VentDrive) -> Result<(), ActuatorError> {
        self.0.borrow_mut().drives.push(drive);
        Ok(())
    }
}

pub struct MockFanPwm(SharedPlant);

impl embedded_hal::pwm::ErrorType for MockFanPwm {
    type Error = Infallible;
}

impl embedded_hal::pwm::SetDutyCycle for MockFanPwm {
    fn max_duty_cycle(&self) -> u16 {
        255
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.0.borrow_mut().fan_pwm.push(duty);
        Ok(())
    }
}

pub struct MockPowerPin(SharedPlant);

impl embedded_hal::digital::ErrorType for MockPowerPin {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for MockPowerPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().fan_power.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().fan_power.push(true);
        Ok(())
    }
}

pub type MockHardware = HardwareAdapter<MockProbes, MockAmbient, MockMotor, MockFanPwm, MockPowerPin>;

pub fn build_hardware(config: &ThermalConfig, tach: &'static PulseCounter) -> (MockHardware, SharedPlant) {
    let plant = SharedPlant::default();
    let hub = SensorHub::new(
        MockProbes(plant.clone()),
        MockAmbient(plant.clone()),
        tach,
        config,
    );
    let vent = VentActuator::new(MockMotor(plant.clone()), VentTimings::from_config(config));
    let fan = FanActuator::new(
        MockFanPwm(plant.clone()),
        MockPowerPin(plant.clone()),
        config.fan_min_duty,
    );
    (HardwareAdapter::new(hub, vent, fan), plant)
}

// ── Mode store ────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MockStore {
    pub mode: Option<u8>,
    pub custom_target: Option<f32>,
    pub fail_loads: bool,
    pub fail_writes: bool,
    pub writes: usize,
}

#[allow(dead_code)]
impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: u8) -> Self {
        Self {
            mode: Some(mode),
            ..Self::default()
        }
    }
}

impl ModeStorePort for MockStore {
    fn load_mode(&self) -> Result<Option<u8>, StorageError> {
        if self.fail_loads {
            return Err(StorageError::Io);
        }
        Ok(self.mode)
    }

    fn load_custom_target(&self) -> Result<Option<f32>, StorageError> {
        if self.fail_loads {
            return Err(StorageError::Io);
        }
        Ok(self.custom_target)
    }

    fn save_mode(&mut self, index: Option<u8>) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Io);
        }
        self.writes += 1;
        self.mode = index;
        Ok(())
    }

    fn save_custom_target(&mut self, target_c: f32) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Io);
        }
        self.writes += 1;
        self.custom_target = Some(target_c);
        Ok(())
    }
}

// ── Recording sink ────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn any(&self, pred: impl Fn(&AppEvent) -> bool) -> bool {
        self.events.iter().any(pred)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// A started engine wired to mocks, with a simulated clock.
pub struct Rig {
    pub engine: ThermalEngine<'static>,
    pub queue: &'static CommandQueue,
    pub hw: MockHardware,
    pub plant: SharedPlant,
    pub store: MockStore,
    pub sink: RecordingSink,
    pub now: Millis,
}

/// Shared counter for tests that never inject tach pulses.
pub static QUIET_TACH: PulseCounter = PulseCounter::new();

#[allow(dead_code)]
impl Rig {
    pub fn new() -> Self {
        Self::with(ThermalConfig::default(), MockStore::new(), &QUIET_TACH)
    }

    pub fn with(config: ThermalConfig, store: MockStore, tach: &'static PulseCounter) -> Self {
        let queue: &'static CommandQueue = Box::leak(Box::new(CommandQueue::new()));
        let (mut hw, plant) = build_hardware(&config, tach);
        let mut engine = ThermalEngine::new(config, queue);
        let mut sink = RecordingSink::default();
        engine.start(&mut hw, &store, &mut sink, 0);
        Self {
            engine,
            queue,
            hw,
            plant,
            store,
            sink,
            now: 0,
        }
    }

    /// Calibration length for the rig's config: close, open, close, each
    /// followed by a pause.
    pub fn calibration_ms(&self) -> Millis {
        let c = self.engine.config();
        Millis::from(c.vent_close_ms * 2 + c.vent_open_ms + c.vent_calibration_pause_ms * 3)
    }

    pub fn tick(&mut self) {
        self.now += TICK_MS;
        self.engine
            .tick(&mut self.hw, &mut self.store, &mut self.sink, self.now);
    }

    /// Tick at [`TICK_MS`] until at least `ms` of simulated time passed.
    pub fn run_for(&mut self, ms: Millis) {
        let until = self.now + ms;
        while self.now < until {
            self.tick();
        }
    }

    /// Finish vent calibration and let the first probe readings land.
    pub fn calibrate(&mut self) {
        let ms = self.calibration_ms() + 2 * TICK_MS;
        self.run_for(ms);
        assert!(self.engine.context().vent_ready, "vent should be calibrated");
    }

    /// Long enough for a fresh probe conversion to be collected.
    pub fn settle_sensors(&mut self) {
        self.run_for(2_000);
    }

    pub fn set_temps(&mut self, chamber_c: f32, intake_c: f32) {
        let mut plant = self.plant.borrow_mut();
        plant.chamber_c = Some(chamber_c);
        plant.intake_c = Some(intake_c);
    }

    pub fn set_chamber(&mut self, chamber_c: f32) {
        self.plant.borrow_mut().chamber_c = Some(chamber_c);
    }

    pub fn disconnect_chamber(&mut self) {
        self.plant.borrow_mut().chamber_c = None;
    }

    pub fn set_intake(&mut self, intake_c: f32) {
        self.plant.borrow_mut().intake_c = Some(intake_c);
    }

    pub fn set_ambient(&mut self, ambient_c: f32) {
        self.plant.borrow_mut().ambient_c = Some(ambient_c);
    }

    pub fn submit(&mut self, cmd: EngineCommand) {
        self.queue.submit(cmd).unwrap();
    }

    /// Submit a command and run one tick so it is applied.
    pub fn command(&mut self, cmd: EngineCommand) {
        self.submit(cmd);
        self.tick();
    }
}
