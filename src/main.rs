//! Chamberctl Firmware: Main Entry Point
//!
//! Hexagonal architecture with a fixed-period control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   LogEventSink   NvsAdapter   Esp32Time       │
//! │  (Sensor+Actuator) (EventSink)    (Mode+Config) (clock)        │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            ThermalEngine (pure logic)                  │    │
//! │  │  FSM · FaultMonitor · Hysteresis · Cooldown            │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  CommandQueue (embassy-sync) · Tach ISR → PulseCounter         │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::delay::Ets;
use log::{error, info, warn};

use chamberctl::adapters::hardware::HardwareAdapter;
use chamberctl::adapters::log_sink::LogEventSink;
use chamberctl::adapters::nvs::{load_config_or_default, NvsAdapter};
use chamberctl::adapters::time::Esp32TimeAdapter;
use chamberctl::app::commands::CommandQueue;
use chamberctl::app::service::ThermalEngine;
use chamberctl::drivers::dht22::Dht22;
use chamberctl::drivers::ds18b20::Ds18b20Pair;
use chamberctl::drivers::fan::FanActuator;
use chamberctl::drivers::hw_init::{
    self, GpioOutput, LedcChannel, OpenDrainPin, FAN_DUTY_BITS, LEDC_CH_FAN, LEDC_CH_SERVO,
    SERVO_DUTY_BITS,
};
use chamberctl::drivers::onewire::OneWire;
use chamberctl::drivers::vent::{ServoVentMotor, VentActuator, VentTimings};
use chamberctl::pins;
use chamberctl::sensors::tach::FAN_TACH_PULSES;
use chamberctl::sensors::SensorHub;

/// Control loop period.  Every deadline is checked against the monotonic
/// clock, so jitter here only delays transitions, it never skips them.
const LOOP_PERIOD_MS: u64 = 50;

/// Commands from the UI and the network task land here and are applied at
/// the next tick boundary.
static COMMANDS: CommandQueue = CommandQueue::new();

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Chamberctl v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Peripherals ────────────────────────────────────────
    if let Err(e) = hw_init::init_peripherals() {
        // Without PWM neither actuator can be driven safely.
        error!("HAL init failed: {}, halting", e);
        return Err(anyhow::anyhow!("peripheral init failed: {}", e));
    }
    if let Err(e) = hw_init::init_isr_service() {
        warn!("ISR service init failed: {}; fan RPM unavailable", e);
    }

    // ── 3. Storage + config ───────────────────────────────────
    let mut nvs = NvsAdapter::new().map_err(|e| anyhow::anyhow!("NVS init failed: {}", e))?;
    let config = load_config_or_default(&nvs);

    // ── 4. Drivers ────────────────────────────────────────────
    let probes = Ds18b20Pair::discover(OneWire::new(OpenDrainPin(pins::ONEWIRE_GPIO)), Ets);
    let ambient = Dht22::new(
        OpenDrainPin(pins::AMBIENT_DHT_GPIO),
        Ets,
        Esp32TimeAdapter::new(),
    );
    let sensor_hub = SensorHub::new(probes, ambient, &FAN_TACH_PULSES, &config);

    let vent = VentActuator::new(
        ServoVentMotor::new(LedcChannel::new(LEDC_CH_SERVO, SERVO_DUTY_BITS)),
        VentTimings::from_config(&config),
    );
    let fan = FanActuator::new(
        LedcChannel::new(LEDC_CH_FAN, FAN_DUTY_BITS),
        GpioOutput(pins::FAN_POWER_GPIO),
        config.fan_min_duty,
    );

    let mut hw = HardwareAdapter::new(sensor_hub, vent, fan);
    let mut log_sink = LogEventSink::new();
    let clock = Esp32TimeAdapter::new();

    // ── 5. Engine ─────────────────────────────────────────────
    let mut engine = ThermalEngine::new(config, &COMMANDS);
    engine.start(&mut hw, &nvs, &mut log_sink, clock.uptime_ms());

    info!("System ready. Entering control loop.");

    // ── 6. Control loop ───────────────────────────────────────
    loop {
        let started = clock.uptime_ms();
        engine.tick(&mut hw, &mut nvs, &mut log_sink, started);

        let elapsed = clock.uptime_ms().saturating_sub(started);
        std::thread::sleep(std::time::Duration::from_millis(
            LOOP_PERIOD_MS.saturating_sub(elapsed),
        ));
    }
}
