//! GPIO / peripheral pin assignments for the chamber controller board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Vent actuator (continuous-rotation servo)
// ---------------------------------------------------------------------------

/// LEDC PWM output driving the vent servo signal line.
pub const VENT_SERVO_GPIO: i32 = 4;

// ---------------------------------------------------------------------------
// Exhaust fan (4-wire PWM fan behind a high-side power switch)
// ---------------------------------------------------------------------------

/// LEDC PWM channel for fan speed control.
pub const FAN_PWM_GPIO: i32 = 5;
/// Digital output: HIGH = fan powered, LOW = hard-kill (true zero RPM).
pub const FAN_POWER_GPIO: i32 = 6;
/// Open-collector tachometer input, two pulses per revolution.
pub const FAN_TACH_GPIO: i32 = 7;

// ---------------------------------------------------------------------------
// Temperature probes
// ---------------------------------------------------------------------------

/// Shared 1-Wire bus: DS18B20 chamber + intake probes.
pub const ONEWIRE_GPIO: i32 = 8;
/// DHT22 ambient temperature / humidity data line.
pub const AMBIENT_DHT_GPIO: i32 = 9;

// ---------------------------------------------------------------------------
// PWM configuration
// ---------------------------------------------------------------------------

/// Servo frame rate (standard 50 Hz / 20 ms period).
pub const SERVO_PWM_FREQ_HZ: u32 = 50;
/// LEDC base frequency for the fan (25 kHz, Intel 4-wire fan PWM).
pub const FAN_PWM_FREQ_HZ: u32 = 25_000;
