//! One-shot hardware peripheral initialization and thin pin wrappers.
//!
//! Configures GPIO directions, LEDC timers/channels and the tachometer ISR
//! using raw ESP-IDF sys calls.  Called once from `main()` before the
//! control loop starts.  The wrappers at the bottom expose the configured
//! pins through `embedded-hal` traits so the drivers stay target-agnostic.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use core::convert::Infallible;

use embedded_hal::digital::{self, InputPin, OutputPin};
use embedded_hal::pwm::{self, SetDutyCycle};

#[cfg(target_os = "espidf")]
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    LedcInitFailed(i32),
    IsrInstallFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::LedcInitFailed(rc) => write!(f, "LEDC timer/channel config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
        }
    }
}

impl From<HwInitError> for crate::error::Error {
    fn from(_: HwInitError) -> Self {
        crate::error::Error::Init("peripheral init failed")
    }
}

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the control loop; single-threaded.
    unsafe {
        init_gpio()?;
        init_ledc()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── GPIO ──────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn config_pin(pin: i32, mode: gpio_mode_t, pull_up: bool) -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pin,
        mode,
        pull_up_en: if pull_up {
            gpio_pullup_t_GPIO_PULLUP_ENABLE
        } else {
            gpio_pullup_t_GPIO_PULLUP_DISABLE
        },
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    Ok(())
}

#[cfg(target_os = "espidf")]
unsafe fn init_gpio() -> Result<(), HwInitError> {
    unsafe {
        // Fan supply switch: starts LOW (hard-killed).
        config_pin(pins::FAN_POWER_GPIO, gpio_mode_t_GPIO_MODE_OUTPUT, false)?;
        gpio_set_level(pins::FAN_POWER_GPIO, 0);

        // Open-collector tach output needs the pull-up.
        config_pin(pins::FAN_TACH_GPIO, gpio_mode_t_GPIO_MODE_INPUT, true)?;

        // 1-Wire and DHT22 data lines: open drain, external 4k7 pull-ups.
        for pin in [pins::ONEWIRE_GPIO, pins::AMBIENT_DHT_GPIO] {
            config_pin(pin, gpio_mode_t_GPIO_MODE_INPUT_OUTPUT_OD, false)?;
            gpio_set_level(pin, 1);
        }
    }
    info!("hw_init: GPIO configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: register read on an already-configured pin.
    (unsafe { gpio_get_level(pin) }) != 0
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(_pin: i32) -> bool {
    true
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: pin was configured as an output in init_gpio(); main loop only.
    unsafe {
        gpio_set_level(pin, u32::from(high));
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}

// ── LEDC PWM ─────────────────────────────────────────────────

pub const LEDC_CH_SERVO: u32 = 0;
pub const LEDC_CH_FAN: u32 = 1;

/// 14-bit at 50 Hz gives ~1.2 µs servo resolution.
pub const SERVO_DUTY_BITS: u32 = 14;
/// 10-bit is the widest resolution LEDC reaches at 25 kHz from APB.
pub const FAN_DUTY_BITS: u32 = 10;

#[cfg(target_os = "espidf")]
unsafe fn init_ledc() -> Result<(), HwInitError> {
    let timers = [
        (ledc_timer_t_LEDC_TIMER_0, SERVO_DUTY_BITS, pins::SERVO_PWM_FREQ_HZ),
        (ledc_timer_t_LEDC_TIMER_1, FAN_DUTY_BITS, pins::FAN_PWM_FREQ_HZ),
    ];
    for (timer_num, bits, freq_hz) in timers {
        let cfg = ledc_timer_config_t {
            speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
            timer_num,
            duty_resolution: bits,
            freq_hz,
            clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
            ..Default::default()
        };
        let ret = unsafe { ledc_timer_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::LedcInitFailed(ret));
        }
    }

    let channels = [
        (LEDC_CH_SERVO, ledc_timer_t_LEDC_TIMER_0, pins::VENT_SERVO_GPIO),
        (LEDC_CH_FAN, ledc_timer_t_LEDC_TIMER_1, pins::FAN_PWM_GPIO),
    ];
    for (channel, timer_sel, gpio_num) in channels {
        let ret = unsafe {
            ledc_channel_config(&ledc_channel_config_t {
                speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
                channel,
                timer_sel,
                gpio_num,
                duty: 0,
                hpoint: 0,
                ..Default::default()
            })
        };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::LedcInitFailed(ret));
        }
    }

    info!("hw_init: LEDC configured (servo=CH0 @50Hz, fan=CH1 @25kHz)");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn ledc_set(channel: u32, duty: u32) -> Result<(), i32> {
    // SAFETY: channel configured in init_ledc(); only the main loop writes.
    unsafe {
        let ret = ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel, duty);
        if ret != ESP_OK as i32 {
            return Err(ret);
        }
        let ret = ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel);
        if ret != ESP_OK as i32 {
            return Err(ret);
        }
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn ledc_set(_channel: u32, _duty: u32) -> Result<(), i32> {
    Ok(())
}

// ── Tachometer ISR ───────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe extern "C" fn fan_tach_gpio_isr(_arg: *mut core::ffi::c_void) {
    crate::sensors::tach::fan_tach_isr_handler();
}

/// Install the per-pin GPIO ISR service and register the tach handler.
/// Call after init_peripherals() and before the control loop.
#[cfg(target_os = "espidf")]
pub fn init_isr_service() -> Result<(), HwInitError> {
    // SAFETY: gpio_install_isr_service is idempotent; ESP_ERR_INVALID_STATE
    // means it was already installed.  The handler only bumps an atomic.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK as i32 && ret != ESP_ERR_INVALID_STATE as i32 {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        gpio_set_intr_type(pins::FAN_TACH_GPIO, gpio_int_type_t_GPIO_INTR_NEGEDGE);
        let ret = gpio_isr_handler_add(
            pins::FAN_TACH_GPIO,
            Some(fan_tach_gpio_isr),
            core::ptr::null_mut(),
        );
        if ret != ESP_OK as i32 {
            return Err(HwInitError::IsrInstallFailed(ret));
        }
        gpio_intr_enable(pins::FAN_TACH_GPIO);
    }
    info!("hw_init: ISR service installed (fan tach)");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR service skipped");
    Ok(())
}

// ── embedded-hal wrappers ─────────────────────────────────────

/// A failed ESP-IDF call behind an embedded-hal trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EspError(pub i32);

impl pwm::Error for EspError {
    fn kind(&self) -> pwm::ErrorKind {
        pwm::ErrorKind::Other
    }
}

/// One configured LEDC channel.
pub struct LedcChannel {
    channel: u32,
    max_duty: u16,
}

impl LedcChannel {
    pub fn new(channel: u32, duty_bits: u32) -> Self {
        Self {
            channel,
            max_duty: ((1u32 << duty_bits) - 1) as u16,
        }
    }
}

impl pwm::ErrorType for LedcChannel {
    type Error = EspError;
}

impl SetDutyCycle for LedcChannel {
    fn max_duty_cycle(&self) -> u16 {
        self.max_duty
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), EspError> {
        ledc_set(self.channel, u32::from(duty.min(self.max_duty))).map_err(EspError)
    }
}

/// Push-pull output (fan supply switch).
pub struct GpioOutput(pub i32);

impl digital::ErrorType for GpioOutput {
    type Error = Infallible;
}

impl OutputPin for GpioOutput {
    fn set_low(&mut self) -> Result<(), Infallible> {
        gpio_write(self.0, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        gpio_write(self.0, true);
        Ok(())
    }
}

/// Open-drain data line: `set_high` releases, `set_low` drives.
pub struct OpenDrainPin(pub i32);

impl digital::ErrorType for OpenDrainPin {
    type Error = Infallible;
}

impl OutputPin for OpenDrainPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        gpio_write(self.0, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        gpio_write(self.0, true);
        Ok(())
    }
}

impl InputPin for OpenDrainPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(gpio_read(self.0))
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!gpio_read(self.0))
    }
}
