//! Sensor and actuator drivers plus one-shot hardware initialisation.

pub mod dht22;
pub mod ds18b20;
pub mod fan;
pub mod hw_init;
pub mod onewire;
pub mod vent;

/// Run `f` with interrupts masked on the calling core.  Bit slots that
/// sample the line at a fixed offset from an edge run inside one.
#[cfg(target_os = "espidf")]
pub fn interrupt_free<R>(f: impl FnOnce() -> R) -> R {
    esp_idf_hal::interrupt::free(f)
}

/// Host builds have no interrupts to mask.
#[cfg(not(target_os = "espidf"))]
pub fn interrupt_free<R>(f: impl FnOnce() -> R) -> R {
    f()
}
