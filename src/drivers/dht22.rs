//! DHT22 / AM2302 ambient temperature + humidity sensor.
//!
//! Single-wire, open-drain.  The host pulls the line low for >1 ms, the
//! sensor answers 80 µs low / 80 µs high, then clocks out 40 bits.  Each bit
//! is 50 µs low followed by ~27 µs high (0) or ~70 µs high (1).
//!
//! ```text
//!  byte:  0      1      2      3      4
//!        RH_hi  RH_lo  T_hi   T_lo   checksum = (b0+b1+b2+b3) & 0xFF
//!  RH = u16/10 %,  T = (u16 & 0x7FFF)/10 °C, bit 15 = sign
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use super::interrupt_free;
use crate::error::SensorError;
use crate::sensors::ambient::{AmbientProbe, AmbientReading};

/// Longest any single phase of the frame may last.
const PHASE_TIMEOUT_US: u32 = 100;
/// High phases longer than this decode as a 1 bit.
const ONE_THRESHOLD_US: u32 = 40;

/// Decode a 5-byte frame.
pub fn decode_frame(frame: [u8; 5]) -> Result<AmbientReading, SensorError> {
    let sum = frame[..4]
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_add(b));
    if sum != frame[4] {
        return Err(SensorError::ChecksumMismatch);
    }

    let humidity = u16::from_be_bytes([frame[0], frame[1]]);
    let raw_temp = u16::from_be_bytes([frame[2] & 0x7F, frame[3]]);
    let mut temperature_c = f32::from(raw_temp) / 10.0;
    if frame[2] & 0x80 != 0 {
        temperature_c = -temperature_c;
    }

    Ok(AmbientReading {
        temperature_c,
        humidity_pct: f32::from(humidity) / 10.0,
    })
}

/// Free-running microsecond counter used to measure pulse widths.
pub trait MicrosClock {
    fn now_us(&self) -> u64;
}

pub struct Dht22<P, D, C> {
    pin: P,
    delay: D,
    clock: C,
}

impl<P: InputPin + OutputPin, D: DelayNs, C: MicrosClock> Dht22<P, D, C> {
    pub fn new(pin: P, delay: D, clock: C) -> Self {
        Self { pin, delay, clock }
    }

    /// Spin while the line stays at `high`; returns the phase length in µs
    /// as measured by the clock, so pin read latency is included.
    fn wait_while(&mut self, high: bool) -> Result<u32, SensorError> {
        let start = self.clock.now_us();
        loop {
            let elapsed = self.clock.now_us().saturating_sub(start) as u32;
            if self.pin.is_high().map_err(|_| SensorError::BusFault)? != high {
                return Ok(elapsed);
            }
            if elapsed >= PHASE_TIMEOUT_US {
                return Err(SensorError::BusFault);
            }
        }
    }

    fn read_frame(&mut self) -> Result<[u8; 5], SensorError> {
        self.pin.set_low().map_err(|_| SensorError::BusFault)?;
        self.delay.delay_us(1_100);
        self.pin.set_high().map_err(|_| SensorError::BusFault)?;

        interrupt_free(|| -> Result<[u8; 5], SensorError> {
            // Sensor response: line released high, then 80 µs low + 80 µs high.
            self.wait_while(true)
                .map_err(|_| SensorError::Disconnected)?;
            self.wait_while(false)?;
            self.wait_while(true)?;

            let mut frame = [0u8; 5];
            for bit in 0..40 {
                self.wait_while(false)?;
                let high_us = self.wait_while(true)?;
                if high_us > ONE_THRESHOLD_US {
                    frame[bit / 8] |= 0x80 >> (bit % 8);
                }
            }
            Ok(frame)
        })
    }
}

impl<P: InputPin + OutputPin, D: DelayNs, C: MicrosClock> AmbientProbe for Dht22<P, D, C> {
    fn read(&mut self) -> Result<AmbientReading, SensorError> {
        let frame = self.read_frame()?;
        decode_frame(frame)
    }
}
