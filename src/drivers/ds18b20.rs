//! DS18B20 chamber + intake probes sharing one 1-Wire bus.
//!
//! Both probes convert together (SKIP ROM + CONVERT T) and are then read
//! individually by ROM code.  Conversion latency is owned by
//! [`TemperatureSampler`](crate::sensors::temperature::TemperatureSampler);
//! this driver never waits for it.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::{info, warn};

use super::onewire::{crc8, Address, OneWire};
use crate::error::SensorError;
use crate::sensors::temperature::{Probe, ProbeBus};

pub const FAMILY_CODE: u8 = 0x28;
pub const CONVERT_T: u8 = 0x44;
pub const READ_SCRATCHPAD: u8 = 0xBE;

/// Decode a 9-byte scratchpad into °C (12-bit, 1/16 °C per LSB).
pub fn decode_scratchpad(buf: &[u8; 9]) -> Result<f32, SensorError> {
    if crc8(&buf[..8]) != buf[8] {
        return Err(SensorError::ChecksumMismatch);
    }
    let raw = i16::from_le_bytes([buf[0], buf[1]]);
    Ok(f32::from(raw) / 16.0)
}

pub struct Ds18b20Pair<P, D> {
    wire: OneWire<P>,
    delay: D,
    chamber: Option<Address>,
    intake: Option<Address>,
}

impl<P: InputPin + OutputPin, D: DelayNs> Ds18b20Pair<P, D> {
    /// Search the bus and assign probes in ROM order: the lower code is the
    /// chamber probe, the next one the intake probe.  Missing probes read as
    /// disconnected rather than failing construction.
    pub fn discover(mut wire: OneWire<P>, mut delay: D) -> Self {
        let mut found = match wire.search(&mut delay) {
            Ok(found) => found,
            Err(e) => {
                warn!("ds18b20: bus search failed: {}", e);
                heapless::Vec::new()
            }
        };
        found.retain(|a| a.family() == FAMILY_CODE);
        info!("ds18b20: {} probe(s) on bus", found.len());

        let mut probes = found.into_iter();
        Self {
            wire,
            delay,
            chamber: probes.next(),
            intake: probes.next(),
        }
    }

    fn address(&self, probe: Probe) -> Option<Address> {
        match probe {
            Probe::Chamber => self.chamber,
            Probe::Intake => self.intake,
        }
    }
}

impl<P: InputPin + OutputPin, D: DelayNs> ProbeBus for Ds18b20Pair<P, D> {
    fn request_conversion(&mut self) -> Result<(), SensorError> {
        self.wire.send_command(None, CONVERT_T, &mut self.delay)
    }

    fn read_celsius(&mut self, probe: Probe) -> Result<f32, SensorError> {
        let address = self.address(probe).ok_or(SensorError::Disconnected)?;
        self.wire
            .send_command(Some(address), READ_SCRATCHPAD, &mut self.delay)?;

        let mut buf = [0u8; 9];
        for b in &mut buf {
            *b = self.wire.read_byte(&mut self.delay)?;
        }
        decode_scratchpad(&buf)
    }
}
