//! Bit-banged 1-Wire bus master over an open-drain GPIO.
//!
//! Timings follow the Maxim standard-speed slot table.  Read slots are
//! time critical (the sample point is 15 µs after the falling edge), so
//! each one runs with interrupts masked.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use heapless::Vec;

use super::interrupt_free;
use crate::error::SensorError;

pub const SEARCH_ROM: u8 = 0xF0;
pub const MATCH_ROM: u8 = 0x55;
pub const SKIP_ROM: u8 = 0xCC;

/// Upper bound on devices a search will collect.
pub const MAX_DEVICES: usize = 4;

/// 64-bit ROM code (family, serial, CRC), least significant byte first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Address(pub u64);

impl Address {
    pub fn family(&self) -> u8 {
        self.0.to_le_bytes()[0]
    }
}

/// Dallas/Maxim CRC-8 (x⁸ + x⁵ + x⁴ + 1, reflected).
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        let mut b = byte;
        for _ in 0..8 {
            let mix = (crc ^ b) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            b >>= 1;
        }
    }
    crc
}

pub struct OneWire<P> {
    pin: P,
}

impl<P: InputPin + OutputPin> OneWire<P> {
    /// `pin` must be configured open-drain with an external pull-up.
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    fn release(&mut self) -> Result<(), SensorError> {
        self.pin.set_high().map_err(|_| SensorError::BusFault)
    }

    fn pull_low(&mut self) -> Result<(), SensorError> {
        self.pin.set_low().map_err(|_| SensorError::BusFault)
    }

    fn is_high(&mut self) -> Result<bool, SensorError> {
        self.pin.is_high().map_err(|_| SensorError::BusFault)
    }

    /// Reset pulse.  `Err(Disconnected)` when no device answers with a
    /// presence pulse.
    pub fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), SensorError> {
        // The pull-up must have the line high before we start.
        let mut retries = 125;
        while !self.is_high()? {
            if retries == 0 {
                return Err(SensorError::BusFault);
            }
            retries -= 1;
            delay.delay_us(2);
        }

        self.pull_low()?;
        delay.delay_us(480);
        self.release()?;
        delay.delay_us(70);
        let present = !self.is_high()?;
        delay.delay_us(410);

        if present {
            Ok(())
        } else {
            Err(SensorError::Disconnected)
        }
    }

    pub fn write_bit(&mut self, bit: bool, delay: &mut impl DelayNs) -> Result<(), SensorError> {
        let (low_us, recovery_us) = if bit { (10, 55) } else { (65, 5) };
        self.pull_low()?;
        delay.delay_us(low_us);
        self.release()?;
        delay.delay_us(recovery_us);
        Ok(())
    }

    pub fn read_bit(&mut self, delay: &mut impl DelayNs) -> Result<bool, SensorError> {
        let bit = interrupt_free(|| -> Result<bool, SensorError> {
            self.pull_low()?;
            delay.delay_us(3);
            self.release()?;
            delay.delay_us(10);
            self.is_high()
        })?;
        delay.delay_us(53);
        Ok(bit)
    }

    pub fn write_byte(&mut self, byte: u8, delay: &mut impl DelayNs) -> Result<(), SensorError> {
        for i in 0..8 {
            self.write_bit((byte >> i) & 1 == 1, delay)?;
        }
        Ok(())
    }

    pub fn read_byte(&mut self, delay: &mut impl DelayNs) -> Result<u8, SensorError> {
        let mut byte = 0;
        for i in 0..8 {
            if self.read_bit(delay)? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }

    /// Reset, address one device (or all with `None`), send `command`.
    pub fn send_command(
        &mut self,
        address: Option<Address>,
        command: u8,
        delay: &mut impl DelayNs,
    ) -> Result<(), SensorError> {
        self.reset(delay)?;
        match address {
            Some(a) => {
                self.write_byte(MATCH_ROM, delay)?;
                for b in a.0.to_le_bytes() {
                    self.write_byte(b, delay)?;
                }
            }
            None => self.write_byte(SKIP_ROM, delay)?,
        }
        self.write_byte(command, delay)
    }

    /// Enumerate ROM codes on the bus (Maxim application note 187), sorted
    /// so the order is stable across boots.
    pub fn search(
        &mut self,
        delay: &mut impl DelayNs,
    ) -> Result<Vec<Address, MAX_DEVICES>, SensorError> {
        let mut found: Vec<Address, MAX_DEVICES> = Vec::new();
        let mut rom = [0u8; 8];
        let mut last_discrepancy = 0u8;

        'search: loop {
            self.reset(delay)?;
            self.write_byte(SEARCH_ROM, delay)?;

            let mut last_zero = 0u8;
            for bit_number in 1..=64u8 {
                let byte = usize::from((bit_number - 1) / 8);
                let mask = 1u8 << ((bit_number - 1) % 8);

                let id_bit = self.read_bit(delay)?;
                let cmp_bit = self.read_bit(delay)?;
                if id_bit && cmp_bit {
                    // No device answered this slot.
                    break 'search;
                }

                let direction = if id_bit != cmp_bit {
                    id_bit
                } else if bit_number < last_discrepancy {
                    rom[byte] & mask != 0
                } else {
                    bit_number == last_discrepancy
                };
                if id_bit == cmp_bit && !direction {
                    last_zero = bit_number;
                }

                if direction {
                    rom[byte] |= mask;
                } else {
                    rom[byte] &= !mask;
                }
                self.write_bit(direction, delay)?;
            }

            if crc8(&rom) != 0 {
                return Err(SensorError::ChecksumMismatch);
            }
            if found.push(Address(u64::from_le_bytes(rom))).is_err() {
                break;
            }
            last_discrepancy = last_zero;
            if last_discrepancy == 0 {
                break;
            }
        }

        found.sort_unstable();
        Ok(found)
    }
}
