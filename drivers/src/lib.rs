#![cfg_attr(not(test), no_std)]
//! Drivers for a round-display wrist-worn board
//!
//! This library talks to the two peripherals that need real protocol work on
//! the board: the QMI8658 6-axis IMU on I2C and the GC9A01A 240x240 round LCD on
//! SPI. It also carries the small PWM backlight controller and the battery
//! gauge arithmetic used by the watch faces.

// must stay first so the logging macros are visible to every module below
mod fmt;

/// PWM backlight duty-cycle controller.
pub mod backlight;

/// Battery voltage and charge estimation from the ADC divider.
pub mod battery;

/// GC9A01A round LCD controller driver.
pub mod gc9a01a;

/// QMI8658 6-axis IMU driver.
pub mod qmi8658;

extern crate alloc;

use core::convert::Infallible;
use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_hal::i2c::I2c;
use embedded_hal::pwm::{ErrorType as PwmErrorType, SetDutyCycle};

/// Register-addressed access to a single device on an I2C bus.
#[derive(Debug)]
pub struct BlockingRegisterDevice<I2C> {
    i2c: I2C,
    adr: u8,
}

impl<I2C> BlockingRegisterDevice<I2C>
where
    I2C: I2c,
{
    pub fn new(i2c: I2C, adr: u8) -> Self {
        Self { i2c, adr }
    }

    pub fn address(&self) -> u8 {
        self.adr
    }

    /// Points subsequent transfers at another bus address. Used during discovery.
    pub fn set_address(&mut self, adr: u8) {
        self.adr = adr;
    }

    pub fn read_register(&mut self, register: u8) -> Result<u8, I2C::Error> {
        let mut buffer = [0u8];
        self.i2c.write_read(self.adr, &[register], &mut buffer)?;
        Ok(buffer[0])
    }

    /// Reads `buffer.len()` consecutive registers starting at `register`.
    pub fn read_register_buffer(
        &mut self,
        register: u8,
        buffer: &mut [u8],
    ) -> Result<(), I2C::Error> {
        self.i2c.write_read(self.adr, &[register], buffer)
    }

    /// Writes `[register, data...]` in a single transfer.
    pub fn write_register(&mut self, register_and_data: &[u8]) -> Result<(), I2C::Error> {
        self.i2c.write(self.adr, register_and_data)
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

/// Placeholder for a pin role that is not wired on the board.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPin;

impl PinErrorType for NoPin {
    type Error = Infallible;
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl PwmErrorType for NoPin {
    type Error = Infallible;
}

impl SetDutyCycle for NoPin {
    fn max_duty_cycle(&self) -> u16 {
        u16::MAX
    }

    fn set_duty_cycle(&mut self, _duty: u16) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    #[test]
    fn test_read_register() {
        let expectations = [I2cTransaction::write_read(0x6A, vec![0x00], vec![0x05])];
        let mut i2c = I2cMock::new(&expectations);
        let mut dev = BlockingRegisterDevice::new(i2c.clone(), 0x6A);

        assert_eq!(dev.read_register(0x00).unwrap(), 0x05);
        i2c.done();
    }

    #[test]
    fn test_read_register_buffer() {
        let expectations = [I2cTransaction::write_read(
            0x6B,
            vec![0x33],
            vec![0x00, 0x19],
        )];
        let mut i2c = I2cMock::new(&expectations);
        let mut dev = BlockingRegisterDevice::new(i2c.clone(), 0x6B);

        let mut buffer = [0u8; 2];
        dev.read_register_buffer(0x33, &mut buffer).unwrap();
        assert_eq!(buffer, [0x00, 0x19]);
        i2c.done();
    }

    #[test]
    fn test_write_register_after_address_change() {
        let expectations = [I2cTransaction::write(0x6B, vec![0x08, 0x03])];
        let mut i2c = I2cMock::new(&expectations);
        let mut dev = BlockingRegisterDevice::new(i2c.clone(), 0x6A);

        dev.set_address(0x6B);
        assert_eq!(dev.address(), 0x6B);
        dev.write_register(&[0x08, 0x03]).unwrap();
        i2c.done();
    }

    #[test]
    fn test_bus_error_is_returned() {
        let expectations =
            [I2cTransaction::write_read(0x6A, vec![0x00], vec![0x00]).with_error(ErrorKind::Other)];
        let mut i2c = I2cMock::new(&expectations);
        let mut dev = BlockingRegisterDevice::new(i2c.clone(), 0x6A);

        assert!(dev.read_register(0x00).is_err());
        i2c.done();
    }
}
