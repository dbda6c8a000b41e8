//! Recording doubles for the display bus. SPI writes, control line changes
//! and delays all land in one shared log so their relative order can be
//! asserted.

use core::cell::RefCell;
use core::convert::Infallible;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_hal::spi::{ErrorType as SpiErrorType, SpiBus};

use super::{CASET, RAMWR, RASET};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Cs(bool),
    Dc(bool),
    Rst(bool),
    Write(Vec<u8>),
    DelayMs(u32),
}

#[derive(Debug, Clone, Copy)]
pub enum Role {
    Cs,
    Dc,
    Rst,
}

#[derive(Debug, Clone, Default)]
pub struct Recorder(Rc<RefCell<Vec<Event>>>);

impl Recorder {
    pub fn spi(&self) -> RecordingSpi {
        RecordingSpi(self.clone())
    }

    pub fn pin(&self, role: Role) -> RecordingPin {
        RecordingPin {
            log: self.clone(),
            role,
        }
    }

    pub fn delay(&self) -> RecordingDelay {
        RecordingDelay(self.clone())
    }

    pub fn take(&self) -> Vec<Event> {
        core::mem::take(&mut *self.0.borrow_mut())
    }

    fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }
}

#[derive(Debug)]
pub struct RecordingSpi(Recorder);

impl SpiErrorType for RecordingSpi {
    type Error = Infallible;
}

impl SpiBus<u8> for RecordingSpi {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        words.fill(0);
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        self.0.push(Event::Write(words.to_vec()));
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        read.fill(0);
        self.write(write)
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.0.push(Event::Write(words.to_vec()));
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[derive(Debug)]
pub struct RecordingPin {
    log: Recorder,
    role: Role,
}

impl RecordingPin {
    fn set(&mut self, high: bool) {
        let event = match self.role {
            Role::Cs => Event::Cs(high),
            Role::Dc => Event::Dc(high),
            Role::Rst => Event::Rst(high),
        };
        self.log.push(event);
    }
}

impl PinErrorType for RecordingPin {
    type Error = Infallible;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}

#[derive(Debug)]
pub struct RecordingDelay(Recorder);

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, _ns: u32) {}

    fn delay_ms(&mut self, ms: u32) {
        self.0.push(Event::DelayMs(ms));
    }
}

/// Commands with their parameter bytes, recovered from the DC line state.
/// Writes while DC is high are appended to the preceding command.
pub fn commands(events: &[Event]) -> Vec<(u8, Vec<u8>)> {
    let mut out: Vec<(u8, Vec<u8>)> = Vec::new();
    let mut data_mode = false;
    for event in events {
        match event {
            Event::Dc(high) => data_mode = *high,
            Event::Write(bytes) if data_mode => {
                if let Some((_, params)) = out.last_mut() {
                    params.extend_from_slice(bytes);
                }
            }
            Event::Write(bytes) => {
                for &cmd in bytes {
                    out.push((cmd, Vec::new()));
                }
            }
            _ => {}
        }
    }
    out
}

/// Number of window address pairs (CASET followed by RASET)
pub fn window_count(events: &[Event]) -> usize {
    let cmds = commands(events);
    cmds.windows(2)
        .filter(|pair| pair[0].0 == CASET && pair[1].0 == RASET)
        .count()
}

/// Number of data frames that follow a RAMWR
pub fn memory_writes(events: &[Event]) -> usize {
    commands(events)
        .iter()
        .filter(|(cmd, params)| *cmd == RAMWR && !params.is_empty())
        .count()
}
