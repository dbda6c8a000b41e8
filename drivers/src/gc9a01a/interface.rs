use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use super::{DisplayError, Window, CASET, RAMWR, RASET};

/// Pixels staged per SPI write when repeating a colour
const REPEAT_CHUNK_PIXELS: usize = 64;

/// Pixel payload for a memory write
#[derive(Debug, Clone, Copy)]
pub enum Pixels<'a> {
    /// Big endian RGB565 bytes, two per pixel
    Bytes(&'a [u8]),
    /// One big endian RGB565 pixel repeated `count` times
    Repeat([u8; 2], usize),
}

/// 4-wire SPI framing: chip select, data/command line and the bus.
///
/// Every frame drives CS low, sends one command byte with DC low and, if
/// there are parameters, sends them with DC high before releasing CS.
/// Command and parameter bytes never share a write.
#[derive(Debug)]
pub struct SpiInterface<SPI, DC, CS> {
    spi: SPI,
    dc: Option<DC>,
    cs: Option<CS>,
}

impl<SPI, DC, CS> SpiInterface<SPI, DC, CS>
where
    SPI: SpiBus<u8>,
    DC: OutputPin,
    CS: OutputPin,
{
    pub fn new(spi: SPI, dc: Option<DC>, cs: Option<CS>) -> Self {
        Self { spi, dc, cs }
    }

    /// Send `cmd` followed by its parameters, if any.
    pub fn command(&mut self, cmd: u8, params: &[u8]) -> Result<(), DisplayError> {
        trace!("command {:#x}, {} parameter bytes", cmd, params.len());
        self.select()?;
        self.set_data_mode(false)?;
        self.spi.write(&[cmd])?;
        if !params.is_empty() {
            self.spi.flush()?;
            self.set_data_mode(true)?;
            self.spi.write(params)?;
        }
        self.spi.flush()?;
        self.deselect()
    }

    /// Address `window` and open a memory write. Pixel data has to follow in
    /// a separate data frame.
    pub fn set_window(&mut self, window: &Window) -> Result<(), DisplayError> {
        self.command(CASET, &window.column_params())?;
        self.command(RASET, &window.row_params())?;
        self.command(RAMWR, &[])
    }

    /// Address `window` and stream `pixels` into it.
    pub fn write_memory(&mut self, window: &Window, pixels: Pixels<'_>) -> Result<(), DisplayError> {
        self.set_window(window)?;
        self.select()?;
        self.set_data_mode(true)?;
        match pixels {
            Pixels::Bytes(bytes) => self.spi.write(bytes)?,
            Pixels::Repeat(color, count) => {
                let mut chunk = [0u8; REPEAT_CHUNK_PIXELS * 2];
                for px in chunk.chunks_exact_mut(2) {
                    px.copy_from_slice(&color);
                }
                let mut remaining = count;
                while remaining > 0 {
                    let n = remaining.min(REPEAT_CHUNK_PIXELS);
                    self.spi.write(&chunk[..n * 2])?;
                    remaining -= n;
                }
            }
        }
        self.spi.flush()?;
        self.deselect()
    }

    /// Drive chip select inactive
    pub fn deselect(&mut self) -> Result<(), DisplayError> {
        if let Some(cs) = &mut self.cs {
            cs.set_high().map_err(|_| DisplayError::Pin)?;
        }
        Ok(())
    }

    fn select(&mut self) -> Result<(), DisplayError> {
        if let Some(cs) = &mut self.cs {
            cs.set_low().map_err(|_| DisplayError::Pin)?;
        }
        Ok(())
    }

    fn set_data_mode(&mut self, data: bool) -> Result<(), DisplayError> {
        if let Some(dc) = &mut self.dc {
            if data {
                dc.set_high().map_err(|_| DisplayError::Pin)?;
            } else {
                dc.set_low().map_err(|_| DisplayError::Pin)?;
            }
        }
        Ok(())
    }

    pub fn release(self) -> (SPI, Option<DC>, Option<CS>) {
        (self.spi, self.dc, self.cs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gc9a01a::recorder::{commands, Event, Recorder, Role};
    use crate::NoPin;

    #[test]
    fn test_command_framing_with_chip_select() {
        let log = Recorder::default();
        let mut di = SpiInterface::new(log.spi(), Some(log.pin(Role::Dc)), Some(log.pin(Role::Cs)));

        di.command(0x36, &[0xC8]).unwrap();
        di.command(0x29, &[]).unwrap();

        assert_eq!(
            log.take(),
            vec![
                Event::Cs(false),
                Event::Dc(false),
                Event::Write(vec![0x36]),
                Event::Dc(true),
                Event::Write(vec![0xC8]),
                Event::Cs(true),
                Event::Cs(false),
                Event::Dc(false),
                Event::Write(vec![0x29]),
                Event::Cs(true),
            ]
        );
    }

    #[test]
    fn test_command_framing_without_chip_select() {
        let log = Recorder::default();
        let mut di: SpiInterface<_, _, NoPin> =
            SpiInterface::new(log.spi(), Some(log.pin(Role::Dc)), None);

        di.command(0x3A, &[0x05]).unwrap();

        assert_eq!(
            log.take(),
            vec![
                Event::Dc(false),
                Event::Write(vec![0x3A]),
                Event::Dc(true),
                Event::Write(vec![0x05]),
            ]
        );
    }

    #[test]
    fn test_set_window_sends_inclusive_bounds() {
        let log = Recorder::default();
        let mut di = SpiInterface::new(log.spi(), Some(log.pin(Role::Dc)), Some(log.pin(Role::Cs)));

        di.set_window(&Window::new(60, 60, 120, 120).unwrap())
            .unwrap();

        assert_eq!(
            commands(&log.take()),
            vec![
                (CASET, vec![0x00, 60, 0x00, 179]),
                (RASET, vec![0x00, 60, 0x00, 179]),
                (RAMWR, vec![]),
            ]
        );
    }

    #[test]
    fn test_pixel_data_follows_in_separate_frame() {
        let log = Recorder::default();
        let mut di = SpiInterface::new(log.spi(), Some(log.pin(Role::Dc)), Some(log.pin(Role::Cs)));
        let window = Window::new(0, 0, 1, 1).unwrap();

        di.write_memory(&window, Pixels::Bytes(&[0xF8, 0x00]))
            .unwrap();

        let events = log.take();
        let tail = &events[events.len() - 8..];
        assert_eq!(
            tail,
            &[
                // RAMWR frame closes before any pixel data
                Event::Cs(false),
                Event::Dc(false),
                Event::Write(vec![RAMWR]),
                Event::Cs(true),
                Event::Cs(false),
                Event::Dc(true),
                Event::Write(vec![0xF8, 0x00]),
                Event::Cs(true),
            ][..]
        );
    }

    #[test]
    fn test_repeated_colour_is_chunked() {
        let log = Recorder::default();
        let mut di: SpiInterface<_, _, NoPin> =
            SpiInterface::new(log.spi(), Some(log.pin(Role::Dc)), None);
        let window = Window::new(0, 0, 10, 10).unwrap();

        di.write_memory(&window, Pixels::Repeat([0x12, 0x34], 100))
            .unwrap();

        let cmds = commands(&log.take());
        let (cmd, data) = cmds.last().unwrap();
        assert_eq!(*cmd, RAMWR);
        assert_eq!(data.len(), 200);
        assert!(data.chunks_exact(2).all(|px| px == &[0x12, 0x34]));
    }
}
