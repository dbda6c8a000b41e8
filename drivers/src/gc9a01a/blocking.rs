use alloc::vec;
use alloc::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;
use embedded_hal::spi::SpiBus;

use super::graphics::{BufferedContext, Context, DirectContext, FrameBuffer};
use super::interface::SpiInterface;
use super::{
    DisplayConfig, DisplayError, DisplayPins, RenderMode, ScanDirection, Window,
    GC9A01A_INIT_CMDS, MADCTL, POST_INIT_DELAY_MS, SWRESET, SWRESET_DELAY_MS,
};
use crate::backlight::{Backlight, BacklightError};

/// Storage behind the memoized full-panel context
#[derive(Debug)]
enum Primary {
    Direct,
    Buffered(Vec<u8>),
}

#[derive(Debug)]
pub struct GC9A01A<SPI, DC, CS, RST, BL, DELAY> {
    di: SpiInterface<SPI, DC, CS>,
    rst: Option<RST>,
    backlight: Backlight<BL>,
    delay: DELAY,
    config: DisplayConfig,
    primary: Option<Primary>,
}

impl<SPI, DC, CS, RST, BL, DELAY> GC9A01A<SPI, DC, CS, RST, BL, DELAY>
where
    SPI: SpiBus<u8>,
    DC: OutputPin,
    CS: OutputPin,
    RST: OutputPin,
    BL: SetDutyCycle,
    DELAY: DelayNs,
{
    pub fn new(
        spi: SPI,
        pins: DisplayPins<DC, CS, RST, BL>,
        delay: DELAY,
        config: DisplayConfig,
    ) -> Self {
        Self {
            di: SpiInterface::new(spi, pins.dc, pins.cs),
            rst: pins.rst,
            backlight: Backlight::new(pins.backlight),
            delay,
            config,
            primary: None,
        }
    }

    /// Reset the panel, run the vendor init sequence and switch the backlight on.
    ///
    /// The configured scan direction is written ahead of the vendor table,
    /// whose own MADCTL entry stays in effect. Call
    /// [`Self::set_scan_direction`] afterwards to change the orientation.
    /// An out of range configured duty is logged and the backlight keeps its
    /// current duty.
    pub fn init(&mut self) -> Result<(), DisplayError> {
        self.reset()?;
        self.set_scan_direction(self.config.scan_direction)?;

        for cmd in GC9A01A_INIT_CMDS {
            self.di.command(cmd.addr, cmd.params)?;
            if let Some(ms) = cmd.delay_after {
                self.delay.delay_ms(ms);
            }
        }
        self.delay.delay_ms(POST_INIT_DELAY_MS);

        // a bad configured duty leaves the backlight as it was, the panel is up
        match self.backlight.set_duty(self.config.backlight_duty) {
            Ok(()) | Err(BacklightError::InvalidDuty) => {}
            Err(e) => return Err(DisplayError::Backlight(e)),
        }
        info!(
            "GC9A01A ready, {}x{}",
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    /// Hardware reset through the RST line, or a software reset when it is not wired.
    pub fn reset(&mut self) -> Result<(), DisplayError> {
        self.di.deselect()?;
        if let Some(rst) = &mut self.rst {
            rst.set_high().map_err(|_| DisplayError::Pin)?;
            self.delay.delay_ms(10);
            rst.set_low().map_err(|_| DisplayError::Pin)?;
            self.delay.delay_ms(10);
            rst.set_high().map_err(|_| DisplayError::Pin)?;
            self.delay.delay_ms(100);
        } else {
            self.di.command(SWRESET, &[])?;
            self.delay.delay_ms(SWRESET_DELAY_MS);
        }
        debug!("GC9A01A reset");
        Ok(())
    }

    pub fn set_scan_direction(&mut self, direction: ScanDirection) -> Result<(), DisplayError> {
        self.di.command(MADCTL, &[direction as u8])?;
        self.config.scan_direction = direction;
        Ok(())
    }

    /// Send a raw command with optional parameters
    pub fn command(&mut self, cmd: u8, params: &[u8]) -> Result<(), DisplayError> {
        self.di.command(cmd, params)
    }

    /// Out of range values are rejected and the current duty is kept.
    pub fn set_backlight_duty(&mut self, duty: f32) -> Result<(), DisplayError> {
        self.backlight
            .set_duty(duty)
            .map_err(DisplayError::Backlight)
    }

    pub fn backlight_duty(&self) -> f32 {
        self.backlight.duty()
    }

    /// Full-panel context. The first call fixes the rendering mode; later
    /// calls return the same kind of context (and frame buffer) whatever
    /// `mode` says.
    pub fn context(&mut self, mode: RenderMode) -> Result<Context<'_, SPI, DC, CS>, DisplayError> {
        let area = Window::new(0, 0, self.config.width, self.config.height)
            .ok_or(DisplayError::OutOfBounds)?;

        let primary = self.primary.get_or_insert_with(|| match mode {
            RenderMode::Direct => Primary::Direct,
            RenderMode::Buffered => Primary::Buffered(vec![0; area.pixel_count() * 2]),
        });

        Ok(match primary {
            Primary::Direct => Context::Direct(DirectContext::new(&mut self.di, area)),
            Primary::Buffered(buffer) => Context::Buffered(BufferedContext::new(
                &mut self.di,
                area,
                FrameBuffer::Borrowed(buffer),
            )),
        })
    }

    /// Rendering mode of the full-panel context, once it exists
    pub fn context_mode(&self) -> Option<RenderMode> {
        self.primary.as_ref().map(|primary| match primary {
            Primary::Direct => RenderMode::Direct,
            Primary::Buffered(_) => RenderMode::Buffered,
        })
    }

    /// A fresh context over part of the panel. Buffered contexts allocate
    /// their own frame buffer, which is dropped with the context.
    pub fn temporary_context(
        &mut self,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        mode: RenderMode,
    ) -> Result<Context<'_, SPI, DC, CS>, DisplayError> {
        let area = Window::new(x, y, width, height)
            .filter(|w| w.fits(self.config.width, self.config.height))
            .ok_or(DisplayError::OutOfBounds)?;

        Ok(match mode {
            RenderMode::Direct => Context::Direct(DirectContext::new(&mut self.di, area)),
            RenderMode::Buffered => Context::Buffered(BufferedContext::new(
                &mut self.di,
                area,
                FrameBuffer::Owned(vec![0; area.pixel_count() * 2]),
            )),
        })
    }

    pub fn width(&self) -> u16 {
        self.config.width
    }

    pub fn height(&self) -> u16 {
        self.config.height
    }

    pub fn release(self) -> (SPI, DisplayPins<DC, CS, RST, BL>, DELAY) {
        let (spi, dc, cs) = self.di.release();
        let pins = DisplayPins {
            dc,
            cs,
            rst: self.rst,
            backlight: self.backlight.release(),
        };
        (spi, pins, self.delay)
    }
}
