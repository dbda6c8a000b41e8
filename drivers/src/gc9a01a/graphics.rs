use alloc::vec::Vec;

use embedded_graphics_core::draw_target::DrawTarget;
use embedded_graphics_core::geometry::{OriginDimensions, Size};
use embedded_graphics_core::pixelcolor::{IntoStorage, Rgb565, RgbColor};
use embedded_graphics_core::primitives::Rectangle;
use embedded_graphics_core::Pixel;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use super::interface::{Pixels, SpiInterface};
use super::{DisplayError, RenderMode, Window};

/// Pack 8-bit channels into RGB565, dropping the low bits.
pub fn color16(r: u8, g: u8, b: u8) -> Rgb565 {
    Rgb565::new(r >> 3, g >> 2, b >> 3)
}

fn color_bytes(color: Rgb565) -> [u8; 2] {
    color.into_storage().to_be_bytes()
}

/// Drawing surface over a rectangle of the panel. Coordinates are relative to
/// the rectangle origin; anything outside the rectangle is clipped.
pub trait GraphicsContext {
    type Error;

    /// Width of the context in pixels; valid `x` is `0..width`
    fn width(&self) -> u16;

    /// Height of the context in pixels; valid `y` is `0..height`
    fn height(&self) -> u16;

    /// Fill the whole context with black
    fn clear_screen(&mut self) -> Result<(), Self::Error>;

    /// Set one pixel. A pixel outside the context is ignored.
    fn set_pixel(&mut self, x: u16, y: u16, color: Rgb565) -> Result<(), Self::Error>;

    /// Fill a rectangle, clipped to the context. Empty or fully outside
    /// rectangles draw nothing.
    fn fill_rect(
        &mut self,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        color: Rgb565,
    ) -> Result<(), Self::Error>;

    /// Push pending drawing to the panel
    fn display(&mut self) -> Result<(), Self::Error>;
}

/// Clip a rectangle to a `width` x `height` surface.
fn clip(x: u16, y: u16, w: u16, h: u16, width: u16, height: u16) -> Option<(u16, u16, u16, u16)> {
    if x >= width || y >= height || w == 0 || h == 0 {
        return None;
    }
    Some((x, y, w.min(width - x), h.min(height - y)))
}

fn clip_rectangle(area: &Rectangle, width: u16, height: u16) -> Option<(u16, u16, u16, u16)> {
    let x0 = area.top_left.x.max(0);
    let y0 = area.top_left.y.max(0);
    let x1 = area
        .top_left
        .x
        .saturating_add(area.size.width.min(i32::MAX as u32) as i32)
        .min(width as i32);
    let y1 = area
        .top_left
        .y
        .saturating_add(area.size.height.min(i32::MAX as u32) as i32)
        .min(height as i32);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some((x0 as u16, y0 as u16, (x1 - x0) as u16, (y1 - y0) as u16))
}

/// Writes every draw call straight to panel memory.
#[derive(Debug)]
pub struct DirectContext<'a, SPI, DC, CS> {
    di: &'a mut SpiInterface<SPI, DC, CS>,
    area: Window,
}

impl<'a, SPI, DC, CS> DirectContext<'a, SPI, DC, CS>
where
    SPI: SpiBus<u8>,
    DC: OutputPin,
    CS: OutputPin,
{
    pub(crate) fn new(di: &'a mut SpiInterface<SPI, DC, CS>, area: Window) -> Self {
        Self { di, area }
    }

    /// Panel area covered by this context
    pub fn area(&self) -> Window {
        self.area
    }
}

impl<SPI, DC, CS> GraphicsContext for DirectContext<'_, SPI, DC, CS>
where
    SPI: SpiBus<u8>,
    DC: OutputPin,
    CS: OutputPin,
{
    type Error = DisplayError;

    fn width(&self) -> u16 {
        self.area.width()
    }

    fn height(&self) -> u16 {
        self.area.height()
    }

    fn clear_screen(&mut self) -> Result<(), DisplayError> {
        self.fill_rect(0, 0, self.width(), self.height(), Rgb565::BLACK)
    }

    fn set_pixel(&mut self, x: u16, y: u16, color: Rgb565) -> Result<(), DisplayError> {
        self.fill_rect(x, y, 1, 1, color)
    }

    fn fill_rect(
        &mut self,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        color: Rgb565,
    ) -> Result<(), DisplayError> {
        let Some((x, y, w, h)) = clip(x, y, width, height, self.width(), self.height()) else {
            return Ok(());
        };
        let window = Window::new(self.area.x() + x, self.area.y() + y, w, h)
            .ok_or(DisplayError::OutOfBounds)?;
        self.di
            .write_memory(&window, Pixels::Repeat(color_bytes(color), window.pixel_count()))
    }

    fn display(&mut self) -> Result<(), DisplayError> {
        Ok(())
    }
}

/// Pixel storage of a buffered context, big endian RGB565
#[derive(Debug)]
pub enum FrameBuffer<'a> {
    Owned(Vec<u8>),
    Borrowed(&'a mut [u8]),
}

impl FrameBuffer<'_> {
    fn as_slice(&self) -> &[u8] {
        match self {
            FrameBuffer::Owned(buf) => buf,
            FrameBuffer::Borrowed(buf) => buf,
        }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            FrameBuffer::Owned(buf) => buf,
            FrameBuffer::Borrowed(buf) => buf,
        }
    }
}

/// Draws into a frame buffer; [`GraphicsContext::display`] sends the whole
/// buffer with a single window address and one data transfer.
#[derive(Debug)]
pub struct BufferedContext<'a, SPI, DC, CS> {
    di: &'a mut SpiInterface<SPI, DC, CS>,
    area: Window,
    buffer: FrameBuffer<'a>,
}

impl<'a, SPI, DC, CS> BufferedContext<'a, SPI, DC, CS>
where
    SPI: SpiBus<u8>,
    DC: OutputPin,
    CS: OutputPin,
{
    /// `buffer` must hold two bytes per pixel of `area`.
    pub(crate) fn new(
        di: &'a mut SpiInterface<SPI, DC, CS>,
        area: Window,
        buffer: FrameBuffer<'a>,
    ) -> Self {
        debug_assert_eq!(buffer.as_slice().len(), area.pixel_count() * 2);
        Self { di, area, buffer }
    }

    pub fn area(&self) -> Window {
        self.area
    }

    /// Frame buffer contents, row major
    pub fn buffer(&self) -> &[u8] {
        self.buffer.as_slice()
    }
}

impl<SPI, DC, CS> GraphicsContext for BufferedContext<'_, SPI, DC, CS>
where
    SPI: SpiBus<u8>,
    DC: OutputPin,
    CS: OutputPin,
{
    type Error = DisplayError;

    fn width(&self) -> u16 {
        self.area.width()
    }

    fn height(&self) -> u16 {
        self.area.height()
    }

    fn clear_screen(&mut self) -> Result<(), DisplayError> {
        self.buffer.as_mut_slice().fill(0);
        Ok(())
    }

    fn set_pixel(&mut self, x: u16, y: u16, color: Rgb565) -> Result<(), DisplayError> {
        self.fill_rect(x, y, 1, 1, color)
    }

    fn fill_rect(
        &mut self,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        color: Rgb565,
    ) -> Result<(), DisplayError> {
        let Some((x, y, w, h)) = clip(x, y, width, height, self.width(), self.height()) else {
            return Ok(());
        };
        let stride = self.width() as usize * 2;
        let bytes = color_bytes(color);
        let buffer = self.buffer.as_mut_slice();
        for row in y as usize..(y + h) as usize {
            let start = row * stride + x as usize * 2;
            let end = start + w as usize * 2;
            for px in buffer[start..end].chunks_exact_mut(2) {
                px.copy_from_slice(&bytes);
            }
        }
        Ok(())
    }

    fn display(&mut self) -> Result<(), DisplayError> {
        self.di
            .write_memory(&self.area, Pixels::Bytes(self.buffer.as_slice()))
    }
}

/// Either rendering strategy behind one type
#[derive(Debug)]
pub enum Context<'a, SPI, DC, CS> {
    Direct(DirectContext<'a, SPI, DC, CS>),
    Buffered(BufferedContext<'a, SPI, DC, CS>),
}

impl<SPI, DC, CS> Context<'_, SPI, DC, CS> {
    pub fn mode(&self) -> RenderMode {
        match self {
            Context::Direct(_) => RenderMode::Direct,
            Context::Buffered(_) => RenderMode::Buffered,
        }
    }
}

impl<SPI, DC, CS> GraphicsContext for Context<'_, SPI, DC, CS>
where
    SPI: SpiBus<u8>,
    DC: OutputPin,
    CS: OutputPin,
{
    type Error = DisplayError;

    fn width(&self) -> u16 {
        match self {
            Context::Direct(ctx) => ctx.width(),
            Context::Buffered(ctx) => ctx.width(),
        }
    }

    fn height(&self) -> u16 {
        match self {
            Context::Direct(ctx) => ctx.height(),
            Context::Buffered(ctx) => ctx.height(),
        }
    }

    fn clear_screen(&mut self) -> Result<(), DisplayError> {
        match self {
            Context::Direct(ctx) => ctx.clear_screen(),
            Context::Buffered(ctx) => ctx.clear_screen(),
        }
    }

    fn set_pixel(&mut self, x: u16, y: u16, color: Rgb565) -> Result<(), DisplayError> {
        match self {
            Context::Direct(ctx) => ctx.set_pixel(x, y, color),
            Context::Buffered(ctx) => ctx.set_pixel(x, y, color),
        }
    }

    fn fill_rect(
        &mut self,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        color: Rgb565,
    ) -> Result<(), DisplayError> {
        match self {
            Context::Direct(ctx) => ctx.fill_rect(x, y, width, height, color),
            Context::Buffered(ctx) => ctx.fill_rect(x, y, width, height, color),
        }
    }

    fn display(&mut self) -> Result<(), DisplayError> {
        match self {
            Context::Direct(ctx) => ctx.display(),
            Context::Buffered(ctx) => ctx.display(),
        }
    }
}

// embedded-graphics glue, shared by every context type
macro_rules! impl_draw_target {
    ($ty:ident) => {
        impl<SPI, DC, CS> OriginDimensions for $ty<'_, SPI, DC, CS>
        where
            SPI: SpiBus<u8>,
            DC: OutputPin,
            CS: OutputPin,
        {
            fn size(&self) -> Size {
                Size::new(self.width() as u32, self.height() as u32)
            }
        }

        impl<SPI, DC, CS> DrawTarget for $ty<'_, SPI, DC, CS>
        where
            SPI: SpiBus<u8>,
            DC: OutputPin,
            CS: OutputPin,
        {
            type Color = Rgb565;
            type Error = DisplayError;

            fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
            where
                I: IntoIterator<Item = Pixel<Self::Color>>,
            {
                for Pixel(point, color) in pixels {
                    if let (Ok(x), Ok(y)) = (u16::try_from(point.x), u16::try_from(point.y)) {
                        self.set_pixel(x, y, color)?;
                    }
                }
                Ok(())
            }

            fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
                match clip_rectangle(area, self.width(), self.height()) {
                    Some((x, y, w, h)) => self.fill_rect(x, y, w, h, color),
                    None => Ok(()),
                }
            }

            fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
                self.fill_rect(0, 0, self.width(), self.height(), color)
            }
        }
    };
}

impl_draw_target!(DirectContext);
impl_draw_target!(BufferedContext);
impl_draw_target!(Context);
