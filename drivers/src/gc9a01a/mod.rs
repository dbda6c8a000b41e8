use core::fmt::{self, Display, Formatter};

use embedded_hal::spi::{Error, ErrorKind};

use crate::backlight::BacklightError;

pub mod blocking;
pub mod graphics;
pub mod interface;

#[cfg(test)]
mod recorder;

pub const GC9A01A_WIDTH: u16 = 240;
pub const GC9A01A_HEIGHT: u16 = 240;

// Standard MIPI DCS commands used outside the vendor table
pub const SWRESET: u8 = 0x01;
pub const SLPOUT: u8 = 0x11;
pub const INVON: u8 = 0x21;
pub const DISPON: u8 = 0x29;
pub const CASET: u8 = 0x2A;
pub const RASET: u8 = 0x2B;
pub const RAMWR: u8 = 0x2C;
pub const TEON: u8 = 0x35;
pub const MADCTL: u8 = 0x36;
pub const COLMOD: u8 = 0x3A;

/// Settle time after a software reset
pub(crate) const SWRESET_DELAY_MS: u32 = 150;
/// Settle time after the whole init sequence
pub(crate) const POST_INIT_DELAY_MS: u32 = 50;

/// One command of the panel init sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LcdCommand<'a> {
    pub addr: u8,
    pub params: &'a [u8],
    /// Delay in milliseconds after sending the command
    pub delay_after: Option<u32>,
}

impl<'a> LcdCommand<'a> {
    pub const fn new(addr: u8, params: &'a [u8]) -> Self {
        Self {
            addr,
            params,
            delay_after: None,
        }
    }

    pub const fn with_delay(mut self, ms: u32) -> Self {
        self.delay_after = Some(ms);
        self
    }
}

/// Vendor init sequence for the 1.28" round IPS module
pub const GC9A01A_INIT_CMDS: &[LcdCommand] = &[
    LcdCommand::new(0xEF, &[]), // inter register enable 2
    LcdCommand::new(0xEB, &[0x14]),
    LcdCommand::new(0xFE, &[]), // inter register enable 1
    LcdCommand::new(0xEF, &[]),
    LcdCommand::new(0xEB, &[0x14]),
    LcdCommand::new(0x84, &[0x40]),
    LcdCommand::new(0x85, &[0xFF]),
    LcdCommand::new(0x86, &[0xFF]),
    LcdCommand::new(0x87, &[0xFF]),
    LcdCommand::new(0x88, &[0x0A]),
    LcdCommand::new(0x89, &[0x21]),
    LcdCommand::new(0x8A, &[0x00]),
    LcdCommand::new(0x8B, &[0x80]),
    LcdCommand::new(0x8C, &[0x01]),
    LcdCommand::new(0x8D, &[0x01]),
    LcdCommand::new(0x8E, &[0xFF]),
    LcdCommand::new(0x8F, &[0xFF]),
    LcdCommand::new(0xB6, &[0x00, 0x20]), // display function control
    LcdCommand::new(MADCTL, &[0x08]),
    LcdCommand::new(COLMOD, &[0x05]), // 16 bpp
    LcdCommand::new(0x90, &[0x08, 0x08, 0x08, 0x08]),
    LcdCommand::new(0xBD, &[0x06]),
    LcdCommand::new(0xBC, &[0x00]),
    LcdCommand::new(0xFF, &[0x60, 0x01, 0x04]),
    LcdCommand::new(0xC3, &[0x13]), // vreg1a
    LcdCommand::new(0xC4, &[0x13]), // vreg1b
    LcdCommand::new(0xC9, &[0x22]), // vreg2a
    LcdCommand::new(0xBE, &[0x11]),
    LcdCommand::new(0xE1, &[0x10, 0x0E]),
    LcdCommand::new(0xDF, &[0x21, 0x0C, 0x02]),
    // gamma
    LcdCommand::new(0xF0, &[0x45, 0x09, 0x08, 0x08, 0x26, 0x2A]),
    LcdCommand::new(0xF1, &[0x43, 0x70, 0x72, 0x36, 0x37, 0x6F]),
    LcdCommand::new(0xF2, &[0x45, 0x09, 0x08, 0x08, 0x26, 0x2A]),
    LcdCommand::new(0xF3, &[0x43, 0x70, 0x72, 0x36, 0x37, 0x6F]),
    LcdCommand::new(0xED, &[0x1B, 0x0B]),
    LcdCommand::new(0xAE, &[0x77]),
    LcdCommand::new(0xCD, &[0x63]),
    LcdCommand::new(
        0x70,
        &[0x07, 0x07, 0x04, 0x0E, 0x0F, 0x09, 0x07, 0x08, 0x03],
    ),
    LcdCommand::new(0xE8, &[0x34]), // frame rate
    LcdCommand::new(
        0x62,
        &[
            0x18, 0x0D, 0x71, 0xED, 0x70, 0x70, 0x18, 0x0F, 0x71, 0xEF, 0x70, 0x70,
        ],
    ),
    LcdCommand::new(
        0x63,
        &[
            0x18, 0x11, 0x71, 0xF1, 0x70, 0x70, 0x18, 0x13, 0x71, 0xF3, 0x70, 0x70,
        ],
    ),
    LcdCommand::new(0x64, &[0x28, 0x29, 0xF1, 0x01, 0xF1, 0x00, 0x07]),
    LcdCommand::new(
        0x66,
        &[0x3C, 0x00, 0xCD, 0x67, 0x45, 0x45, 0x10, 0x00, 0x00, 0x00],
    ),
    LcdCommand::new(
        0x67,
        &[0x00, 0x3C, 0x00, 0x00, 0x00, 0x01, 0x54, 0x10, 0x32, 0x98],
    ),
    LcdCommand::new(0x74, &[0x10, 0x85, 0x80, 0x00, 0x00, 0x4E, 0x00]),
    LcdCommand::new(0x98, &[0x3E, 0x07]),
    LcdCommand::new(TEON, &[]),
    LcdCommand::new(INVON, &[]),
    LcdCommand::new(SLPOUT, &[]).with_delay(120),
    LcdCommand::new(DISPON, &[]).with_delay(20),
];

/// Inclusive pixel rectangle in panel coordinates. A window always covers at
/// least one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Window {
    x: u16,
    y: u16,
    width: u16,
    height: u16,
}

impl Window {
    /// `None` for an empty extent or when the far edge does not fit in `u16`.
    pub fn new(x: u16, y: u16, width: u16, height: u16) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        x.checked_add(width - 1)?;
        y.checked_add(height - 1)?;
        Some(Self {
            x,
            y,
            width,
            height,
        })
    }

    pub fn x(&self) -> u16 {
        self.x
    }

    pub fn y(&self) -> u16 {
        self.y
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Last column, inclusive
    pub fn x_end(&self) -> u16 {
        self.x + self.width - 1
    }

    /// Last row, inclusive
    pub fn y_end(&self) -> u16 {
        self.y + self.height - 1
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether the window lies entirely inside a `width` x `height` panel
    pub fn fits(&self, width: u16, height: u16) -> bool {
        self.x_end() < width && self.y_end() < height
    }

    /// CASET / RASET parameters: start and end as big endian pairs
    pub(crate) fn column_params(&self) -> [u8; 4] {
        range_params(self.x, self.x_end())
    }

    pub(crate) fn row_params(&self) -> [u8; 4] {
        range_params(self.y, self.y_end())
    }
}

fn range_params(start: u16, end: u16) -> [u8; 4] {
    let [s_hi, s_lo] = start.to_be_bytes();
    let [e_hi, e_lo] = end.to_be_bytes();
    [s_hi, s_lo, e_hi, e_lo]
}

/// How a graphics context gets pixels onto the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RenderMode {
    /// Every draw call is written to the panel immediately
    #[default]
    Direct,
    /// Draw calls update a frame buffer, `display()` sends it in one transfer
    Buffered,
}

/// Memory access control (MADCTL) value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanDirection {
    #[default]
    Horizontal = 0xC8,
    Vertical = 0x68,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisplayConfig {
    pub width: u16,
    pub height: u16,
    /// Backlight duty applied at the end of `init`
    pub backlight_duty: f32,
    pub scan_direction: ScanDirection,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: GC9A01A_WIDTH,
            height: GC9A01A_HEIGHT,
            backlight_duty: 1.0,
            scan_direction: ScanDirection::default(),
        }
    }
}

/// Control lines of the panel. A `None` role is not wired and its protocol
/// step is skipped.
#[derive(Debug)]
pub struct DisplayPins<DC, CS, RST, BL> {
    pub dc: Option<DC>,
    pub cs: Option<CS>,
    pub rst: Option<RST>,
    pub backlight: Option<BL>,
}

impl<DC, CS, RST, BL> Default for DisplayPins<DC, CS, RST, BL> {
    fn default() -> Self {
        Self {
            dc: None,
            cs: None,
            rst: None,
            backlight: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayError {
    Spi(ErrorKind),
    /// A control line could not be driven
    Pin,
    Backlight(BacklightError),
    /// Requested area is empty or extends past the panel
    OutOfBounds,
}

impl Display for DisplayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DisplayError::Spi(kind) => write!(f, "SPI error: {kind:?}"),
            DisplayError::Pin => write!(f, "Pin error"),
            DisplayError::Backlight(e) => write!(f, "Backlight error: {e}"),
            DisplayError::OutOfBounds => write!(f, "Area outside the panel"),
        }
    }
}

impl<E> From<E> for DisplayError
where
    E: Error,
{
    fn from(e: E) -> Self {
        DisplayError::Spi(e.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_end_is_inclusive() {
        let window = Window::new(60, 60, 120, 120).unwrap();
        assert_eq!((window.x(), window.x_end()), (60, 179));
        assert_eq!((window.y(), window.y_end()), (60, 179));
        assert_eq!(window.column_params(), [0x00, 60, 0x00, 179]);
        assert_eq!(window.row_params(), [0x00, 60, 0x00, 179]);
        assert_eq!(window.pixel_count(), 120 * 120);
    }

    #[test]
    fn test_window_params_are_big_endian() {
        let window = Window::new(0x0100, 0, 0x0100, 1).unwrap();
        assert_eq!(window.column_params(), [0x01, 0x00, 0x01, 0xFF]);
        assert_eq!(window.row_params(), [0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_empty_window_is_unrepresentable() {
        assert_eq!(Window::new(10, 10, 0, 5), None);
        assert_eq!(Window::new(10, 10, 5, 0), None);
        assert_eq!(Window::new(u16::MAX, 0, 2, 1), None);
        assert!(Window::new(u16::MAX, 0, 1, 1).is_some());
    }

    #[test]
    fn test_window_fits_panel() {
        assert!(Window::new(0, 0, 240, 240).unwrap().fits(240, 240));
        assert!(!Window::new(1, 0, 240, 240).unwrap().fits(240, 240));
        assert!(!Window::new(0, 200, 10, 41).unwrap().fits(240, 240));
    }

    #[test]
    fn test_init_table_matches_vendor_sequence() {
        let golden: &[(u8, &[u8])] = &[
            (0xEF, &[]),
            (0xEB, &[0x14]),
            (0xFE, &[]),
            (0xEF, &[]),
            (0xEB, &[0x14]),
            (0x84, &[0x40]),
            (0x85, &[0xFF]),
            (0x86, &[0xFF]),
            (0x87, &[0xFF]),
            (0x88, &[0x0A]),
            (0x89, &[0x21]),
            (0x8A, &[0x00]),
            (0x8B, &[0x80]),
            (0x8C, &[0x01]),
            (0x8D, &[0x01]),
            (0x8E, &[0xFF]),
            (0x8F, &[0xFF]),
            (0xB6, &[0x00, 0x20]),
            (0x36, &[0x08]),
            (0x3A, &[0x05]),
            (0x90, &[0x08, 0x08, 0x08, 0x08]),
            (0xBD, &[0x06]),
            (0xBC, &[0x00]),
            (0xFF, &[0x60, 0x01, 0x04]),
            (0xC3, &[0x13]),
            (0xC4, &[0x13]),
            (0xC9, &[0x22]),
            (0xBE, &[0x11]),
            (0xE1, &[0x10, 0x0E]),
            (0xDF, &[0x21, 0x0C, 0x02]),
            (0xF0, &[0x45, 0x09, 0x08, 0x08, 0x26, 0x2A]),
            (0xF1, &[0x43, 0x70, 0x72, 0x36, 0x37, 0x6F]),
            (0xF2, &[0x45, 0x09, 0x08, 0x08, 0x26, 0x2A]),
            (0xF3, &[0x43, 0x70, 0x72, 0x36, 0x37, 0x6F]),
            (0xED, &[0x1B, 0x0B]),
            (0xAE, &[0x77]),
            (0xCD, &[0x63]),
            (0x70, &[0x07, 0x07, 0x04, 0x0E, 0x0F, 0x09, 0x07, 0x08, 0x03]),
            (0xE8, &[0x34]),
            (
                0x62,
                &[
                    0x18, 0x0D, 0x71, 0xED, 0x70, 0x70, 0x18, 0x0F, 0x71, 0xEF, 0x70, 0x70,
                ],
            ),
            (
                0x63,
                &[
                    0x18, 0x11, 0x71, 0xF1, 0x70, 0x70, 0x18, 0x13, 0x71, 0xF3, 0x70, 0x70,
                ],
            ),
            (0x64, &[0x28, 0x29, 0xF1, 0x01, 0xF1, 0x00, 0x07]),
            (
                0x66,
                &[0x3C, 0x00, 0xCD, 0x67, 0x45, 0x45, 0x10, 0x00, 0x00, 0x00],
            ),
            (
                0x67,
                &[0x00, 0x3C, 0x00, 0x00, 0x00, 0x01, 0x54, 0x10, 0x32, 0x98],
            ),
            (0x74, &[0x10, 0x85, 0x80, 0x00, 0x00, 0x4E, 0x00]),
            (0x98, &[0x3E, 0x07]),
            (0x35, &[]),
            (0x21, &[]),
            (0x11, &[]),
            (0x29, &[]),
        ];

        assert_eq!(GC9A01A_INIT_CMDS.len(), golden.len());
        for (cmd, (addr, params)) in GC9A01A_INIT_CMDS.iter().zip(golden) {
            assert_eq!(cmd.addr, *addr);
            assert_eq!(cmd.params, *params, "params of {addr:#04x}");
        }

        let delays: Vec<_> = GC9A01A_INIT_CMDS
            .iter()
            .filter_map(|c| c.delay_after.map(|ms| (c.addr, ms)))
            .collect();
        assert_eq!(delays, vec![(SLPOUT, 120), (DISPON, 20)]);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(format!("{}", DisplayError::Pin), "Pin error");
        assert_eq!(
            format!("{}", DisplayError::Backlight(BacklightError::InvalidDuty)),
            "Backlight error: Backlight duty must be within 0.0..=1.0"
        );
    }
}
