//! Display driver contract, frame buffer and the SSD1306 panel wrapper.

use core::convert::Infallible;

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;

use crate::config::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
use crate::error::DisplayError;

/// Bytes in one packed 1-bit frame.
pub const FRAME_BYTES: usize = (DISPLAY_WIDTH * DISPLAY_HEIGHT / 8) as usize;

/// Operations the engine needs from the physical panel.
pub trait DisplayDriver {
    /// Run the panel init sequence.
    fn init(&mut self) -> Result<(), DisplayError>;

    /// Panel on, normal (non-inverted) mode. Used to wake from sleep.
    fn set_normal_display(&mut self) -> Result<(), DisplayError>;

    /// Blank the panel.
    fn clear_display(&mut self) -> Result<(), DisplayError>;

    /// Push a complete frame.
    fn draw_image(&mut self, frame: &Frame) -> Result<(), DisplayError>;
}

/// 128×64 monochrome pixel buffer, row-major, MSB = leftmost pixel.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    bits: [u8; FRAME_BYTES],
}

impl Frame {
    pub const fn blank() -> Self {
        Self {
            bits: [0; FRAME_BYTES],
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> bool {
        match Self::index(x, y) {
            Some((byte, mask)) => self.bits[byte] & mask != 0,
            None => false,
        }
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, on: bool) {
        if let Some((byte, mask)) = Self::index(x, y) {
            if on {
                self.bits[byte] |= mask;
            } else {
                self.bits[byte] &= !mask;
            }
        }
    }

    /// Number of lit pixels.
    pub fn lit_pixels(&self) -> u32 {
        self.bits.iter().map(|b| b.count_ones()).sum()
    }

    /// Lit pixels inside the given row band (`y0..y1`).
    pub fn lit_pixels_in_rows(&self, y0: u32, y1: u32) -> u32 {
        (y0..y1.min(DISPLAY_HEIGHT))
            .flat_map(|y| (0..DISPLAY_WIDTH).map(move |x| (x, y)))
            .filter(|&(x, y)| self.pixel(x, y))
            .count() as u32
    }

    /// Coordinates of every lit pixel.
    pub fn lit(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (0..DISPLAY_HEIGHT)
            .flat_map(|y| (0..DISPLAY_WIDTH).map(move |x| (x, y)))
            .filter(|&(x, y)| self.pixel(x, y))
    }

    fn index(x: u32, y: u32) -> Option<(usize, u8)> {
        if x >= DISPLAY_WIDTH || y >= DISPLAY_HEIGHT {
            return None;
        }
        let bit = (y * DISPLAY_WIDTH + x) as usize;
        Some((bit / 8, 0x80 >> (bit % 8)))
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::blank()
    }
}

impl core::fmt::Debug for Frame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Frame")
            .field("lit_pixels", &self.lit_pixels())
            .finish()
    }
}

impl OriginDimensions for Frame {
    fn size(&self) -> Size {
        Size::new(DISPLAY_WIDTH, DISPLAY_HEIGHT)
    }
}

impl DrawTarget for Frame {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0 && point.y >= 0 {
                self.set_pixel(point.x as u32, point.y as u32, color.is_on());
            }
        }
        Ok(())
    }
}

#[cfg(feature = "hardware")]
pub use panel::Ssd1306Panel;

#[cfg(feature = "hardware")]
mod panel {
    use ssd1306::mode::BufferedGraphicsMode;
    use ssd1306::prelude::*;
    use ssd1306::I2CDisplayInterface;
    use ssd1306::Ssd1306;

    use super::{DisplayDriver, Frame};
    use crate::error::DisplayError;

    type Driver<I2C> =
        Ssd1306<I2CInterface<I2C>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

    /// SSD1306 128×64 OLED on a Linux I²C bus.
    ///
    /// Generic over the I²C implementation so callers pass in their HAL's
    /// I²C device.
    pub struct Ssd1306Panel<I2C> {
        display: Driver<I2C>,
    }

    impl<I2C> Ssd1306Panel<I2C>
    where
        I2C: embedded_hal::i2c::I2c,
    {
        pub fn new(i2c: I2C, address: u8) -> Self {
            let interface = I2CDisplayInterface::new_custom_address(i2c, address);
            let display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
                .into_buffered_graphics_mode();
            Self { display }
        }
    }

    impl<I2C> DisplayDriver for Ssd1306Panel<I2C>
    where
        I2C: embedded_hal::i2c::I2c,
    {
        fn init(&mut self) -> Result<(), DisplayError> {
            self.display.init().map_err(|_| DisplayError::Init)?;
            self.display.clear_buffer();
            self.display.flush().map_err(|_| DisplayError::Flush)
        }

        fn set_normal_display(&mut self) -> Result<(), DisplayError> {
            self.display
                .set_display_on(true)
                .map_err(|_| DisplayError::Command)
        }

        fn clear_display(&mut self) -> Result<(), DisplayError> {
            self.display.clear_buffer();
            self.display.flush().map_err(|_| DisplayError::Flush)
        }

        fn draw_image(&mut self, frame: &Frame) -> Result<(), DisplayError> {
            self.display.clear_buffer();
            for (x, y) in frame.lit() {
                self.display.set_pixel(x, y, true);
            }
            self.display.flush().map_err(|_| DisplayError::Flush)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};

    #[test]
    fn frame_starts_blank() {
        let frame = Frame::blank();
        assert_eq!(frame.lit_pixels(), 0);
        assert_eq!(frame.bits.len(), 1024);
    }

    #[test]
    fn set_and_read_pixels() {
        let mut frame = Frame::blank();
        frame.set_pixel(0, 0, true);
        frame.set_pixel(127, 63, true);
        assert!(frame.pixel(0, 0));
        assert!(frame.pixel(127, 63));
        assert_eq!(frame.bits[0], 0x80);
        assert_eq!(frame.bits[FRAME_BYTES - 1], 0x01);
        frame.set_pixel(0, 0, false);
        assert!(!frame.pixel(0, 0));
        assert_eq!(frame.lit_pixels(), 1);
    }

    #[test]
    fn out_of_bounds_pixels_are_ignored() {
        let mut frame = Frame::blank();
        frame.set_pixel(128, 0, true);
        frame.set_pixel(0, 64, true);
        assert_eq!(frame.lit_pixels(), 0);
        assert!(!frame.pixel(500, 500));
    }

    #[test]
    fn draws_embedded_graphics_primitives() {
        let mut frame = Frame::blank();
        let _ = Rectangle::new(Point::new(-4, 10), Size::new(8, 2))
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
            .draw(&mut frame);
        // Only the on-screen half survives clipping.
        assert_eq!(frame.lit_pixels(), 8);
        assert_eq!(frame.lit_pixels_in_rows(10, 12), 8);
        assert_eq!(frame.lit().next(), Some((0, 10)));
    }
}
