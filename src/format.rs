use std::fmt;

use crate::FourCC;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// Frame geometry negotiated with the capture peripheral
pub struct Format {
    /// width in pixels
    pub width: u32,
    /// height in pixels
    pub height: u32,
    /// pixelformat code
    pub fourcc: FourCC,
    /// bytes per line
    pub stride: u32,
}

impl Format {
    /// Returns a capture format
    ///
    /// The stride is left at zero, the peripheral reports the actual value once the format has
    /// been applied.
    ///
    /// # Arguments
    ///
    /// * `width` - Width in pixels
    /// * `height` - Height in pixels
    /// * `fourcc` - Four character code (pixelformat)
    ///
    /// # Example
    ///
    /// ```
    /// use camrelay::{Format, FourCC};
    /// let fmt = Format::new(320, 240, FourCC::RGB565);
    /// assert_eq!(fmt.stride, 0);
    /// ```
    pub const fn new(width: u32, height: u32, fourcc: FourCC) -> Self {
        Format {
            width,
            height,
            fourcc,
            stride: 0,
        }
    }

    /// Returns a copy of this format with another resolution
    pub const fn with_size(self, width: u32, height: u32) -> Self {
        Format {
            width,
            height,
            ..self
        }
    }

    /// Maximum number of bytes required to store one frame (`stride * height`)
    pub fn frame_size(&self) -> usize {
        self.stride as usize * self.height as usize
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}x{} (stride {})",
            self.fourcc, self.width, self.height, self.stride
        )
    }
}
