use std::{fmt, str};

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
/// Four character code representing a pixelformat
pub struct FourCC {
    pub repr: [u8; 4],
}

impl FourCC {
    /// 16 bit RGB, 5-6-5
    pub const RGB565: FourCC = FourCC { repr: *b"RGBP" };
    /// Packed YUV 4:2:2
    pub const YUYV: FourCC = FourCC { repr: *b"YUYV" };
    /// Compressed JPEG stream, frame size varies per capture
    pub const JPEG: FourCC = FourCC { repr: *b"JPEG" };

    #[allow(clippy::trivially_copy_pass_by_ref)]
    /// Returns a pixelformat as four character code
    ///
    /// # Arguments
    ///
    /// * `repr` - Four characters as raw bytes
    ///
    /// # Example
    ///
    /// ```
    /// use camrelay::FourCC;
    /// let fourcc = FourCC::new(b"YUYV");
    /// assert_eq!(fourcc, FourCC::YUYV);
    /// ```
    pub const fn new(repr: &[u8; 4]) -> FourCC {
        FourCC { repr: *repr }
    }

    /// Returns the string representation of a four character code
    ///
    /// # Example
    ///
    /// ```
    /// use camrelay::FourCC;
    /// let fourcc = FourCC::new(b"YUYV");
    /// assert_eq!(fourcc.str().unwrap(), "YUYV");
    /// ```
    pub fn str(&self) -> Result<&str, str::Utf8Error> {
        str::from_utf8(&self.repr)
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.str() {
            Ok(string) if string.chars().all(|c| c.is_ascii_graphic()) => write!(f, "{}", string),
            _ => write!(f, "0x{:08x}", u32::from(*self)),
        }
    }
}

impl From<u32> for FourCC {
    fn from(code: u32) -> Self {
        FourCC::new(&code.to_le_bytes())
    }
}

impl From<FourCC> for u32 {
    fn from(fourcc: FourCC) -> Self {
        Self::from_le_bytes(fourcc.repr)
    }
}
