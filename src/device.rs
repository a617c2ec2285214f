use std::convert::TryFrom;
use std::{fmt, io, time::Duration};

use crate::buffer::FrameBuffer;
use crate::format::Format;

/// Format negotiation protocol
pub trait Negotiate {
    /// Checks that the peripheral can capture at all
    ///
    /// The default implementation assumes a peripheral that is always ready.
    fn ready(&self) -> io::Result<()> {
        Ok(())
    }

    /// Returns the format currently in use
    fn format(&self) -> io::Result<Format>;

    /// Modifies the capture format and returns the actual format
    ///
    /// The peripheral tries to match the format parameters on a best effort basis.
    /// Thus, if the combination of format properties cannot be achieved, the closest possible
    /// settings are used and reported back.
    ///
    /// # Arguments
    ///
    /// * `fmt` - Desired format
    fn set_format(&mut self, fmt: &Format) -> io::Result<Format>;
}

/// Outcome of a successful stream start
///
/// Drivers overload their return code: `0` is a fresh start, `1` means the stream was already
/// running. Both are success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStart {
    Started,
    AlreadyStarted,
}

impl StreamStart {
    /// Maps a raw driver return code, anything but `0` and `1` is an error
    pub fn from_code(code: i32) -> io::Result<Self> {
        StreamStart::try_from(code).map_err(|code| {
            io::Error::new(
                io::ErrorKind::Other,
                format!("stream start failed with code {}", code),
            )
        })
    }
}

impl TryFrom<i32> for StreamStart {
    type Error = i32;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(StreamStart::Started),
            1 => Ok(StreamStart::AlreadyStarted),
            _ => Err(code),
        }
    }
}

impl fmt::Display for StreamStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            StreamStart::Started => write!(f, "started"),
            StreamStart::AlreadyStarted => write!(f, "already started"),
        }
    }
}

/// Streaming I/O
///
/// Buffers are moved into the peripheral when queued and moved back out when dequeued, so a
/// buffer is never reachable from two places at once.
pub trait Streaming {
    /// Insert a buffer into the driver's incoming queue
    ///
    /// On error the buffer is lost to the caller.
    fn enqueue(&mut self, buf: FrameBuffer) -> io::Result<()>;

    /// Remove a filled buffer from the driver's outgoing queue
    ///
    /// Waits at most `timeout`. Expiry is reported as [`io::ErrorKind::TimedOut`].
    fn dequeue(&mut self, timeout: Duration) -> io::Result<FrameBuffer>;

    /// Start streaming
    fn start(&mut self) -> io::Result<StreamStart>;

    /// Stop streaming
    fn stop(&mut self) -> io::Result<()>;
}

/// Capture-then-poll I/O
///
/// The peripheral captures a whole frame into its internal FIFO, the application drains the FIFO
/// in chunks no larger than its buffer.
pub trait Snapshot {
    /// Take a picture, returns the number of bytes waiting in the FIFO
    fn trigger_capture(&mut self) -> io::Result<usize>;

    /// Read the next FIFO chunk into `buf`, setting its used length
    fn read_chunk(&mut self, buf: &mut FrameBuffer) -> io::Result<()>;
}
