//! video4linux capture backend

use std::collections::VecDeque;
use std::os::unix::io::RawFd;
use std::path::Path;
use std::{io, time::Duration};

use tracing::{debug, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

use crate::buffer::{Flags, FrameBuffer, Metadata};
use crate::device::{Negotiate, Snapshot, StreamStart, Streaming};
use crate::{Format, FourCC, Timestamp};

/// Number of driver-side buffers backing the mapped stream
const DRIVER_BUFFERS: u32 = 4;

/// How long the first frame after stream start may take
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(2);

/// Capture device node driven through mapped driver buffers
///
/// The driver fills its own mapped buffers. Each dequeued driver frame is copied into the oldest
/// [`FrameBuffer`] the pipeline queued.
///
/// For snapshots, each trigger starts the stream, grabs one frame into a staging FIFO and stops
/// the stream again. `read_chunk` then drains the FIFO, the same way a camera module with an
/// internal frame FIFO is read out.
pub struct Camera {
    dev: Device,
    stream: Option<MmapStream<'static>>,
    /// Whether the mapped stream delivered its first frame
    primed: bool,
    pending: VecDeque<FrameBuffer>,
    fifo: Vec<u8>,
    fifo_pos: usize,
    /// Metadata of the frame currently staged in the FIFO
    fifo_meta: Metadata,
}

impl Camera {
    /// Opens a capture device by node path
    ///
    /// # Arguments
    ///
    /// * `path` - Node path, usually `/dev/videoN`
    pub fn with_path<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let dev = Device::with_path(path)?;
        Ok(Camera {
            dev,
            stream: None,
            primed: false,
            pending: VecDeque::new(),
            fifo: Vec::new(),
            fifo_pos: 0,
            fifo_meta: Metadata::default(),
        })
    }

    fn open_stream(&mut self) -> io::Result<()> {
        if self.stream.is_none() {
            let stream = MmapStream::with_buffers(&self.dev, Type::VideoCapture, DRIVER_BUFFERS)?;
            self.stream = Some(stream);
            self.primed = false;
        }
        Ok(())
    }

    /// Fetch one driver frame, waiting at most `timeout`
    ///
    /// The mapped stream re-queues its previous buffer on every fetch, so a timeout inside the
    /// driver call would leave it out of step. Readiness is therefore polled here first and the
    /// driver is only asked once a frame is known to be waiting.
    fn grab(&mut self, timeout: Duration) -> io::Result<(Vec<u8>, Metadata)> {
        let fd = self.dev.handle().fd();
        let primed = self.primed;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "stream not started"))?;

        if primed {
            if poll_in(fd, timeout)? == 0 {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "no frame ready"));
            }
        } else {
            stream.set_timeout(FIRST_FRAME_TIMEOUT);
        }

        let (data, meta) = match CaptureStream::next(stream) {
            Ok(frame) => frame,
            // the stream cannot recover from a timeout on its very first frame
            Err(e) if !primed && e.kind() == io::ErrorKind::TimedOut => {
                return Err(io::Error::new(io::ErrorKind::Other, e))
            }
            Err(e) => return Err(e),
        };

        let used = (meta.bytesused as usize).min(data.len());
        let mut flags = Flags::DONE;
        if meta.flags.contains(v4l::buffer::Flags::ERROR) {
            flags |= Flags::ERROR;
        }
        let meta = Metadata {
            sequence: meta.sequence,
            timestamp: Timestamp::new(meta.timestamp.sec as u64, meta.timestamp.usec as u32),
            flags,
        };
        let frame = (data[..used].to_vec(), meta);

        self.primed = true;
        Ok(frame)
    }
}

fn poll_in(fd: RawFd, timeout: Duration) -> io::Result<usize> {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
    match unsafe { libc::poll(&mut pollfd, 1, timeout_ms) } {
        -1 => Err(io::Error::last_os_error()),
        ret => Ok(ret as usize),
    }
}

impl Negotiate for Camera {
    fn ready(&self) -> io::Result<()> {
        // a node that answers the capability query is powered and bound to its driver
        let caps = self.dev.query_caps()?;
        debug!(card = %caps.card, driver = %caps.driver, "Capture device ready");
        Ok(())
    }

    fn format(&self) -> io::Result<Format> {
        let fmt = Capture::format(&self.dev)?;
        Ok(Format {
            width: fmt.width,
            height: fmt.height,
            fourcc: FourCC::new(&fmt.fourcc.repr),
            stride: fmt.stride,
        })
    }

    fn set_format(&mut self, fmt: &Format) -> io::Result<Format> {
        let mut desired = Capture::format(&self.dev)?;
        desired.width = fmt.width;
        desired.height = fmt.height;
        desired.fourcc = v4l::FourCC::new(&fmt.fourcc.repr);

        let actual = Capture::set_format(&self.dev, &desired)?;
        Ok(Format {
            width: actual.width,
            height: actual.height,
            fourcc: FourCC::new(&actual.fourcc.repr),
            stride: actual.stride,
        })
    }
}

impl Streaming for Camera {
    fn enqueue(&mut self, buf: FrameBuffer) -> io::Result<()> {
        self.pending.push_back(buf);
        Ok(())
    }

    fn dequeue(&mut self, timeout: Duration) -> io::Result<FrameBuffer> {
        if self.pending.is_empty() {
            return Err(io::Error::new(io::ErrorKind::Other, "no video buffer queued"));
        }

        let (data, mut meta) = self.grab(timeout)?;
        let mut buf = self
            .pending
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "no video buffer queued"))?;

        if buf.fill_from(&data) < data.len() {
            warn!(
                index = buf.index(),
                len = data.len(),
                capacity = buf.capacity(),
                "Frame truncated to buffer capacity"
            );
            meta.flags |= Flags::ERROR;
        }
        *buf.meta_mut() = meta;
        Ok(buf)
    }

    fn start(&mut self) -> io::Result<StreamStart> {
        if self.stream.is_some() {
            return Ok(StreamStart::AlreadyStarted);
        }
        self.open_stream()?;
        Ok(StreamStart::Started)
    }

    fn stop(&mut self) -> io::Result<()> {
        // dropping the mapped stream issues STREAMOFF and unmaps the driver buffers
        self.stream = None;
        Ok(())
    }
}

impl Snapshot for Camera {
    fn trigger_capture(&mut self) -> io::Result<usize> {
        // A mapped stream left running keeps filling its re-queued buffers and then idles on
        // them, so the next grab would return a frame from right after the previous trigger.
        // Every snapshot therefore gets a fresh stream, which is stopped again once grabbed.
        self.stream = None;
        self.open_stream()?;

        let grabbed = self.grab(FIRST_FRAME_TIMEOUT);
        self.stream = None;
        let (data, meta) = grabbed?;
        self.fifo = data;
        self.fifo_pos = 0;
        self.fifo_meta = meta;

        debug!(len = self.fifo.len(), timestamp = %meta.timestamp, "Captured frame into FIFO");
        Ok(self.fifo.len())
    }

    fn read_chunk(&mut self, buf: &mut FrameBuffer) -> io::Result<()> {
        let rest = &self.fifo[self.fifo_pos..];
        if rest.is_empty() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "FIFO is empty"));
        }
        self.fifo_pos += buf.fill_from(rest);
        Ok(())
    }
}
