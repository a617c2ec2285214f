//! Double-buffered streaming pipeline
//!
//! All pool buffers are queued on the peripheral before the stream starts. After that, every
//! trigger byte allows one bounded dequeue. A dequeued buffer is relayed in full and then
//! queued again, so while one buffer drains over the serial link the other one keeps filling.

use std::{fmt, io, thread};

use tracing::{debug, error, info, trace, warn};

use crate::buffer::{Flags, FrameBuffer};
use crate::config::StreamConfig;
use crate::console::Console;
use crate::device::{StreamStart, Streaming};
use crate::error::{Error, Result};
use crate::format::Format;
use crate::negotiate::frame_capacity;
use crate::pool::Pool;
use crate::relay::Relay;
use crate::supervisor::{Pipeline, Stats};

/// Lifecycle of a [`StreamPipeline`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Buffers are owned by the pipeline, nothing queued yet
    Idle,
    /// Every buffer is queued on the peripheral
    Armed,
    /// The peripheral is streaming into the queued buffers
    Streaming,
    /// Stopped for good, either on request or after a fatal error
    Stopped,
}

/// Result of a single [`StreamPipeline::tick`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// All buffers were handed to the peripheral
    Armed { buffers: usize },
    /// The stream was started
    Started(StreamStart),
    /// No trigger byte this tick
    Idle,
    /// Triggered, but no frame completed within the dequeue timeout
    TimedOut,
    /// A frame was relayed and its buffer queued again
    Relayed {
        index: usize,
        sequence: u32,
        bytes: usize,
    },
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Tick::Armed { buffers } => write!(f, "armed {} buffers", buffers),
            Tick::Started(start) => write!(f, "stream {}", start),
            Tick::Idle => write!(f, "idle"),
            Tick::TimedOut => write!(f, "dequeue timed out"),
            Tick::Relayed {
                index,
                sequence,
                bytes,
            } => write!(f, "relayed frame {} ({} bytes, buffer {})", sequence, bytes, index),
        }
    }
}

/// Streaming capture state machine
pub struct StreamPipeline<D, C> {
    device: D,
    relay: Relay<C>,
    config: StreamConfig,
    /// Buffers owned by the pipeline and not queued on the peripheral
    free: Vec<FrameBuffer>,
    /// Number of buffers currently owned by the peripheral
    queued: usize,
    state: State,
    stats: Stats,
}

impl<D: Streaming, C: Console> StreamPipeline<D, C> {
    /// Returns a pipeline over already allocated buffers
    ///
    /// # Arguments
    ///
    /// * `device` - Streaming peripheral
    /// * `console` - Serial link carrying triggers in and frames out
    /// * `buffers` - Working set, usually two buffers of one frame each
    /// * `config` - Timing parameters
    pub fn new(device: D, console: C, buffers: Vec<FrameBuffer>, config: StreamConfig) -> Self {
        StreamPipeline {
            device,
            relay: Relay::new(console),
            config,
            free: buffers,
            queued: 0,
            state: State::Idle,
            stats: Stats::default(),
        }
    }

    /// Allocates `config.buffer_count` buffers sized for `fmt` and returns a pipeline over them
    ///
    /// A working set of zero buffers is rejected, nothing could ever be dequeued.
    pub fn with_format(device: D, console: C, fmt: &Format, config: StreamConfig) -> Result<Self> {
        if config.buffer_count == 0 {
            error!("Stream configured without video buffers");
            return Err(Error::NoBuffers);
        }
        let capacity = frame_capacity(fmt)?;
        let mut pool = Pool::new(config.buffer_count);
        let buffers = pool.allocate_many(config.buffer_count, capacity)?;
        Ok(Self::new(device, console, buffers, config))
    }

    /// Queue all buffers and start the stream
    ///
    /// Equivalent to ticking until the pipeline reports [`State::Streaming`].
    pub fn start(&mut self) -> Result<StreamStart> {
        loop {
            match self.state {
                State::Streaming => return Ok(StreamStart::AlreadyStarted),
                State::Stopped => return Err(Error::Terminated),
                State::Idle | State::Armed => {
                    if let Tick::Started(start) = self.tick()? {
                        return Ok(start);
                    }
                }
            }
        }
    }

    /// Advance the state machine by one step
    ///
    /// Before streaming, each tick performs one setup transition. While streaming, each tick polls
    /// the trigger once. Errors are fatal: the stream is stopped and every later tick fails with
    /// [`Error::Terminated`].
    pub fn tick(&mut self) -> Result<Tick> {
        let res = match self.state {
            State::Idle => self.arm(),
            State::Armed => self.begin(),
            State::Streaming => self.step(),
            State::Stopped => return Err(Error::Terminated),
        };

        if let Err(e) = &res {
            self.fail(e);
        }
        res
    }

    /// Stop the stream, the pipeline cannot be restarted afterwards
    pub fn stop(&mut self) -> Result<()> {
        let state = std::mem::replace(&mut self.state, State::Stopped);
        match state {
            State::Armed | State::Streaming => self.device.stop().map_err(Error::Stop),
            State::Idle | State::Stopped => Ok(()),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Number of buffers currently held by the peripheral
    pub fn queued(&self) -> usize {
        self.queued
    }

    /// Number of buffers currently held by the pipeline itself
    pub fn free(&self) -> usize {
        self.free.len()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn relay(&self) -> &Relay<C> {
        &self.relay
    }

    fn arm(&mut self) -> Result<Tick> {
        let buffers = self.free.len();
        while !self.free.is_empty() {
            let buf = self.free.remove(0);
            self.enqueue(buf)?;
        }

        debug!(buffers, "Queued all video buffers");
        self.state = State::Armed;
        Ok(Tick::Armed { buffers })
    }

    fn begin(&mut self) -> Result<Tick> {
        let start = self.device.start().map_err(Error::Start)?;

        info!("Capture {}", start);
        self.state = State::Streaming;
        Ok(Tick::Started(start))
    }

    fn step(&mut self) -> Result<Tick> {
        if !self.relay.poll_trigger(self.config.trigger)? {
            self.stats.idle_ticks += 1;
            thread::sleep(self.config.idle_backoff);
            return Ok(Tick::Idle);
        }
        self.stats.triggers += 1;

        let mut buf = match self.device.dequeue(self.config.dequeue_timeout) {
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                self.stats.timeouts += 1;
                debug!("No frame ready within {:?}", self.config.dequeue_timeout);
                return Ok(Tick::TimedOut);
            }
            Err(e) => return Err(Error::Dequeue(e)),
        };
        self.queued = self.queued.saturating_sub(1);
        buf.meta_mut().flags.remove(Flags::QUEUED);

        let index = buf.index();
        let sequence = buf.meta().sequence;
        if buf.meta().flags.contains(Flags::ERROR) {
            warn!(index, sequence, "Relaying frame flagged as corrupted");
        }

        let bytes = self.relay.send(buf.data())?;
        trace!(index, sequence, bytes, timestamp = %buf.meta().timestamp, "Relayed frame");

        self.enqueue(buf)?;
        self.stats.frames += 1;
        self.stats.bytes += bytes as u64;
        Ok(Tick::Relayed {
            index,
            sequence,
            bytes,
        })
    }

    fn enqueue(&mut self, mut buf: FrameBuffer) -> Result<()> {
        let index = buf.index();
        buf.clear();
        buf.meta_mut().flags = Flags::QUEUED;

        self.device
            .enqueue(buf)
            .map_err(|source| Error::Enqueue { index, source })?;
        self.queued += 1;
        Ok(())
    }

    fn fail(&mut self, e: &Error) {
        error!(error = %e, "Stream failed, stopping capture");
        if let Err(stop) = self.stop() {
            warn!(error = %stop, "Unable to stop capture");
        }
    }
}

impl<D: Streaming, C: Console> Pipeline for StreamPipeline<D, C> {
    type Tick = Tick;

    fn tick(&mut self) -> Result<Tick> {
        StreamPipeline::tick(self)
    }

    fn shutdown(&mut self) -> Result<()> {
        self.stop()
    }

    fn stats(&self) -> &Stats {
        &self.stats
    }
}
