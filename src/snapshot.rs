//! Single-buffer snapshot pipeline
//!
//! Each trigger byte takes one picture into the peripheral's FIFO, which is then drained chunk
//! by chunk through the one buffer of the pool. A frame is larger than the buffer, so every chunk
//! goes out over the link as soon as it has been read.

use std::{fmt, thread};

use tracing::{debug, error, warn};

use crate::buffer::FrameBuffer;
use crate::config::SnapshotConfig;
use crate::console::Console;
use crate::device::Snapshot;
use crate::error::{Error, Result};
use crate::pool::Pool;
use crate::relay::Relay;
use crate::supervisor::{Pipeline, Stats};

/// Lifecycle of a [`SnapshotPipeline`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Waiting for a trigger
    Idle,
    /// Capture command issued
    Triggered,
    /// FIFO still holds `remaining` bytes of the current frame
    Draining { remaining: usize },
    /// Stopped for good after a fatal error
    Stopped,
}

/// Result of a single [`SnapshotPipeline::tick`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// No trigger byte this tick
    Idle,
    /// A whole frame was captured and relayed
    Captured {
        /// Frame length reported by the capture command
        total: usize,
        /// Successful chunk reads, one relay call each
        chunks: u32,
        /// Chunk reads that failed and were retried
        retries: u32,
    },
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Tick::Idle => write!(f, "idle"),
            Tick::Captured {
                total,
                chunks,
                retries,
            } => write!(
                f,
                "captured {} bytes in {} chunks ({} retries)",
                total, chunks, retries
            ),
        }
    }
}

/// Snapshot capture state machine
pub struct SnapshotPipeline<D, C> {
    device: D,
    relay: Relay<C>,
    config: SnapshotConfig,
    buffer: FrameBuffer,
    state: State,
    stats: Stats,
}

impl<D: Snapshot, C: Console> SnapshotPipeline<D, C> {
    /// Returns a pipeline draining through `buffer`
    ///
    /// # Arguments
    ///
    /// * `device` - Capture-then-poll peripheral
    /// * `console` - Serial link carrying triggers in and frames out
    /// * `buffer` - Chunk buffer
    /// * `config` - Timing and retry parameters
    pub fn new(device: D, console: C, buffer: FrameBuffer, config: SnapshotConfig) -> Self {
        SnapshotPipeline {
            device,
            relay: Relay::new(console),
            config,
            buffer,
            state: State::Idle,
            stats: Stats::default(),
        }
    }

    /// Allocates the single chunk buffer of `config.chunk_size` bytes
    pub fn with_config(device: D, console: C, config: SnapshotConfig) -> Result<Self> {
        let buffer = Pool::new(1).allocate(config.chunk_size)?;
        Ok(Self::new(device, console, buffer, config))
    }

    /// Poll the trigger once and, if armed, capture and drain one full frame
    ///
    /// Errors are fatal, every later tick fails with [`Error::Terminated`].
    pub fn tick(&mut self) -> Result<Tick> {
        if self.state == State::Stopped {
            return Err(Error::Terminated);
        }

        let res = self.step();
        if let Err(e) = &res {
            error!(error = %e, state = ?self.state, "Snapshot failed");
            self.state = State::Stopped;
        }
        res
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn relay(&self) -> &Relay<C> {
        &self.relay
    }

    fn step(&mut self) -> Result<Tick> {
        if !self.relay.poll_trigger(self.config.trigger)? {
            self.stats.idle_ticks += 1;
            thread::sleep(self.config.idle_backoff);
            return Ok(Tick::Idle);
        }
        self.stats.triggers += 1;

        self.state = State::Triggered;
        let total = self.device.trigger_capture().map_err(Error::Capture)?;
        debug!(total, "Took picture");

        let (chunks, retries) = self.drain(total)?;
        self.state = State::Idle;
        self.stats.frames += 1;
        Ok(Tick::Captured {
            total,
            chunks,
            retries,
        })
    }

    /// Relay the FIFO contents until exactly `total` bytes went out
    fn drain(&mut self, total: usize) -> Result<(u32, u32)> {
        let budget = self.config.retry_budget(total);
        let mut remaining = total;
        let mut chunks = 0;
        let mut failures = 0;

        while remaining > 0 {
            self.state = State::Draining { remaining };
            self.buffer.clear();

            let used = match self.device.read_chunk(&mut self.buffer) {
                Ok(()) => self.buffer.bytes_used(),
                Err(e) => {
                    debug!(error = %e, remaining, "Unable to read FIFO chunk");
                    0
                }
            };

            if used == 0 {
                failures += 1;
                self.stats.failed_reads += 1;
                if failures > budget {
                    return Err(Error::DrainStalled {
                        remaining,
                        failures,
                    });
                }
                if failures == budget / 2 {
                    warn!(remaining, failures, budget, "FIFO drain is struggling");
                }
                thread::sleep(self.config.retry_backoff);
                continue;
            }

            if used > remaining {
                return Err(Error::LengthOverrun {
                    chunk: used,
                    remaining,
                });
            }

            self.relay.send(self.buffer.data())?;
            remaining -= used;
            chunks += 1;
            self.stats.chunks += 1;
            self.stats.bytes += used as u64;
        }

        Ok((chunks, failures))
    }
}

impl<D: Snapshot, C: Console> Pipeline for SnapshotPipeline<D, C> {
    type Tick = Tick;

    fn tick(&mut self) -> Result<Tick> {
        SnapshotPipeline::tick(self)
    }

    fn shutdown(&mut self) -> Result<()> {
        self.state = State::Stopped;
        Ok(())
    }

    fn stats(&self) -> &Stats {
        &self.stats
    }
}
