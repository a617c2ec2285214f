//! Run-forever driver for the capture pipelines
//!
//! The pipelines never exit on their own. They report every step as a tick and signal the end
//! of their life with an error; [`run`] is the loop that keeps ticking until that happens and
//! hands the error back, leaving restarts to whatever launched the process.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{error, info, trace, warn};

use crate::error::{Error, Result};

/// Interval between two stats log lines
pub const STATS_INTERVAL: Duration = Duration::from_secs(30);

/// Counters shared by both pipeline variants
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Ticks without a trigger byte
    pub idle_ticks: u64,
    /// Ticks that saw the trigger byte
    pub triggers: u64,
    /// Triggered dequeues that found no finished frame
    pub timeouts: u64,
    /// Frames relayed in full
    pub frames: u64,
    /// Chunks relayed (snapshot only)
    pub chunks: u64,
    /// Chunk reads that had to be retried (snapshot only)
    pub failed_reads: u64,
    /// Payload bytes relayed
    pub bytes: u64,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames, {} bytes, {} triggers, {} timeouts, {} failed reads",
            self.frames, self.bytes, self.triggers, self.timeouts, self.failed_reads
        )
    }
}

/// A capture pipeline driven one tick at a time
pub trait Pipeline {
    /// Tagged outcome of a single tick
    type Tick: fmt::Debug;

    /// Advance by one step, any error is terminal
    fn tick(&mut self) -> Result<Self::Tick>;

    /// Release the peripheral, safe to call more than once
    fn shutdown(&mut self) -> Result<()>;

    fn stats(&self) -> &Stats;
}

/// Tick `pipeline` until it fails
///
/// Returns the fatal error after the pipeline has been shut down. Counters are logged every
/// [`STATS_INTERVAL`].
pub fn run<P: Pipeline + ?Sized>(pipeline: &mut P) -> Error {
    let mut last_log = Instant::now();

    loop {
        match pipeline.tick() {
            Ok(tick) => trace!(?tick, "Tick"),
            Err(e) => {
                error!(error = %e, class = ?e.class(), "Pipeline terminated");
                if let Err(stop) = pipeline.shutdown() {
                    warn!(error = %stop, "Unable to shut pipeline down");
                }
                info!("Stats: {}", pipeline.stats());
                return e;
            }
        }

        if last_log.elapsed() >= STATS_INTERVAL {
            info!("Stats: {}", pipeline.stats());
            last_log = Instant::now();
        }
    }
}
