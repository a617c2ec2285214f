//! Compile-time pipeline parameters
//!
//! There is no configuration file. The constants below are the values the firmware ships with,
//! the config structs only exist so tests and host builds can shorten the sleeps.

use std::time::Duration;

/// Input byte that arms a capture (`'\n'`)
pub const TRIGGER_BYTE: u8 = 0x0a;

/// Bounded wait for a filled buffer, one frame period at 30 fps
pub const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(33);

/// Sleep between trigger polls while no trigger is present
pub const IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// Double buffering: one buffer drains while the other fills
pub const STREAM_BUFFER_COUNT: usize = 2;

/// Resolution requested from the peripheral before streaming
pub const DEFAULT_WIDTH: u32 = 320;
pub const DEFAULT_HEIGHT: u32 = 240;

/// Capacity of the single snapshot buffer, one FIFO burst
pub const SNAPSHOT_CHUNK_SIZE: usize = 1024;

/// Failed chunk reads tolerated per expected chunk before a drain is abandoned
pub const SNAPSHOT_RETRY_FACTOR: u32 = 4;

/// Lower bound on the failed chunk read budget, for frames of only a few chunks
pub const SNAPSHOT_MIN_RETRIES: u32 = 16;

/// Settings of the double-buffered streaming pipeline
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Byte that arms one dequeue attempt
    pub trigger: u8,
    /// Number of buffers submitted to the peripheral
    pub buffer_count: usize,
    /// Bounded wait per dequeue attempt
    pub dequeue_timeout: Duration,
    /// Sleep after a tick without trigger
    pub idle_backoff: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            trigger: TRIGGER_BYTE,
            buffer_count: STREAM_BUFFER_COUNT,
            dequeue_timeout: DEQUEUE_TIMEOUT,
            idle_backoff: IDLE_BACKOFF,
        }
    }
}

impl StreamConfig {
    pub fn with_buffer_count(mut self, count: usize) -> Self {
        self.buffer_count = count;
        self
    }

    pub fn with_dequeue_timeout(mut self, timeout: Duration) -> Self {
        self.dequeue_timeout = timeout;
        self
    }

    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }
}

/// Settings of the single-buffer snapshot pipeline
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Byte that arms one capture-and-drain cycle
    pub trigger: u8,
    /// Capacity of the chunk buffer
    pub chunk_size: usize,
    /// Sleep after a tick without trigger
    pub idle_backoff: Duration,
    /// Sleep after a failed chunk read
    pub retry_backoff: Duration,
    /// Failed reads tolerated per expected chunk
    pub retry_factor: u32,
    /// Minimum failed read budget per capture
    pub min_retries: u32,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            trigger: TRIGGER_BYTE,
            chunk_size: SNAPSHOT_CHUNK_SIZE,
            idle_backoff: IDLE_BACKOFF,
            retry_backoff: IDLE_BACKOFF,
            retry_factor: SNAPSHOT_RETRY_FACTOR,
            min_retries: SNAPSHOT_MIN_RETRIES,
        }
    }
}

impl SnapshotConfig {
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_retries(mut self, factor: u32, min: u32) -> Self {
        self.retry_factor = factor;
        self.min_retries = min;
        self
    }

    /// Failed chunk reads allowed while draining a frame of `total` bytes
    pub fn retry_budget(&self, total: usize) -> u32 {
        let chunks = if self.chunk_size == 0 {
            0
        } else {
            total.div_ceil(self.chunk_size)
        };
        let chunks = u32::try_from(chunks).unwrap_or(u32::MAX);
        chunks.saturating_mul(self.retry_factor).max(self.min_retries)
    }
}
