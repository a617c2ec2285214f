use bitflags::bitflags;
use std::fmt;

use crate::Timestamp;

bitflags! {
    #[allow(clippy::unreadable_literal)]
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flags: u32 {
        /// Buffer is queued for filling
        const QUEUED                = 0x00000002;
        /// Buffer is ready
        const DONE                  = 0x00000004;
        /// Buffer is ready, but the data contained within is corrupted
        const ERROR                 = 0x00000040;
    }
}

impl From<u32> for Flags {
    fn from(flags: u32) -> Flags {
        Flags::from_bits_truncate(flags)
    }
}

impl From<Flags> for u32 {
    fn from(flags: Flags) -> Self {
        flags.bits()
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Buffer metadata, mostly used not to convolute the main buffer structs
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Sequence number, counting the frames
    pub sequence: u32,
    /// Time of capture (usually set by the driver)
    pub timestamp: Timestamp,
    /// Buffer flags
    pub flags: Flags,
}

/// Fixed-capacity frame memory
///
/// A buffer is handed around by value: the pool hands it out once, the peripheral owns it while
/// it is queued, the capture loop owns it once dequeued and lends it to the relay while
/// draining. It does not implement `Clone`.
pub struct FrameBuffer {
    index: usize,
    backing: Vec<u8>,
    bytes_used: usize,
    meta: Metadata,
}

impl FrameBuffer {
    /// Wraps zeroed backing storage, see [`crate::Pool::allocate`]
    pub(crate) fn new(index: usize, backing: Vec<u8>) -> Self {
        FrameBuffer {
            index,
            backing,
            bytes_used: 0,
            meta: Metadata::default(),
        }
    }

    /// Position of the buffer within its pool
    pub fn index(&self) -> usize {
        self.index
    }

    /// Size of the backing memory region
    pub fn capacity(&self) -> usize {
        self.backing.len()
    }

    /// Number of valid bytes, never larger than the capacity
    pub fn bytes_used(&self) -> usize {
        self.bytes_used
    }

    /// Slice of the valid data, `[0, bytes_used)`
    pub fn data(&self) -> &[u8] {
        &self.backing[..self.bytes_used]
    }

    /// Whether the buffer holds no valid data
    pub fn is_empty(&self) -> bool {
        self.bytes_used == 0
    }

    /// Metadata such as flags, timestamp and sequence number
    pub fn meta(&self) -> &Metadata {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut Metadata {
        &mut self.meta
    }

    /// Full backing region for a producer to write into
    ///
    /// Callers must follow up with [`FrameBuffer::set_bytes_used`].
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.backing
    }

    /// Marks the first `len` bytes as valid, clamped to the capacity
    ///
    /// Returns the stored length.
    pub fn set_bytes_used(&mut self, len: usize) -> usize {
        self.bytes_used = len.min(self.backing.len());
        self.bytes_used
    }

    /// Copies `src` to the start of the buffer, truncating at the capacity
    ///
    /// Returns the number of bytes copied.
    pub fn fill_from(&mut self, src: &[u8]) -> usize {
        let len = src.len().min(self.backing.len());
        self.backing[..len].copy_from_slice(&src[..len]);
        self.set_bytes_used(len)
    }

    /// Drops the valid data, keeping the allocation
    pub fn clear(&mut self) {
        self.bytes_used = 0;
        self.meta = Metadata::default();
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("index", &self.index)
            .field("capacity", &self.capacity())
            .field("bytes_used", &self.bytes_used)
            .field("meta", &self.meta)
            .finish()
    }
}
