use tracing::{debug, error};

use crate::buffer::FrameBuffer;
use crate::error::{Error, Result};

/// Manage frame buffers for a pipeline
///
/// The pool hands out at most `limit` buffers over its whole lifetime. There is no reclamation:
/// buffers circulate between the peripheral and the capture loop by hand-off and are only freed
/// when dropped at teardown.
#[derive(Debug)]
pub struct Pool {
    limit: usize,
    issued: usize,
}

impl Pool {
    /// Returns a new buffer pool
    ///
    /// # Arguments
    ///
    /// * `limit` - Total number of buffers this pool may hand out
    ///
    /// # Example
    ///
    /// ```
    /// use camrelay::Pool;
    ///
    /// let mut pool = Pool::new(2);
    /// let buf = pool.allocate(320 * 2 * 240).unwrap();
    /// assert_eq!(buf.index(), 0);
    /// ```
    pub fn new(limit: usize) -> Self {
        Pool { limit, issued: 0 }
    }

    /// Number of buffers handed out so far
    pub fn issued(&self) -> usize {
        self.issued
    }

    /// Allocate one exclusively owned, zeroed buffer
    ///
    /// Fails if the pool is exhausted or the memory cannot be reserved. Both are fatal for the
    /// caller, the pipeline cannot run below its working set.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Size of the buffer in bytes
    pub fn allocate(&mut self, capacity: usize) -> Result<FrameBuffer> {
        if self.issued >= self.limit {
            error!(limit = self.limit, "Buffer pool exhausted");
            return Err(Error::PoolExhausted { limit: self.limit });
        }
        if capacity == 0 {
            error!("Unable to alloc empty video buffer");
            return Err(Error::Alloc { capacity });
        }

        let mut backing = Vec::new();
        if backing.try_reserve_exact(capacity).is_err() {
            error!(capacity, "Unable to alloc video buffer");
            return Err(Error::Alloc { capacity });
        }
        backing.resize(capacity, 0);

        let buf = FrameBuffer::new(self.issued, backing);
        self.issued += 1;
        debug!(index = buf.index(), capacity, "Allocated video buffer");
        Ok(buf)
    }

    /// Allocate `count` buffers of equal capacity
    pub fn allocate_many(&mut self, count: usize, capacity: usize) -> Result<Vec<FrameBuffer>> {
        (0..count).map(|_| self.allocate(capacity)).collect()
    }
}
