use std::io;

use tracing::trace;

use crate::console::Console;
use crate::error::{Error, Result};

/// Serial side of the pipeline
///
/// Owns the console and is the only writer on it. Every `send` runs to completion before it
/// returns, so the bytes of two buffers can never interleave on the wire.
pub struct Relay<C> {
    console: C,
    bytes_sent: u64,
    sends: u64,
}

impl<C: Console> Relay<C> {
    /// Returns a relay writing to `console`
    pub fn new(console: C) -> Self {
        Relay {
            console,
            bytes_sent: 0,
            sends: 0,
        }
    }

    /// Poll one input byte and tell whether it equals `trigger`
    ///
    /// No input, an interrupted read and any other byte all count as "not triggered".
    pub fn poll_trigger(&mut self, trigger: u8) -> Result<bool> {
        match self.console.read_byte() {
            Ok(byte) => Ok(byte == Some(trigger)),
            Err(e) if is_transient(&e) => Ok(false),
            Err(e) => Err(Error::Link(e)),
        }
    }

    /// Write all of `bytes` in order, one byte at a time
    ///
    /// Returns the number of bytes written, which is always `bytes.len()` on success.
    pub fn send(&mut self, bytes: &[u8]) -> Result<usize> {
        for &byte in bytes {
            loop {
                match self.console.write_byte(byte) {
                    Ok(()) => break,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(Error::Link(e)),
                }
            }
        }

        self.bytes_sent += bytes.len() as u64;
        self.sends += 1;
        trace!(len = bytes.len(), "Relayed buffer");
        Ok(bytes.len())
    }

    /// Total bytes written since creation
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Number of completed `send` calls
    pub fn sends(&self) -> u64 {
        self.sends
    }

    pub fn console(&self) -> &C {
        &self.console
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
