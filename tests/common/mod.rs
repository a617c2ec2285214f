#![allow(dead_code)]

use std::collections::{BTreeSet, VecDeque};
use std::io;
use std::time::Duration;

use camrelay::{Console, FrameBuffer, Snapshot, StreamStart, Streaming};

/// Serial link fed from a script of input bytes, recording everything written
#[derive(Default)]
pub struct ScriptedConsole {
    pub input: VecDeque<Option<u8>>,
    pub output: Vec<u8>,
    pub polls: usize,
}

impl ScriptedConsole {
    pub fn new<I: IntoIterator<Item = Option<u8>>>(input: I) -> Self {
        ScriptedConsole {
            input: input.into_iter().collect(),
            ..Default::default()
        }
    }

    /// `n` trigger bytes in a row
    pub fn triggers(n: usize) -> Self {
        Self::new(std::iter::repeat(Some(0x0a)).take(n))
    }
}

impl Console for ScriptedConsole {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        self.polls += 1;
        Ok(self.input.pop_front().flatten())
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.output.push(byte);
        Ok(())
    }
}

/// What the next dequeue does
pub enum Frame {
    /// Fill the oldest queued buffer with `len` bytes
    Ready(usize),
    TimedOut,
    Fail(io::ErrorKind),
}

/// Streaming peripheral that fills buffers from a script
///
/// Every filled byte is `sequence as u8 + offset`, so relayed data can be traced back to the
/// frame it came from. The set of held buffer indices checks that no buffer is ever queued
/// twice.
pub struct ScriptedCamera {
    pub frames: VecDeque<Frame>,
    pub queue: VecDeque<FrameBuffer>,
    pub held: BTreeSet<usize>,
    pub start_code: i32,
    pub sequence: u32,
    pub dequeues: usize,
    pub enqueues: usize,
    pub starts: usize,
    pub stops: usize,
    pub timeouts_seen: Vec<Duration>,
    pub fail_enqueue_after: Option<usize>,
    /// Ownership violations observed, must stay empty
    pub violations: Vec<String>,
}

impl ScriptedCamera {
    pub fn new<I: IntoIterator<Item = Frame>>(frames: I) -> Self {
        ScriptedCamera {
            frames: frames.into_iter().collect(),
            queue: VecDeque::new(),
            held: BTreeSet::new(),
            start_code: 0,
            sequence: 0,
            dequeues: 0,
            enqueues: 0,
            starts: 0,
            stops: 0,
            timeouts_seen: Vec::new(),
            fail_enqueue_after: None,
            violations: Vec::new(),
        }
    }

    pub fn frame_byte(sequence: u32, offset: usize) -> u8 {
        (sequence as usize * 31 + offset) as u8
    }
}

impl Streaming for ScriptedCamera {
    fn enqueue(&mut self, buf: FrameBuffer) -> io::Result<()> {
        if let Some(n) = self.fail_enqueue_after {
            if self.enqueues >= n {
                return Err(io::Error::new(io::ErrorKind::Other, "queue full"));
            }
        }
        self.enqueues += 1;
        if !self.held.insert(buf.index()) {
            self.violations
                .push(format!("buffer {} queued twice", buf.index()));
        }
        self.queue.push_back(buf);
        Ok(())
    }

    fn dequeue(&mut self, timeout: Duration) -> io::Result<FrameBuffer> {
        self.dequeues += 1;
        self.timeouts_seen.push(timeout);

        match self.frames.pop_front() {
            Some(Frame::Ready(len)) => {
                let mut buf = match self.queue.pop_front() {
                    Some(buf) => buf,
                    None => return Err(io::Error::new(io::ErrorKind::Other, "queue empty")),
                };
                self.held.remove(&buf.index());

                let sequence = self.sequence;
                self.sequence += 1;
                let slice = buf.as_mut_slice();
                for (offset, byte) in slice.iter_mut().enumerate().take(len) {
                    *byte = Self::frame_byte(sequence, offset);
                }
                buf.set_bytes_used(len);
                buf.meta_mut().sequence = sequence;
                Ok(buf)
            }
            Some(Frame::TimedOut) | None => Err(io::Error::new(io::ErrorKind::TimedOut, "EAGAIN")),
            Some(Frame::Fail(kind)) => Err(io::Error::new(kind, "dequeue failed")),
        }
    }

    fn start(&mut self) -> io::Result<StreamStart> {
        self.starts += 1;
        StreamStart::from_code(self.start_code)
    }

    fn stop(&mut self) -> io::Result<()> {
        self.stops += 1;
        Ok(())
    }
}

/// What the next chunk read does
pub enum Chunk {
    /// Read up to `n` bytes from the FIFO
    Bytes(usize),
    Fail,
}

/// Snapshot peripheral with a FIFO holding a deterministic frame
pub struct ScriptedFifo {
    pub total: usize,
    pub fifo: VecDeque<u8>,
    pub chunks: VecDeque<Chunk>,
    pub captures: usize,
    pub reads: usize,
    /// `bytes_used` of every successful read, in order
    pub delivered: Vec<usize>,
    pub fail_capture: bool,
    /// Bytes the FIFO holds beyond the reported frame length
    pub overfill: usize,
}

impl ScriptedFifo {
    pub fn new<I: IntoIterator<Item = Chunk>>(total: usize, chunks: I) -> Self {
        ScriptedFifo {
            total,
            fifo: VecDeque::new(),
            chunks: chunks.into_iter().collect(),
            captures: 0,
            reads: 0,
            delivered: Vec::new(),
            fail_capture: false,
            overfill: 0,
        }
    }

    pub fn frame(total: usize) -> Vec<u8> {
        (0..total).map(|i| (i % 251) as u8).collect()
    }
}

impl Snapshot for ScriptedFifo {
    fn trigger_capture(&mut self) -> io::Result<usize> {
        if self.fail_capture {
            return Err(io::Error::new(io::ErrorKind::Other, "capture failed"));
        }
        self.captures += 1;
        self.fifo = Self::frame(self.total + self.overfill).into();
        Ok(self.total)
    }

    fn read_chunk(&mut self, buf: &mut FrameBuffer) -> io::Result<()> {
        self.reads += 1;
        let want = match self.chunks.pop_front() {
            Some(Chunk::Bytes(n)) => n,
            Some(Chunk::Fail) => return Err(io::Error::new(io::ErrorKind::Other, "SPI error")),
            None => buf.capacity(),
        };

        let len = want.min(buf.capacity()).min(self.fifo.len());
        let chunk: Vec<u8> = self.fifo.drain(..len).collect();
        buf.fill_from(&chunk);
        self.delivered.push(len);
        Ok(())
    }
}
