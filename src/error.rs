use std::io;

use thiserror::Error;

/// Result alias used by the pipeline layer
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse severity of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Setup could not complete, nothing was started
    StartupFatal,
    /// A running stream broke down and has been stopped
    StreamFatal,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("capture device not ready")]
    NotReady(#[source] io::Error),
    #[error("unable to retrieve video format")]
    Format(#[source] io::Error),
    #[error("negotiated format {0} yields an empty frame")]
    EmptyFormat(crate::Format),
    #[error("unable to alloc video buffer of {capacity} bytes")]
    Alloc { capacity: usize },
    #[error("buffer pool exhausted ({limit} buffers)")]
    PoolExhausted { limit: usize },
    #[error("pipeline needs at least one video buffer")]
    NoBuffers,

    #[error("unable to start capture")]
    Start(#[source] io::Error),
    #[error("unable to stop capture")]
    Stop(#[source] io::Error),
    #[error("unable to queue video buffer {index}")]
    Enqueue {
        index: usize,
        #[source]
        source: io::Error,
    },
    #[error("unable to dequeue video buffer")]
    Dequeue(#[source] io::Error),
    #[error("unable to take picture")]
    Capture(#[source] io::Error),
    #[error("chunk of {chunk} bytes overruns the {remaining} bytes left in the frame")]
    LengthOverrun { chunk: usize, remaining: usize },
    #[error("frame drain stalled with {remaining} bytes left after {failures} failed reads")]
    DrainStalled { remaining: usize, failures: u32 },
    #[error("serial link failed")]
    Link(#[source] io::Error),
    #[error("pipeline already failed")]
    Terminated,
}

impl Error {
    /// Whether the error happened before or after streaming began
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::NotReady(_)
            | Error::Format(_)
            | Error::EmptyFormat(_)
            | Error::Alloc { .. }
            | Error::PoolExhausted { .. }
            | Error::NoBuffers => ErrorClass::StartupFatal,
            _ => ErrorClass::StreamFatal,
        }
    }
}
