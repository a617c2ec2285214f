//! Trigger-gated camera frame relay
//!
//! Frames are captured from a camera peripheral and written out raw over a serial link, one
//! frame per trigger byte (`'\n'`) received on the same link. Two pipelines are provided:
//!
//! * [`StreamPipeline`] double-buffers a continuously streaming peripheral: one buffer drains over
//!   the link while the other fills.
//! * [`SnapshotPipeline`] takes one picture per trigger into the peripheral's FIFO and drains it
//!   chunk by chunk through a single small buffer.
//!
//! Both are driven one tick at a time, usually by [`supervisor::run`].

pub mod buffer;
pub use buffer::{FrameBuffer, Metadata};

pub mod config;
pub use config::{SnapshotConfig, StreamConfig};

pub mod console;
pub use console::Console;

pub mod device;
pub use device::{Negotiate, Snapshot, StreamStart, Streaming};

mod error;
pub use error::{Error, ErrorClass, Result};

mod format;
pub use format::Format;

mod fourcc;
pub use fourcc::FourCC;

pub mod negotiate;
pub use negotiate::negotiate;

mod pool;
pub use pool::Pool;

pub mod relay;
pub use relay::Relay;

pub mod snapshot;
pub use snapshot::SnapshotPipeline;

pub mod stream;
pub use stream::StreamPipeline;

pub mod supervisor;
pub use supervisor::{Pipeline, Stats};

mod timestamp;
pub use timestamp::Timestamp;

#[cfg(unix)]
pub mod tty;

#[cfg(feature = "v4l")]
pub mod camera;
