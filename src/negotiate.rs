//! Startup format negotiation

use tracing::{error, info, warn};

use crate::device::Negotiate;
use crate::error::{Error, Result};
use crate::format::Format;

/// Reads the active format and optionally requests another resolution
///
/// The peripheral must report itself ready first. A failed read is fatal, there is no sensible
/// default geometry. Setting is best effort: the peripheral may clamp or reject the request, so
/// the format is read back afterwards and that result is what the caller must size its buffers
/// from.
///
/// # Arguments
///
/// * `dev` - Peripheral to negotiate with
/// * `size` - Desired `(width, height)`, `None` keeps the default format
pub fn negotiate<D: Negotiate + ?Sized>(dev: &mut D, size: Option<(u32, u32)>) -> Result<Format> {
    dev.ready().map_err(|e| {
        error!(error = %e, "Capture device not ready");
        Error::NotReady(e)
    })?;

    let default = read_format(dev)?;
    info!("Default format: {}", default);

    let (width, height) = match size {
        Some(size) => size,
        None => return Ok(default),
    };

    if let Err(e) = dev.set_format(&default.with_size(width, height)) {
        warn!(width, height, error = %e, "Unable to set video format");
    }

    let fmt = read_format(dev)?;
    if (fmt.width, fmt.height) != (width, height) {
        warn!(width, height, "Peripheral adjusted the requested format to {}", fmt);
    }
    info!("Set format: {}", fmt);
    Ok(fmt)
}

/// Size of one streamed frame, `stride * height`
///
/// Fails for a geometry without any pixels, which no buffer could hold.
pub fn frame_capacity(fmt: &Format) -> Result<usize> {
    match fmt.frame_size() {
        0 => Err(Error::EmptyFormat(*fmt)),
        size => Ok(size),
    }
}

fn read_format<D: Negotiate + ?Sized>(dev: &D) -> Result<Format> {
    dev.format().map_err(|e| {
        error!(error = %e, "Unable to retrieve video format");
        Error::Format(e)
    })
}
