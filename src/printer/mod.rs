//! # Printer Sink
//!
//! The device side of the pipeline. A [`PrinterSink`] is an opaque printer:
//! the dispatcher opens it, writes one bitmap, waits for the hardware to
//! finish, and closes it again.
//!
//! ## Available Sinks
//!
//! - [`SerialPrinter`]: StarPRNT raster over a serial/RFCOMM character device
//! - [`PngDirectory`]: writes each ticket as a PNG (previews)
//! - [`DryRun`]: encodes the StarPRNT job and discards it
//!
//! ## Error Classes
//!
//! | Error | Class | Dispatcher reaction |
//! |-------|-------|---------------------|
//! | `Busy` | transient | wait up to the busy budget |
//! | `Timeout` | transient | resubmit up to the retry budget |
//! | `Hardware` / `Io` | fault | no retry, pause the run |
//! | `Rejected` | ticket | fail this ticket only |

mod dry_run;
mod png;
mod profile;
mod serial;
pub mod starprnt;

pub use dry_run::DryRun;
pub use png::PngDirectory;
pub use profile::PrinterProfile;
pub use serial::{DEFAULT_DEVICE, SerialPrinter};

use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::render::TicketBitmap;

/// Hardware-reported fault conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareFault {
    PaperOut,
    CoverOpen,
    CutterJam,
    Other(String),
}

impl fmt::Display for HardwareFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardwareFault::PaperOut => f.write_str("paper-out"),
            HardwareFault::CoverOpen => f.write_str("cover-open"),
            HardwareFault::CutterJam => f.write_str("cutter-jam"),
            HardwareFault::Other(code) => f.write_str(code),
        }
    }
}

impl Serialize for HardwareFault {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// Another process holds the device.
    #[error("printer is busy")]
    Busy,

    /// No completion signal within the acknowledgment timeout.
    #[error("no completion signal within {0:?}")]
    Timeout(Duration),

    #[error("hardware fault: {0}")]
    Hardware(HardwareFault),

    #[error("device I/O error: {0}")]
    Io(String),

    /// The device cannot print this bitmap (e.g. wider than the head).
    #[error("bitmap rejected: {0}")]
    Rejected(String),
}

/// How the dispatcher treats a [`DeviceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Fault,
    Ticket,
}

impl DeviceError {
    pub fn class(&self) -> ErrorClass {
        match self {
            DeviceError::Busy | DeviceError::Timeout(_) => ErrorClass::Transient,
            DeviceError::Hardware(_) | DeviceError::Io(_) => ErrorClass::Fault,
            DeviceError::Rejected(_) => ErrorClass::Ticket,
        }
    }
}

impl From<std::io::Error> for DeviceError {
    fn from(e: std::io::Error) -> Self {
        DeviceError::Io(e.to_string())
    }
}

/// Receipt for a transmitted bitmap, redeemed by
/// [`PrinterSink::await_completion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// Bytes handed to the device.
    pub bytes: usize,
}

/// Capability: an exclusive, opaque printer device.
pub trait PrinterSink {
    type Handle;

    /// Acquire exclusive access. Fails with [`DeviceError::Busy`] if someone
    /// else holds the device.
    fn open(&mut self) -> Result<Self::Handle, DeviceError>;

    /// Transmit one bitmap.
    fn write(&mut self, handle: &mut Self::Handle, bitmap: &TicketBitmap)
    -> Result<Ack, DeviceError>;

    /// Block until the device reports the job done, or `timeout` elapses
    /// ([`DeviceError::Timeout`]).
    fn await_completion(
        &mut self,
        handle: &mut Self::Handle,
        ack: Ack,
        timeout: Duration,
    ) -> Result<(), DeviceError>;

    /// Release the device.
    fn close(&mut self, handle: Self::Handle);
}
