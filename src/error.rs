//! # Error Types
//!
//! Each stage has its own error type; [`BoletaError`] wraps them for callers
//! that just want one. Per-ticket failures inside a run are not errors: they
//! are recorded in the run summary as [`FailureReason`](crate::FailureReason).

use thiserror::Error;

use crate::config::ConfigError;
use crate::layout::ComposeError;
use crate::printer::DeviceError;
use crate::render::RenderError;
use crate::ticket::TicketError;

/// Main error type for boleta operations
#[derive(Debug, Error)]
pub enum BoletaError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Ticket input could not be loaded
    #[error(transparent)]
    Ticket(#[from] TicketError),

    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error(transparent)]
    Render(#[from] RenderError),

    /// Printer device errors outside a run (e.g. probing the device)
    #[error("Printer error: {0}")]
    Device(#[from] DeviceError),

    /// The background run panicked or was aborted
    #[error("Worker error: {0}")]
    Worker(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
