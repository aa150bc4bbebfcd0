//! # Boleta - Receipt Ticket Printing Pipeline
//!
//! Boleta renders a batch of receipt tickets (line items, a total, a QR code
//! and an optional footer) and prints them on a Star thermal printer, one
//! ticket at a time, with at most one ticket bitmap in memory.
//!
//! ```text
//! TicketRecord ─► Composer ─► LayoutPlan ─► Renderer ─► TicketBitmap ─► Dispatcher ─► PrinterSink
//!                    │                                                     │
//!                 QrEncoder                                          retry / pause
//!                 FooterProvider
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use boleta::{Pipeline, RunConfig, SerialPrinter, TicketRecord};
//!
//! let config = RunConfig::default();
//! let printer = SerialPrinter::new(&config.printer.device, config.profile()?);
//! let mut pipeline = Pipeline::new(&config, printer)?;
//!
//! let tickets = vec![
//!     TicketRecord::new("A-1", "https://example.com/t/A-1")
//!         .item("Adult", "2 x 12.50")
//!         .total_cents(2500),
//! ];
//!
//! let summary = pipeline.run(&tickets);
//! println!("{}", summary); // "1 printed, 0 failed, 0 skipped" + details
//! # Ok::<(), boleta::BoletaError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`ticket`] | Ticket records and JSON loading |
//! | [`qr`] | QR encoding |
//! | [`layout`] | Layout plans, footers, the composer |
//! | [`render`] | Rasterizing plans into 1-bit bitmaps |
//! | [`printer`] | Printer sinks, StarPRNT encoding, serial transport |
//! | [`dispatch`] | Submission with retries and pacing |
//! | [`pipeline`] | The run orchestrator and background worker |
//! | [`config`] | Run configuration |
//! | [`error`] | Error types |

pub mod config;
pub mod dispatch;
pub mod error;
pub mod layout;
pub mod outcome;
pub mod pipeline;
pub mod printer;
pub mod qr;
pub mod render;
pub mod ticket;

// Re-exports for convenience
pub use config::{RunConfig, load_config};
pub use error::BoletaError;
pub use outcome::{FailureReason, PrintOutcome, PrintStatus, RunSummary};
pub use pipeline::{CancelToken, Pipeline, ProgressEvent, RunHandle, print_tickets, spawn_run};
pub use printer::{DryRun, PngDirectory, PrinterProfile, PrinterSink, SerialPrinter};
pub use render::{BufferGauge, TicketBitmap};
pub use ticket::{LineItem, TicketRecord, load_tickets, parse_tickets};
