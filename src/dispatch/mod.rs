//! # Print Dispatcher
//!
//! Owns the [`PrinterSink`] and turns one rendered bitmap into one
//! [`PrintOutcome`].
//!
//! ## Submission
//!
//! ```text
//! pace ─► open (poll while Busy, up to busy_wait) ─► write ─► await ack
//!                                                     ▲          │
//!                                                     └─ Timeout ┘  (≤ retry_budget)
//! ```
//!
//! Hardware and I/O faults are never retried. They fail the ticket and,
//! under [`HardwarePolicy::Halt`], ask the orchestrator to pause the run.

mod pacing;

pub use pacing::Pacer;

use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::outcome::{FailureReason, PrintOutcome};
use crate::printer::{DeviceError, ErrorClass, PrinterSink};
use crate::render::TicketBitmap;

/// What the run should do after a hardware fault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwarePolicy {
    /// Stop the run; remaining tickets are skipped.
    #[default]
    Halt,
    /// Record the failure and keep going.
    Continue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Minimum gap between submissions. 0 disables pacing.
    pub inter_print_delay_ms: u64,
    /// Resubmissions allowed after a timeout.
    pub retry_budget: u32,
    pub ack_timeout_ms: u64,
    /// How long to keep polling a busy device. 0 fails immediately.
    pub busy_wait_ms: u64,
    pub busy_poll_ms: u64,
    pub on_hardware_error: HardwarePolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            inter_print_delay_ms: 500,
            retry_budget: 1,
            ack_timeout_ms: 15_000,
            busy_wait_ms: 0,
            busy_poll_ms: 250,
            on_hardware_error: HardwarePolicy::Halt,
        }
    }
}

impl DispatchConfig {
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn busy_wait(&self) -> Duration {
        Duration::from_millis(self.busy_wait_ms)
    }

    pub fn busy_poll(&self) -> Duration {
        Duration::from_millis(self.busy_poll_ms.max(1))
    }

    pub fn inter_print_delay(&self) -> Duration {
        Duration::from_millis(self.inter_print_delay_ms)
    }
}

/// Whether the run may continue after a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Continue,
    Pause,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub outcome: PrintOutcome,
    pub directive: Directive,
}

pub struct Dispatcher<S: PrinterSink> {
    sink: S,
    config: DispatchConfig,
    pacer: Pacer,
}

impl<S: PrinterSink> Dispatcher<S> {
    pub fn new(sink: S, config: DispatchConfig) -> Self {
        let pacer = Pacer::new(config.inter_print_delay());
        Self {
            sink,
            config,
            pacer,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Print one bitmap. The device is held only for the duration of this
    /// call.
    #[instrument(skip(self, bitmap), fields(ticket_id = %bitmap.ticket_id()))]
    pub fn submit(&mut self, bitmap: &TicketBitmap) -> Dispatched {
        self.pacer.wait();

        let (result, attempts) = match self.acquire() {
            Ok(mut handle) => {
                let result = self.transmit(&mut handle, bitmap);
                self.sink.close(handle);
                result
            }
            Err(e) => (Err(e), 0),
        };
        self.pacer.mark();

        let ticket_id = bitmap.ticket_id();
        match result {
            Ok(()) => {
                info!(attempts, "ticket printed");
                Dispatched {
                    outcome: PrintOutcome::printed(ticket_id, attempts),
                    directive: Directive::Continue,
                }
            }
            Err(e) => {
                let directive = match (e.class(), self.config.on_hardware_error) {
                    (ErrorClass::Fault, HardwarePolicy::Halt) => Directive::Pause,
                    _ => Directive::Continue,
                };
                warn!(error = %e, attempts, ?directive, "ticket failed");
                Dispatched {
                    outcome: PrintOutcome::failed(ticket_id, FailureReason::from(e), attempts),
                    directive,
                }
            }
        }
    }

    fn acquire(&mut self) -> Result<S::Handle, DeviceError> {
        let deadline = Instant::now() + self.config.busy_wait();
        loop {
            match self.sink.open() {
                Err(DeviceError::Busy) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(DeviceError::Busy);
                    }
                    let pause = self.config.busy_poll().min(deadline - now);
                    debug!(?pause, "printer busy, waiting");
                    thread::sleep(pause);
                }
                other => return other,
            }
        }
    }

    /// Write and await completion, resubmitting on transient errors.
    /// Returns the result and the number of submissions made.
    fn transmit(
        &mut self,
        handle: &mut S::Handle,
        bitmap: &TicketBitmap,
    ) -> (Result<(), DeviceError>, u32) {
        let timeout = self.config.ack_timeout();
        let mut attempts = 0;
        loop {
            attempts += 1;
            let result = self
                .sink
                .write(handle, bitmap)
                .and_then(|ack| self.sink.await_completion(handle, ack, timeout));

            match result {
                Err(e) if e.class() == ErrorClass::Transient && attempts <= self.config.retry_budget => {
                    warn!(error = %e, attempt = attempts, "retrying submission");
                }
                other => return (other, attempts),
            }
        }
    }
}
