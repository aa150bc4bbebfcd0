//! # Print Outcomes
//!
//! Per-ticket results and the run summary built from them. Every ticket in
//! a run ends in exactly one [`PrintOutcome`].

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::layout::ComposeError;
use crate::printer::{DeviceError, HardwareFault};
use crate::render::RenderError;

/// Why a ticket did not print.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    InvalidRecord(String),
    QrEncoding(String),
    CanvasOverflow(String),
    Render(String),
    PrinterBusy,
    Timeout,
    Hardware(HardwareFault),
    DeviceIo(String),
    Rejected(String),
}

impl FailureReason {
    /// Device-level failures that stop a run pending operator action.
    pub fn is_device_fault(&self) -> bool {
        matches!(self, FailureReason::Hardware(_) | FailureReason::DeviceIo(_))
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::InvalidRecord(reason) => write!(f, "invalid record: {}", reason),
            FailureReason::QrEncoding(reason) => write!(f, "QR encoding: {}", reason),
            FailureReason::CanvasOverflow(reason) => write!(f, "canvas overflow: {}", reason),
            FailureReason::Render(reason) => write!(f, "render: {}", reason),
            FailureReason::PrinterBusy => f.write_str("printer-busy"),
            FailureReason::Timeout => f.write_str("timeout"),
            FailureReason::Hardware(fault) => write!(f, "{}", fault),
            FailureReason::DeviceIo(reason) => write!(f, "device I/O: {}", reason),
            FailureReason::Rejected(reason) => write!(f, "rejected: {}", reason),
        }
    }
}

impl From<ComposeError> for FailureReason {
    fn from(e: ComposeError) -> Self {
        match e {
            ComposeError::InvalidRecord { reason, .. } => FailureReason::InvalidRecord(reason),
            ComposeError::QrEncoding { source, .. } => FailureReason::QrEncoding(source.to_string()),
        }
    }
}

impl From<RenderError> for FailureReason {
    fn from(e: RenderError) -> Self {
        match e {
            RenderError::CanvasOverflow { .. } | RenderError::QrTooWide { .. } => {
                FailureReason::CanvasOverflow(e.to_string())
            }
            other => FailureReason::Render(other.to_string()),
        }
    }
}

impl From<DeviceError> for FailureReason {
    fn from(e: DeviceError) -> Self {
        match e {
            DeviceError::Busy => FailureReason::PrinterBusy,
            DeviceError::Timeout(_) => FailureReason::Timeout,
            DeviceError::Hardware(fault) => FailureReason::Hardware(fault),
            DeviceError::Io(reason) => FailureReason::DeviceIo(reason),
            DeviceError::Rejected(reason) => FailureReason::Rejected(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum PrintStatus {
    Printed,
    Skipped,
    Failed(FailureReason),
}

/// Result for one ticket. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrintOutcome {
    pub ticket_id: String,
    #[serde(flatten)]
    pub status: PrintStatus,
    /// Submissions made to the device (0 if the ticket never reached it).
    pub attempts: u32,
    pub at: DateTime<Utc>,
}

impl PrintOutcome {
    pub fn printed(ticket_id: impl Into<String>, attempts: u32) -> Self {
        Self::new(ticket_id, PrintStatus::Printed, attempts)
    }

    pub fn skipped(ticket_id: impl Into<String>) -> Self {
        Self::new(ticket_id, PrintStatus::Skipped, 0)
    }

    pub fn failed(ticket_id: impl Into<String>, reason: FailureReason, attempts: u32) -> Self {
        Self::new(ticket_id, PrintStatus::Failed(reason), attempts)
    }

    fn new(ticket_id: impl Into<String>, status: PrintStatus, attempts: u32) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            status,
            attempts,
            at: Utc::now(),
        }
    }

    pub fn is_printed(&self) -> bool {
        self.status == PrintStatus::Printed
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.status {
            PrintStatus::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Why a run stopped early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Halt {
    pub ticket_id: String,
    pub reason: FailureReason,
}

/// Aggregate of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcomes: Vec<PrintOutcome>,
    /// Set when a device fault paused the run.
    pub halt: Option<Halt>,
    /// Set when the caller cancelled between tickets.
    pub cancelled: bool,
}

impl RunSummary {
    pub fn start() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            outcomes: Vec::new(),
            halt: None,
            cancelled: false,
        }
    }

    pub fn record(&mut self, outcome: PrintOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn printed(&self) -> usize {
        self.count(|s| matches!(s, PrintStatus::Printed))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, PrintStatus::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, PrintStatus::Skipped))
    }

    fn count(&self, pred: impl Fn(&PrintStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    pub fn is_halted(&self) -> bool {
        self.halt.is_some()
    }

    /// Tickets to retry after operator action: skipped ones and those lost
    /// to a device fault.
    pub fn pending_ids(&self) -> HashSet<&str> {
        self.outcomes
            .iter()
            .filter(|o| match &o.status {
                PrintStatus::Skipped => true,
                PrintStatus::Failed(reason) => reason.is_device_fault(),
                PrintStatus::Printed => false,
            })
            .map(|o| o.ticket_id.as_str())
            .collect()
    }

    /// `"N printed, M failed, K skipped"`.
    pub fn headline(&self) -> String {
        format!(
            "{} printed, {} failed, {} skipped",
            self.printed(),
            self.failed(),
            self.skipped()
        )
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.headline())?;
        for outcome in &self.outcomes {
            match &outcome.status {
                PrintStatus::Printed => writeln!(f, "  {}: printed", outcome.ticket_id)?,
                PrintStatus::Skipped => writeln!(f, "  {}: skipped", outcome.ticket_id)?,
                PrintStatus::Failed(reason) => {
                    writeln!(f, "  {}: failed ({})", outcome.ticket_id, reason)?
                }
            }
        }
        if let Some(halt) = &self.halt {
            writeln!(
                f,
                "Run halted at {}: {}. Resolve the printer and resume.",
                halt.ticket_id, halt.reason
            )?;
        }
        if self.cancelled {
            writeln!(f, "Run cancelled.")?;
        }
        Ok(())
    }
}
