//! # Ticket Records
//!
//! The immutable input of a print run. Records arrive already decoded from
//! the backend payload; this module only provides the types and a loader for
//! the CLI.
//!
//! ## JSON Shape
//!
//! Either a bare array or an object with a `tickets` key:
//!
//! ```json
//! { "tickets": [
//!   { "id": "A-1001",
//!     "items": [ { "label": "Adult", "value": "2 x 12.50" } ],
//!     "total_cents": 2500,
//!     "qr_payload": "https://example.com/t/A-1001",
//!     "footer": "thanks" }
//! ] }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading a ticket list.
#[derive(Debug, Error)]
pub enum TicketError {
    #[error("Invalid ticket JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read tickets: {0}")]
    Io(#[from] std::io::Error),

    #[error("Duplicate ticket id '{0}'")]
    DuplicateId(String),
}

/// One (label, value) row of a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub label: String,
    pub value: String,
}

impl LineItem {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// A single ticket to render and print.
///
/// ## Example
///
/// ```
/// use boleta::TicketRecord;
///
/// let record = TicketRecord::new("A-1001", "https://example.com/t/A-1001")
///     .item("Adult", "2 x 12.50")
///     .total_cents(2500)
///     .footer("thanks");
///
/// assert_eq!(record.items.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRecord {
    /// Unique within a run.
    pub id: String,
    #[serde(default)]
    pub items: Vec<LineItem>,
    /// Total amount in minor currency units.
    #[serde(default)]
    pub total_cents: i64,
    pub qr_payload: String,
    /// Key of a footer fragment supplied by the footer provider.
    #[serde(default)]
    pub footer: Option<String>,
}

impl TicketRecord {
    pub fn new(id: impl Into<String>, qr_payload: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            items: Vec::new(),
            total_cents: 0,
            qr_payload: qr_payload.into(),
            footer: None,
        }
    }

    pub fn item(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.items.push(LineItem::new(label, value));
        self
    }

    pub fn total_cents(mut self, cents: i64) -> Self {
        self.total_cents = cents;
        self
    }

    pub fn footer(mut self, key: impl Into<String>) -> Self {
        self.footer = Some(key.into());
        self
    }
}

/// Format minor units as `"$12.50"` / `"-$0.75"`.
pub fn format_amount(cents: i64, currency: &str) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}{}.{:02}", sign, currency, abs / 100, abs % 100)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TicketPayload {
    List(Vec<TicketRecord>),
    Wrapped { tickets: Vec<TicketRecord> },
}

/// Parse a ticket list from JSON, rejecting duplicate ids.
pub fn parse_tickets(json: &str) -> Result<Vec<TicketRecord>, TicketError> {
    let records = match serde_json::from_str::<TicketPayload>(json)? {
        TicketPayload::List(records) => records,
        TicketPayload::Wrapped { tickets } => tickets,
    };

    let mut seen = HashSet::new();
    for record in &records {
        if !seen.insert(record.id.as_str()) {
            return Err(TicketError::DuplicateId(record.id.clone()));
        }
    }

    Ok(records)
}

/// Read and parse a ticket list from a JSON file.
pub fn load_tickets(path: &Path) -> Result<Vec<TicketRecord>, TicketError> {
    let json = std::fs::read_to_string(path)?;
    parse_tickets(&json)
}
