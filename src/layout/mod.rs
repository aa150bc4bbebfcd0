//! # Layout Composer
//!
//! Turns one [`TicketRecord`](crate::TicketRecord) into a [`LayoutPlan`]: an
//! ordered list of drawing operations the renderer executes top to bottom.
//!
//! ```text
//! TicketRecord ──► Composer ──► LayoutPlan ──► Renderer
//!                     │
//!                     ├── QrEncoder      (payload → QrMatrix)
//!                     └── FooterFragment (cached, optional)
//! ```
//!
//! Plans are ephemeral: the renderer consumes them by value and they are
//! gone once the bitmap exists.

mod composer;
mod footer;
mod plan;

pub use composer::{Composer, ComposerConfig};
pub use footer::{FooterCatalog, FooterProvider, NoFooter, UnknownFooter};
pub use plan::{DrawOp, FooterFragment, LayoutPlan, TextLine};

use crate::qr::EncodingError;
use thiserror::Error;

/// Composition failures. Both abort only the ticket concerned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    #[error("invalid record '{ticket_id}': {reason}")]
    InvalidRecord { ticket_id: String, reason: String },

    #[error("QR encoding failed for '{ticket_id}': {source}")]
    QrEncoding {
        ticket_id: String,
        #[source]
        source: EncodingError,
    },
}

impl UnknownFooter {
    /// Attribute the lookup failure to a ticket.
    pub fn for_ticket(self, ticket_id: &str) -> ComposeError {
        ComposeError::InvalidRecord {
            ticket_id: ticket_id.to_string(),
            reason: format!("unknown footer reference '{}'", self.0),
        }
    }
}
