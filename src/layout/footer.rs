//! Footer providers.
//!
//! A provider hands the composer a cached [`FooterFragment`] for a ticket.
//! The composer never builds footers itself.

use std::collections::HashMap;

use super::plan::FooterFragment;
use crate::ticket::TicketRecord;

/// Lookup failure: the record names a footer the provider doesn't know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFooter(pub String);

/// Supplies the footer for the ticket at `index` (0-based position in the run).
pub trait FooterProvider {
    fn footer_for(
        &self,
        index: usize,
        record: &TicketRecord,
    ) -> Result<Option<&FooterFragment>, UnknownFooter>;
}

/// Provider that never appends a footer. Footer references on records are
/// ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFooter;

impl FooterProvider for NoFooter {
    fn footer_for(
        &self,
        _index: usize,
        _record: &TicketRecord,
    ) -> Result<Option<&FooterFragment>, UnknownFooter> {
        Ok(None)
    }
}

/// Named fragments plus an optional default applied every N tickets.
///
/// A record's own footer reference always wins over the default.
///
/// ```
/// use boleta::layout::{FooterCatalog, FooterFragment, FooterProvider};
/// use boleta::TicketRecord;
///
/// let catalog = FooterCatalog::new()
///     .named("vip", FooterFragment::new().bold_text("VIP ACCESS"))
///     .default_every(FooterFragment::new().text("Thanks!"), 2);
///
/// let plain = TicketRecord::new("1", "p");
/// assert!(catalog.footer_for(0, &plain).unwrap().is_none());
/// assert!(catalog.footer_for(1, &plain).unwrap().is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct FooterCatalog {
    named: HashMap<String, FooterFragment>,
    default: Option<(FooterFragment, usize)>,
}

impl FooterCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(mut self, key: impl Into<String>, fragment: FooterFragment) -> Self {
        self.named.insert(key.into(), fragment);
        self
    }

    /// Append `fragment` to every ticket.
    pub fn default_footer(self, fragment: FooterFragment) -> Self {
        self.default_every(fragment, 1)
    }

    /// Append `fragment` to every `every`-th ticket (the Nth, 2Nth, ...).
    pub fn default_every(mut self, fragment: FooterFragment, every: usize) -> Self {
        self.default = Some((fragment, every.max(1)));
        self
    }
}

impl FooterProvider for FooterCatalog {
    fn footer_for(
        &self,
        index: usize,
        record: &TicketRecord,
    ) -> Result<Option<&FooterFragment>, UnknownFooter> {
        if let Some(key) = &record.footer {
            return self
                .named
                .get(key)
                .map(Some)
                .ok_or_else(|| UnknownFooter(key.clone()));
        }

        Ok(match &self.default {
            Some((fragment, every)) if (index + 1) % every == 0 => Some(fragment),
            _ => None,
        })
    }
}
