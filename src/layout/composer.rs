//! Ticket record -> layout plan.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ComposeError;
use super::plan::{DrawOp, FooterFragment, LayoutPlan, TextLine};
use crate::qr::{QrEncoder, QrErrorLevel, QrcodeEncoder};
use crate::ticket::{TicketRecord, format_amount};

/// Composer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Maximum line items per ticket. Bounds canvas height.
    pub max_line_items: usize,
    pub qr_error_level: QrErrorLevel,
    /// Size of one QR module in dots.
    pub qr_module_px: u32,
    /// Prefix for the formatted total.
    pub currency: String,
    /// Optional banner printed above the ticket id.
    pub header: Option<String>,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            max_line_items: 40,
            qr_error_level: QrErrorLevel::M,
            qr_module_px: 4,
            currency: "$".to_string(),
            header: None,
        }
    }
}

/// Builds a [`LayoutPlan`] from a [`TicketRecord`].
///
/// Composition is a pure function of the record, the footer and the
/// configuration: the same inputs always produce the same plan.
///
/// ## Plan Shape
///
/// ```text
///   [header]             optional, bold
///   TICKET <id>          bold, 2x
///   ──────────────
///   label .... value     one per line item
///   ──────────────
///   TOTAL ..... $25.00   bold
///        ▄▄▄▄▄▄
///        █ QR █          centered
///        ▀▀▀▀▀▀
///   [footer fragment]
/// ```
pub struct Composer<E = QrcodeEncoder> {
    config: ComposerConfig,
    encoder: E,
}

impl Composer<QrcodeEncoder> {
    pub fn new(config: ComposerConfig) -> Self {
        Self::with_encoder(config, QrcodeEncoder)
    }
}

impl<E: QrEncoder> Composer<E> {
    pub fn with_encoder(config: ComposerConfig, encoder: E) -> Self {
        Self { config, encoder }
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    pub fn compose(
        &self,
        record: &TicketRecord,
        footer: Option<&FooterFragment>,
    ) -> Result<LayoutPlan, ComposeError> {
        self.validate(record)?;

        let matrix = self
            .encoder
            .encode(&record.qr_payload, self.config.qr_error_level)
            .map_err(|source| ComposeError::QrEncoding {
                ticket_id: record.id.clone(),
                source,
            })?
            .with_module_px(self.config.qr_module_px);

        let mut plan = LayoutPlan::new(&record.id);

        if let Some(header) = &self.config.header {
            plan.push(DrawOp::Text(TextLine::new(header).bold()));
        }
        plan.push(DrawOp::Text(
            TextLine::new(format!("TICKET {}", record.id)).bold().scale(2),
        ));
        plan.push(DrawOp::Rule { thickness: 2 });

        for item in &record.items {
            plan.push(DrawOp::Text(
                TextLine::new(&item.label).right(&item.value),
            ));
        }

        plan.push(DrawOp::Rule { thickness: 1 });
        plan.push(DrawOp::Text(
            TextLine::new("TOTAL")
                .right(format_amount(record.total_cents, &self.config.currency))
                .bold(),
        ));
        plan.push(DrawOp::Spacer { height: 8 });
        plan.push(DrawOp::Qr(matrix));

        if let Some(footer) = footer.filter(|f| !f.is_empty()) {
            plan.push(DrawOp::Footer(footer.clone()));
        }

        debug!(
            ticket_id = %record.id,
            ops = plan.ops().len(),
            "composed layout plan"
        );
        Ok(plan)
    }

    fn validate(&self, record: &TicketRecord) -> Result<(), ComposeError> {
        let invalid = |reason: String| ComposeError::InvalidRecord {
            ticket_id: record.id.clone(),
            reason,
        };

        if record.id.trim().is_empty() {
            return Err(invalid("empty ticket id".to_string()));
        }
        if record.qr_payload.is_empty() {
            return Err(invalid("empty QR payload".to_string()));
        }
        if record.items.len() > self.config.max_line_items {
            return Err(invalid(format!(
                "{} line items exceeds maximum of {}",
                record.items.len(),
                self.config.max_line_items
            )));
        }
        Ok(())
    }
}
