//! Drawing plan types.

use crate::qr::QrMatrix;

/// One line of text. `left` is left-aligned; `right`, when present, is
/// right-aligned on the first row of the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLine {
    pub left: String,
    pub right: Option<String>,
    pub bold: bool,
    /// Integer magnification (1 = native glyph size).
    pub scale: u8,
}

impl TextLine {
    pub fn new(left: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: None,
            bold: false,
            scale: 1,
        }
    }

    pub fn right(mut self, right: impl Into<String>) -> Self {
        self.right = Some(right.into());
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn scale(mut self, scale: u8) -> Self {
        self.scale = scale.clamp(1, 4);
        self
    }
}

/// A single drawing operation. Operations are laid out top to bottom in
/// plan order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawOp {
    Text(TextLine),
    /// Horizontally centered QR block. The matrix is owned by the plan.
    Qr(QrMatrix),
    /// Full-width horizontal rule.
    Rule { thickness: u32 },
    /// Vertical whitespace in dots.
    Spacer { height: u32 },
    Footer(FooterFragment),
}

/// A reusable block appended at the bottom of a ticket.
///
/// Fragments hold only text, rules and spacers, so they cannot nest.
///
/// ```
/// use boleta::layout::FooterFragment;
///
/// let footer = FooterFragment::new()
///     .rule()
///     .text("Thank you for riding!")
///     .text("Keep this ticket until the end of the trip");
/// assert_eq!(footer.ops().len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FooterFragment {
    ops: Vec<DrawOp>,
}

impl FooterFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, content: impl Into<String>) -> Self {
        self.ops.push(DrawOp::Text(TextLine::new(content)));
        self
    }

    pub fn bold_text(mut self, content: impl Into<String>) -> Self {
        self.ops.push(DrawOp::Text(TextLine::new(content).bold()));
        self
    }

    pub fn rule(mut self) -> Self {
        self.ops.push(DrawOp::Rule { thickness: 1 });
        self
    }

    pub fn spacer(mut self, height: u32) -> Self {
        self.ops.push(DrawOp::Spacer { height });
        self
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Declarative description of one ticket, consumed by the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutPlan {
    ticket_id: String,
    ops: Vec<DrawOp>,
}

impl LayoutPlan {
    pub fn new(ticket_id: impl Into<String>) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            ops: Vec::new(),
        }
    }

    pub fn push(&mut self, op: DrawOp) {
        self.ops.push(op);
    }

    pub fn ticket_id(&self) -> &str {
        &self.ticket_id
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Split into id and operations.
    pub fn into_parts(self) -> (String, Vec<DrawOp>) {
        (self.ticket_id, self.ops)
    }
}
