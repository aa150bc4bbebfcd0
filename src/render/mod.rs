//! # Raster Renderer
//!
//! Executes a [`LayoutPlan`] onto a freshly allocated [`TicketBitmap`].
//!
//! ## Layout Rules
//!
//! ```text
//!  ┌──────────────────────────────┐  ─┬─ margin_top
//!  │ TICKET A-1                   │   │  text: left-aligned at margin_x
//!  │                              │  ─┼─ line_pitch between operations
//!  │ ════════════════════════════ │   │  rule: full width inside margins
//!  │ Adult                  12.50 │   │  right column: right-aligned
//!  │                              │   │
//!  │           ██▀▀██             │   │  QR: centered, 4-module quiet zone
//!  │           ██▄▄██             │   │
//!  └──────────────────────────────┘  ─┴─ margin_bottom
//! ```
//!
//! Height is measured before any pixel buffer exists. If it does not fit
//! (the fixed height or the hardware maximum), rendering fails with
//! [`RenderError::CanvasOverflow`] and nothing is allocated.

mod bitmap;
mod font;

pub use bitmap::{BufferGauge, TicketBitmap};
pub use font::{GLYPH_HEIGHT, GLYPH_WIDTH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::layout::{DrawOp, LayoutPlan, TextLine};
use crate::qr::QrMatrix;
use font::Glyphs;

/// Quiet zone around QR codes, in modules.
pub const QR_QUIET_ZONE: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("ticket '{ticket_id}' needs {required} dots of height, limit is {limit}")]
    CanvasOverflow {
        ticket_id: String,
        required: u32,
        limit: u32,
    },

    #[error("ticket '{ticket_id}' QR code is {required} dots wide, canvas is {width}")]
    QrTooWide {
        ticket_id: String,
        required: u32,
        width: u32,
    },

    #[error("Font data could not be loaded")]
    Font,

    #[error("Image encoding error: {0}")]
    ImageEncode(String),
}

/// How the canvas height is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeightPolicy {
    /// Sum of operation heights plus margins.
    #[default]
    Computed,
    /// Always this many dots; content taller than this overflows.
    Fixed(u32),
}

/// Canvas geometry, in printer dots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: u32,
    pub height_policy: HeightPolicy,
    /// Hardware limit on a single raster image.
    pub max_height: u32,
    pub margin_x: u32,
    pub margin_top: u32,
    pub margin_bottom: u32,
    /// Vertical gap between consecutive operations.
    pub line_pitch: u32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 576,
            height_policy: HeightPolicy::Computed,
            max_height: 4000,
            margin_x: 8,
            margin_top: 16,
            margin_bottom: 32,
            line_pitch: 6,
        }
    }
}

impl CanvasConfig {
    /// Text columns available at the given scale.
    fn columns(&self, scale: u8) -> usize {
        let usable = self.width.saturating_sub(self.margin_x.saturating_mul(2)) as usize;
        (usable / (GLYPH_WIDTH * scale.max(1) as usize)).max(1)
    }
}

/// A text line broken into printable rows: `(left, right)`.
type Rows = Vec<(String, Option<String>)>;

pub struct Renderer {
    canvas: CanvasConfig,
    gauge: BufferGauge,
}

impl Renderer {
    pub fn new(canvas: CanvasConfig) -> Self {
        Self::with_gauge(canvas, BufferGauge::new())
    }

    /// Renderer whose bitmaps are counted by `gauge`.
    pub fn with_gauge(canvas: CanvasConfig, gauge: BufferGauge) -> Self {
        Self { canvas, gauge }
    }

    pub fn canvas(&self) -> &CanvasConfig {
        &self.canvas
    }

    pub fn gauge(&self) -> &BufferGauge {
        &self.gauge
    }

    /// Height in dots the plan needs under the computed policy.
    ///
    /// Saturates at `u32::MAX`, which is always over any limit.
    pub fn measure(&self, plan: &LayoutPlan) -> u32 {
        self.canvas
            .margin_top
            .saturating_add(self.ops_height(plan.ops()))
            .saturating_add(self.canvas.margin_bottom)
    }

    /// Render the plan. The plan is consumed.
    pub fn render(&self, plan: LayoutPlan) -> Result<TicketBitmap, RenderError> {
        let required = self.measure(&plan);
        let (ticket_id, ops) = plan.into_parts();

        let height = match self.canvas.height_policy {
            HeightPolicy::Computed if required > self.canvas.max_height => {
                return Err(RenderError::CanvasOverflow {
                    ticket_id,
                    required,
                    limit: self.canvas.max_height,
                });
            }
            HeightPolicy::Computed => required,
            HeightPolicy::Fixed(fixed) if required > fixed => {
                return Err(RenderError::CanvasOverflow {
                    ticket_id,
                    required,
                    limit: fixed,
                });
            }
            HeightPolicy::Fixed(fixed) => fixed,
        };

        for op in &ops {
            if let DrawOp::Qr(matrix) = op {
                let required = qr_block_width(matrix);
                if required > self.canvas.width {
                    return Err(RenderError::QrTooWide {
                        ticket_id,
                        required,
                        width: self.canvas.width,
                    });
                }
            }
        }

        let mut glyphs = Glyphs::default();
        let mut bitmap =
            TicketBitmap::allocate(&self.gauge, ticket_id, self.canvas.width, height);

        let mut y = self.canvas.margin_top;
        self.draw_ops(&mut bitmap, &mut glyphs, &ops, &mut y)?;

        debug!(
            ticket_id = bitmap.ticket_id(),
            width = bitmap.width(),
            height = bitmap.height(),
            "rendered ticket"
        );
        Ok(bitmap)
    }

    fn ops_height(&self, ops: &[DrawOp]) -> u32 {
        let gaps = u32::try_from(ops.len().saturating_sub(1))
            .unwrap_or(u32::MAX)
            .saturating_mul(self.canvas.line_pitch);
        ops.iter()
            .map(|op| self.op_height(op))
            .fold(gaps, u32::saturating_add)
    }

    fn op_height(&self, op: &DrawOp) -> u32 {
        match op {
            DrawOp::Text(line) => {
                let rows = u32::try_from(self.wrap(line).len()).unwrap_or(u32::MAX);
                rows.saturating_mul(GLYPH_HEIGHT as u32 * line.scale.max(1) as u32)
            }
            DrawOp::Qr(matrix) => qr_block_width(matrix),
            DrawOp::Rule { thickness } => *thickness,
            DrawOp::Spacer { height } => *height,
            DrawOp::Footer(fragment) => self.ops_height(fragment.ops()),
        }
    }

    fn draw_ops(
        &self,
        bitmap: &mut TicketBitmap,
        glyphs: &mut Glyphs,
        ops: &[DrawOp],
        y: &mut u32,
    ) -> Result<(), RenderError> {
        for (i, op) in ops.iter().enumerate() {
            if i > 0 {
                *y += self.canvas.line_pitch;
            }
            match op {
                DrawOp::Text(line) => self.draw_text(bitmap, glyphs, line, *y)?,
                DrawOp::Qr(matrix) => self.draw_qr(bitmap, matrix, *y),
                DrawOp::Rule { thickness } => self.draw_rule(bitmap, *thickness, *y),
                DrawOp::Spacer { .. } => {}
                DrawOp::Footer(fragment) => {
                    self.draw_ops(bitmap, glyphs, fragment.ops(), y)?;
                    continue;
                }
            }
            *y += self.op_height(op);
        }
        Ok(())
    }

    /// Break a text line into rows that fit the canvas.
    ///
    /// A right column that fits beside the text goes on the first row and
    /// the left text wraps below it at full width. A right column as wide as
    /// the canvas gets rows of its own after the left text, each right-aligned.
    fn wrap(&self, line: &TextLine) -> Rows {
        let columns = self.canvas.columns(line.scale);
        let chars: Vec<char> = line.left.chars().collect();
        let mut rows = Vec::new();

        let right: Vec<char> = match &line.right {
            Some(right) => right.chars().collect(),
            None => {
                push_chunks(&mut rows, &chars, columns);
                return rows;
            }
        };

        if right.len() < columns {
            let split = columns.saturating_sub(right.len() + 1).min(chars.len());
            rows.push((chars[..split].iter().collect(), Some(right.iter().collect())));
            for chunk in chars[split..].chunks(columns) {
                rows.push((chunk.iter().collect(), None));
            }
            return rows;
        }

        if !chars.is_empty() {
            push_chunks(&mut rows, &chars, columns);
        }
        for chunk in right.chunks(columns) {
            rows.push((String::new(), Some(chunk.iter().collect())));
        }
        rows
    }

    fn draw_text(
        &self,
        bitmap: &mut TicketBitmap,
        glyphs: &mut Glyphs,
        line: &TextLine,
        y: u32,
    ) -> Result<(), RenderError> {
        let scale = line.scale.max(1) as u32;
        let cell_w = GLYPH_WIDTH as u32 * scale;
        let row_h = GLYPH_HEIGHT as u32 * scale;
        let right_edge = self.canvas.width.saturating_sub(self.canvas.margin_x);

        for (row, (left, right)) in self.wrap(line).into_iter().enumerate() {
            let row_y = y + row as u32 * row_h;

            let mut x = self.canvas.margin_x;
            for ch in left.chars() {
                draw_glyph(bitmap, glyphs.get(ch)?, x, row_y, scale, line.bold);
                x += cell_w;
            }

            if let Some(right) = right {
                let mut x = right_edge.saturating_sub(right.chars().count() as u32 * cell_w);
                for ch in right.chars() {
                    draw_glyph(bitmap, glyphs.get(ch)?, x, row_y, scale, line.bold);
                    x += cell_w;
                }
            }
        }
        Ok(())
    }

    fn draw_rule(&self, bitmap: &mut TicketBitmap, thickness: u32, y: u32) {
        let end = self.canvas.width.saturating_sub(self.canvas.margin_x);
        for dy in 0..thickness {
            for x in self.canvas.margin_x..end {
                bitmap.set(x, y + dy, true);
            }
        }
    }

    fn draw_qr(&self, bitmap: &mut TicketBitmap, matrix: &QrMatrix, y: u32) {
        let module = matrix.module_px();
        let quiet = QR_QUIET_ZONE * module;
        let x0 = (self.canvas.width - matrix.pixel_size()) / 2;
        let y0 = y + quiet;

        for qy in 0..matrix.width() {
            for qx in 0..matrix.width() {
                if !matrix.is_dark(qx, qy) {
                    continue;
                }
                for cy in 0..module {
                    for cx in 0..module {
                        bitmap.set(
                            x0 + qx as u32 * module + cx,
                            y0 + qy as u32 * module + cy,
                            true,
                        );
                    }
                }
            }
        }
    }
}

/// Left-aligned rows of at most `columns` characters; at least one row.
fn push_chunks(rows: &mut Rows, chars: &[char], columns: usize) {
    if chars.is_empty() {
        rows.push((String::new(), None));
        return;
    }
    for chunk in chars.chunks(columns) {
        rows.push((chunk.iter().collect(), None));
    }
}

/// QR side length including quiet zone on both sides.
fn qr_block_width(matrix: &QrMatrix) -> u32 {
    matrix
        .module_px()
        .saturating_mul(2 * QR_QUIET_ZONE)
        .saturating_add(matrix.pixel_size())
}

/// Draw a glyph scaled by `scale`; bold is a second strike 1 dot right.
fn draw_glyph(bitmap: &mut TicketBitmap, glyph: &[bool], x: u32, y: u32, scale: u32, bold: bool) {
    for gy in 0..GLYPH_HEIGHT {
        for gx in 0..GLYPH_WIDTH {
            if !glyph.get(gy * GLYPH_WIDTH + gx).copied().unwrap_or(false) {
                continue;
            }
            for sy in 0..scale {
                for sx in 0..scale {
                    let px = x + gx as u32 * scale + sx;
                    let py = y + gy as u32 * scale + sy;
                    bitmap.set(px, py, true);
                    if bold {
                        bitmap.set(px + 1, py, true);
                    }
                }
            }
        }
    }
}
