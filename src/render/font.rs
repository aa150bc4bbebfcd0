//! Glyph source for ticket text.
//!
//! Uses the Spleen 12x24 bitmap font, the same cell size as the printer's
//! native Font A, so rendered tickets match text-mode output.

use std::collections::HashMap;

use spleen_font::{FONT_12X24, PSF2Font};

use super::RenderError;

pub const GLYPH_WIDTH: usize = 12;
pub const GLYPH_HEIGHT: usize = 24;

/// Per-render glyph cache. Each glyph is `GLYPH_WIDTH * GLYPH_HEIGHT`
/// booleans, row-major.
#[derive(Default)]
pub(super) struct Glyphs {
    cache: HashMap<char, Vec<bool>>,
}

impl Glyphs {
    pub fn get(&mut self, ch: char) -> Result<&[bool], RenderError> {
        if !self.cache.contains_key(&ch) {
            let glyph = load_glyph(ch)?;
            self.cache.insert(ch, glyph);
        }
        Ok(self.cache.get(&ch).map(Vec::as_slice).unwrap_or(&[]))
    }
}

fn load_glyph(ch: char) -> Result<Vec<bool>, RenderError> {
    let mut glyph = vec![false; GLYPH_WIDTH * GLYPH_HEIGHT];
    if ch == ' ' {
        return Ok(glyph);
    }

    let mut spleen = PSF2Font::new(FONT_12X24).map_err(|_| RenderError::Font)?;
    let utf8 = ch.to_string();

    match spleen.glyph_for_utf8(utf8.as_bytes()) {
        Some(rows) => {
            for (row_y, row) in rows.enumerate() {
                for (col_x, on) in row.enumerate() {
                    if row_y < GLYPH_HEIGHT && col_x < GLYPH_WIDTH {
                        glyph[row_y * GLYPH_WIDTH + col_x] = on;
                    }
                }
            }
        }
        None => draw_box(&mut glyph),
    }

    Ok(glyph)
}

/// Outline box for characters missing from the font.
fn draw_box(glyph: &mut [bool]) {
    for x in 0..GLYPH_WIDTH {
        glyph[x] = true;
        glyph[(GLYPH_HEIGHT - 1) * GLYPH_WIDTH + x] = true;
    }
    for y in 0..GLYPH_HEIGHT {
        glyph[y * GLYPH_WIDTH] = true;
        glyph[y * GLYPH_WIDTH + GLYPH_WIDTH - 1] = true;
    }
}
