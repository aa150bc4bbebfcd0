//! Printer hardware profiles.
//!
//! | Model | Paper | Width (dots) | Resolution | Raster chunk |
//! |-------|-------|--------------|------------|--------------|
//! | TSP650II | 80mm | 576 | 203 DPI | 256 rows |
//! | SM-L200 | 58mm | 384 | 203 DPI | 128 rows |
//!
//! ```text
//! dots_per_mm = dpi / 25.4 ≈ 8 at 203 DPI
//! TSP650II printable width = 576 / 8 = 72mm
//! ```

/// Hardware characteristics of a thermal printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrinterProfile {
    pub name: &'static str,
    /// Print head width in dots.
    pub width_dots: u16,
    pub dpi: u16,
    /// Rows per raster command, bounded by the device's receive buffer.
    pub max_chunk_rows: u16,
}

impl PrinterProfile {
    /// Star TSP650II, 80mm paper.
    pub const TSP650II: Self = Self {
        name: "Star TSP650II",
        width_dots: 576,
        dpi: 203,
        max_chunk_rows: 256,
    };

    /// Star SM-L200 mobile printer, 58mm paper.
    pub const SM_L200: Self = Self {
        name: "Star SM-L200",
        width_dots: 384,
        dpi: 203,
        max_chunk_rows: 128,
    };

    /// Look up a built-in profile by short name (`tsp650ii`, `sm-l200`).
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "tsp650ii" => Some(Self::TSP650II),
            "sm-l200" | "sml200" => Some(Self::SM_L200),
            _ => None,
        }
    }

    /// Bytes per packed raster row.
    #[inline]
    pub fn width_bytes(&self) -> u16 {
        self.width_dots.div_ceil(8)
    }

    #[inline]
    pub fn dots_per_mm(&self) -> f32 {
        self.dpi as f32 / 25.4
    }

    #[inline]
    pub fn mm_to_dots(&self, mm: f32) -> u32 {
        (mm * self.dots_per_mm()).round() as u32
    }
}

impl Default for PrinterProfile {
    fn default() -> Self {
        Self::TSP650II
    }
}
