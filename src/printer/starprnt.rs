//! # StarPRNT Raster Encoding
//!
//! Converts a [`TicketBitmap`] into the byte stream a Star printer expects:
//!
//! ```text
//! ESC @                         initialize
//! ESC GS S 1 xL xH yL yH 0 d…   raster chunk (≤ max_chunk_rows rows)
//! ESC GS S …                    … repeated until the bitmap is exhausted
//! ESC d 2                       feed to cutter, full cut
//! ```
//!
//! Dots are packed 8 per byte, MSB = leftmost, 1 = black. Bitmaps narrower
//! than the print head are centered; wider ones are rejected.

use super::{DeviceError, PrinterProfile};
use crate::render::TicketBitmap;

pub const ESC: u8 = 0x1B;
pub const GS: u8 = 0x1D;

/// Initialize printer (ESC @).
#[inline]
pub fn init() -> Vec<u8> {
    vec![ESC, b'@']
}

/// Feed to cut position, then full cut (ESC d 2).
#[inline]
pub fn cut_full_feed() -> Vec<u8> {
    vec![ESC, b'd', 2]
}

/// 16-bit little-endian, as used by raster dimensions.
#[inline]
pub const fn u16_le(value: u16) -> [u8; 2] {
    [value as u8, (value >> 8) as u8]
}

/// Raster graphics command (ESC GS S m xL xH yL yH n d1...dk).
///
/// `data` must be exactly `width_bytes * height` bytes.
pub fn raster(width_bytes: u16, height: u16, data: &[u8]) -> Vec<u8> {
    debug_assert_eq!(
        data.len(),
        width_bytes as usize * height as usize,
        "raster data length mismatch"
    );

    let [xl, xh] = u16_le(width_bytes);
    let [yl, yh] = u16_le(height);

    let mut cmd = Vec::with_capacity(9 + data.len());
    cmd.extend_from_slice(&[ESC, GS, b'S', 1, xl, xh, yl, yh, 0]);
    cmd.extend_from_slice(data);
    cmd
}

/// Pack `bitmap` at the profile's head width, centering narrower bitmaps.
pub fn pack_for_head(
    bitmap: &TicketBitmap,
    profile: &PrinterProfile,
) -> Result<Vec<u8>, DeviceError> {
    let head = profile.width_dots as u32;
    if bitmap.width() > head {
        return Err(DeviceError::Rejected(format!(
            "bitmap is {} dots wide, {} prints {}",
            bitmap.width(),
            profile.name,
            head
        )));
    }

    if bitmap.width() == head {
        return Ok(bitmap.pack_rows());
    }

    let offset = (head - bitmap.width()) / 2;
    let width_bytes = profile.width_bytes() as usize;
    let mut data = vec![0u8; width_bytes * bitmap.height() as usize];

    for y in 0..bitmap.height() {
        for x in 0..bitmap.width() {
            if bitmap.is_black(x, y) {
                let hx = (x + offset) as usize;
                data[y as usize * width_bytes + hx / 8] |= 1 << (7 - (hx % 8));
            }
        }
    }
    Ok(data)
}

/// Full print job for one ticket: init, chunked raster, cut.
pub fn encode_ticket(
    bitmap: &TicketBitmap,
    profile: &PrinterProfile,
) -> Result<Vec<u8>, DeviceError> {
    let packed = pack_for_head(bitmap, profile)?;
    let width_bytes = profile.width_bytes();
    let row_len = width_bytes as usize;
    let chunk_rows = profile.max_chunk_rows.max(1) as usize;

    let mut job = init();
    for chunk in packed.chunks(row_len * chunk_rows) {
        let rows = (chunk.len() / row_len) as u16;
        job.extend(raster(width_bytes, rows, chunk));
    }
    job.extend(cut_full_feed());
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{DrawOp, LayoutPlan};
    use crate::render::{CanvasConfig, HeightPolicy, Renderer};

    fn ruled_bitmap(width: u32, height: u32) -> TicketBitmap {
        let canvas = CanvasConfig {
            width,
            height_policy: HeightPolicy::Fixed(height),
            margin_x: 0,
            margin_top: 0,
            margin_bottom: 0,
            ..Default::default()
        };
        let mut plan = LayoutPlan::new("t");
        plan.push(DrawOp::Rule { thickness: 1 });
        Renderer::new(canvas).render(plan).unwrap()
    }

    #[test]
    fn test_raster_header() {
        let data = vec![0xFF; 72 * 300];
        let cmd = raster(72, 300, &data);
        // 300 = 0x012C
        assert_eq!(&cmd[..9], &[0x1B, 0x1D, 0x53, 1, 72, 0, 0x2C, 0x01, 0]);
        assert_eq!(cmd.len(), 9 + data.len());
    }

    #[test]
    fn test_encode_chunks_rows() {
        let bitmap = ruled_bitmap(576, 300);
        let job = encode_ticket(&bitmap, &PrinterProfile::TSP650II).unwrap();

        assert_eq!(&job[..2], &[ESC, b'@']);
        assert_eq!(&job[job.len() - 3..], &[ESC, b'd', 2]);

        // 256-row chunk then 44-row chunk
        let first = &job[2..11];
        assert_eq!(first, &[ESC, GS, b'S', 1, 72, 0, 0, 1, 0]);
        let second_at = 2 + 9 + 72 * 256;
        assert_eq!(&job[second_at..second_at + 9], &[ESC, GS, b'S', 1, 72, 0, 44, 0, 0]);
        assert_eq!(job.len(), 2 + (9 + 72 * 256) + (9 + 72 * 44) + 3);
    }

    #[test]
    fn test_narrow_bitmap_is_centered() {
        let bitmap = ruled_bitmap(560, 1);
        let packed = pack_for_head(&bitmap, &PrinterProfile::TSP650II).unwrap();
        assert_eq!(packed.len(), 72);
        // 8-dot offset on each side
        assert_eq!(packed[0], 0x00);
        assert_eq!(packed[1], 0xFF);
        assert_eq!(packed[70], 0xFF);
        assert_eq!(packed[71], 0x00);
    }

    #[test]
    fn test_wide_bitmap_rejected() {
        let bitmap = ruled_bitmap(576, 1);
        let err = pack_for_head(&bitmap, &PrinterProfile::SM_L200).unwrap_err();
        assert!(matches!(err, DeviceError::Rejected(_)));
    }
}
