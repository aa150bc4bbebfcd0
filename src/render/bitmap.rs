//! Ticket bitmaps and live-buffer accounting.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{GrayImage, ImageEncoder, Luma};
use tracing::trace;

use super::RenderError;

#[derive(Debug, Default)]
struct GaugeInner {
    live: AtomicUsize,
    peak: AtomicUsize,
    allocated: AtomicUsize,
}

/// Counts live [`TicketBitmap`]s.
///
/// Every bitmap holds a lease on the gauge from allocation until drop, so
/// `live()` is exactly the number of pixel buffers currently in memory.
/// Clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct BufferGauge {
    inner: Arc<GaugeInner>,
}

impl BufferGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bitmaps allocated and not yet released.
    pub fn live(&self) -> usize {
        self.inner.live.load(Ordering::SeqCst)
    }

    /// Highest `live()` value ever observed.
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }

    /// Total bitmaps allocated over the gauge's lifetime.
    pub fn allocated(&self) -> usize {
        self.inner.allocated.load(Ordering::SeqCst)
    }

    fn acquire(&self) -> BufferLease {
        let live = self.inner.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(live, Ordering::SeqCst);
        self.inner.allocated.fetch_add(1, Ordering::SeqCst);
        BufferLease {
            gauge: self.clone(),
        }
    }
}

#[derive(Debug)]
struct BufferLease {
    gauge: BufferGauge,
}

impl Drop for BufferLease {
    fn drop(&mut self) {
        self.gauge.inner.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A rendered ticket: one byte per dot, `1` = black, row-major.
///
/// Not `Clone`: a bitmap is moved through the pipeline and freed once,
/// either by [`release`](Self::release) or by going out of scope.
#[derive(Debug)]
pub struct TicketBitmap {
    ticket_id: String,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    _lease: BufferLease,
}

impl TicketBitmap {
    pub(super) fn allocate(
        gauge: &BufferGauge,
        ticket_id: String,
        width: u32,
        height: u32,
    ) -> Self {
        let lease = gauge.acquire();
        trace!(%ticket_id, width, height, "allocated ticket bitmap");
        Self {
            ticket_id,
            width,
            height,
            pixels: vec![0u8; width as usize * height as usize],
            _lease: lease,
        }
    }

    pub fn ticket_id(&self) -> &str {
        &self.ticket_id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn is_black(&self, x: u32, y: u32) -> bool {
        x < self.width
            && y < self.height
            && self.pixels[y as usize * self.width as usize + x as usize] != 0
    }

    /// Number of black dots.
    pub fn ink(&self) -> usize {
        self.pixels.iter().filter(|&&p| p != 0).count()
    }

    /// Set a dot. Out-of-bounds writes are ignored.
    #[inline]
    pub(super) fn set(&mut self, x: u32, y: u32, black: bool) {
        if x < self.width && y < self.height {
            self.pixels[y as usize * self.width as usize + x as usize] = black as u8;
        }
    }

    /// Pack into 1 bit per dot, MSB = leftmost, rows padded to whole bytes.
    pub fn pack_rows(&self) -> Vec<u8> {
        let width = self.width as usize;
        let width_bytes = width.div_ceil(8);
        let mut data = vec![0u8; width_bytes * self.height as usize];

        for (y, row) in self.pixels.chunks(width).enumerate() {
            for (x, &p) in row.iter().enumerate() {
                if p != 0 {
                    data[y * width_bytes + x / 8] |= 1 << (7 - (x % 8));
                }
            }
        }
        data
    }

    /// Grayscale copy (black = 0, white = 255).
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([if self.is_black(x, y) { 0u8 } else { 255u8 }])
        })
    }

    /// Encode as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>, RenderError> {
        let img = self.to_gray_image();
        let mut png_bytes = Vec::new();
        image::codecs::png::PngEncoder::new(&mut png_bytes)
            .write_image(
                img.as_raw(),
                self.width,
                self.height,
                image::ExtendedColorType::L8,
            )
            .map_err(|e| RenderError::ImageEncode(e.to_string()))?;
        Ok(png_bytes)
    }

    /// Free the pixel buffer.
    pub fn release(self) {
        trace!(ticket_id = %self.ticket_id, "released ticket bitmap");
    }
}
