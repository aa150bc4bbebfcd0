//! # QR Encoder
//!
//! The QR capability the layout composer delegates to. [`QrEncoder`] is the
//! seam; [`QrcodeEncoder`] backs it with the `qrcode` crate.
//!
//! ## Error Correction Levels
//!
//! | Level | Recovery | Capacity (bytes, v40) |
//! |-------|----------|-----------------------|
//! | L | ~7% | 2953 |
//! | M | ~15% | 2331 |
//! | Q | ~25% | 1663 |
//! | H | ~30% | 1273 |
//!
//! A payload that does not fit the chosen level fails with
//! [`EncodingError::DataTooLong`]; no partial matrix is ever produced.

use qrcode::types::QrError;
use qrcode::{Color, EcLevel, QrCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// QR error-correction level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QrErrorLevel {
    L,
    #[default]
    M,
    Q,
    H,
}

impl From<QrErrorLevel> for EcLevel {
    fn from(level: QrErrorLevel) -> Self {
        match level {
            QrErrorLevel::L => EcLevel::L,
            QrErrorLevel::M => EcLevel::M,
            QrErrorLevel::Q => EcLevel::Q,
            QrErrorLevel::H => EcLevel::H,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("payload of {len} bytes is too long for error correction level {level:?}")]
    DataTooLong { len: usize, level: QrErrorLevel },

    #[error("QR encoding failed: {0}")]
    Other(String),
}

/// Square grid of QR modules plus the size of one module in dots.
///
/// Modules are stored row-major, `true` = dark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrMatrix {
    width: usize,
    modules: Vec<bool>,
    module_px: u32,
}

impl QrMatrix {
    pub fn new(width: usize, modules: Vec<bool>, module_px: u32) -> Self {
        debug_assert_eq!(modules.len(), width * width, "QR matrix must be square");
        Self {
            width,
            modules,
            module_px: module_px.max(1),
        }
    }

    /// Same matrix, drawn at a different module size.
    pub fn with_module_px(mut self, module_px: u32) -> Self {
        self.module_px = module_px.max(1);
        self
    }

    /// Modules per side.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn module_px(&self) -> u32 {
        self.module_px
    }

    /// Side length in dots, without quiet zone.
    pub fn pixel_size(&self) -> u32 {
        self.width as u32 * self.module_px
    }

    #[inline]
    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.width && self.modules[y * self.width + x]
    }
}

/// Capability: payload string -> module matrix.
pub trait QrEncoder {
    fn encode(&self, payload: &str, level: QrErrorLevel) -> Result<QrMatrix, EncodingError>;
}

/// [`QrEncoder`] backed by the `qrcode` crate. Returns matrices with a
/// module size of 1; the composer scales them.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrcodeEncoder;

impl QrEncoder for QrcodeEncoder {
    fn encode(&self, payload: &str, level: QrErrorLevel) -> Result<QrMatrix, EncodingError> {
        let code = QrCode::with_error_correction_level(payload.as_bytes(), level.into())
            .map_err(|e| match e {
                QrError::DataTooLong => EncodingError::DataTooLong {
                    len: payload.len(),
                    level,
                },
                other => EncodingError::Other(other.to_string()),
            })?;

        let width = code.width();
        let modules = code
            .to_colors()
            .into_iter()
            .map(|color| color == Color::Dark)
            .collect();

        Ok(QrMatrix::new(width, modules, 1))
    }
}
