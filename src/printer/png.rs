//! PNG directory sink for dry runs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::info;

use super::{Ack, DeviceError, PrinterSink};
use crate::render::TicketBitmap;

/// Writes each ticket to `<dir>/<ticket id>.png` instead of printing.
#[derive(Debug, Clone)]
pub struct PngDirectory {
    dir: PathBuf,
}

impl PngDirectory {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Output path for a ticket. Characters outside `[A-Za-z0-9_-]` become `_`
    /// and a short hash of the raw id is appended, so ids that only differ in
    /// replaced characters (`A/1`, `A_1`) never share a file.
    pub fn path_for(&self, ticket_id: &str) -> PathBuf {
        let mut name: String = ticket_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if name != ticket_id {
            let hash = format!("{:x}", Sha256::digest(ticket_id.as_bytes()));
            name.push('-');
            name.push_str(&hash[..8]);
        }
        self.dir.join(format!("{}.png", name))
    }
}

impl PrinterSink for PngDirectory {
    type Handle = ();

    fn open(&mut self) -> Result<(), DeviceError> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    fn write(&mut self, _handle: &mut (), bitmap: &TicketBitmap) -> Result<Ack, DeviceError> {
        let png = bitmap
            .to_png()
            .map_err(|e| DeviceError::Io(e.to_string()))?;
        let path = self.path_for(bitmap.ticket_id());
        std::fs::write(&path, &png)?;
        info!(path = %path.display(), "wrote ticket preview");
        Ok(Ack { bytes: png.len() })
    }

    fn await_completion(
        &mut self,
        _handle: &mut (),
        _ack: Ack,
        _timeout: Duration,
    ) -> Result<(), DeviceError> {
        Ok(())
    }

    fn close(&mut self, _handle: ()) {}
}
