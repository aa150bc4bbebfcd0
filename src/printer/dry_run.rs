//! Sink that encodes print jobs and throws them away.

use std::time::Duration;

use tracing::info;

use super::{Ack, DeviceError, PrinterProfile, PrinterSink, starprnt};
use crate::render::TicketBitmap;

/// Encodes each ticket as it would be sent to `profile`, then discards it.
/// Catches bitmaps the printer would reject without touching a device.
#[derive(Debug, Clone, Default)]
pub struct DryRun {
    profile: PrinterProfile,
    jobs: usize,
    bytes: usize,
}

impl DryRun {
    pub fn new(profile: PrinterProfile) -> Self {
        Self {
            profile,
            jobs: 0,
            bytes: 0,
        }
    }

    /// Jobs encoded so far.
    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Total bytes that would have been sent.
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl PrinterSink for DryRun {
    type Handle = ();

    fn open(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn write(&mut self, _handle: &mut (), bitmap: &TicketBitmap) -> Result<Ack, DeviceError> {
        let job = starprnt::encode_ticket(bitmap, &self.profile)?;
        self.jobs += 1;
        self.bytes += job.len();
        info!(
            ticket_id = bitmap.ticket_id(),
            bytes = job.len(),
            height = bitmap.height(),
            "dry run: job encoded"
        );
        Ok(Ack { bytes: job.len() })
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{DrawOp, LayoutPlan};
    use crate::render::{CanvasConfig, Renderer};

    #[test]
    fn test_counts_jobs() {
        let mut plan = LayoutPlan::new("dry");
        plan.push(DrawOp::Spacer { height: 10 });
        let bitmap = Renderer::new(CanvasConfig::default()).render(plan).unwrap();

        let mut sink = DryRun::new(PrinterProfile::TSP650II);
        let ack = sink.write(&mut (), &bitmap).unwrap();
        assert_eq!(sink.jobs(), 1);
        assert_eq!(sink.bytes(), ack.bytes);
    }

    #[test]
    fn test_rejects_wide_bitmap() {
        let mut plan = LayoutPlan::new("wide");
        plan.push(DrawOp::Spacer { height: 10 });
        let bitmap = Renderer::new(CanvasConfig::default()).render(plan).unwrap();

        let mut sink = DryRun::new(PrinterProfile::SM_L200);
        assert!(matches!(
            sink.write(&mut (), &bitmap),
            Err(DeviceError::Rejected(_))
        ));
    }
}
