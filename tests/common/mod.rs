//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use boleta::printer::{Ack, DeviceError};
use boleta::{BufferGauge, CancelToken, PrinterSink, RunConfig, TicketBitmap, TicketRecord};

/// What the mock printer saw.
#[derive(Debug, Default)]
pub struct SinkLog {
    /// Ticket id of every submission, in order (retries included).
    pub submissions: Vec<String>,
    /// Live bitmap count at each submission.
    pub live_buffers: Vec<usize>,
    /// Bitmap height at each submission.
    pub heights: Vec<u32>,
    pub opens: usize,
    pub closes: usize,
}

impl SinkLog {
    pub fn attempts_for(&self, ticket_id: &str) -> usize {
        self.submissions.iter().filter(|id| *id == ticket_id).count()
    }
}

/// Scripted printer. Completion succeeds unless a failure is queued for the
/// ticket being printed; queued failures are consumed one per submission.
#[derive(Clone, Default)]
pub struct MockSink {
    script: Arc<Mutex<HashMap<String, VecDeque<DeviceError>>>>,
    log: Arc<Mutex<SinkLog>>,
    gauge: Option<BufferGauge>,
    cancel_after_first: Option<CancelToken>,
    pending: Option<DeviceError>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `error` for the next submission of `ticket_id`.
    pub fn fail(self, ticket_id: &str, error: DeviceError) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry(ticket_id.to_string())
            .or_default()
            .push_back(error);
        self
    }

    /// Record the live bitmap count at each submission.
    pub fn watch(mut self, gauge: &BufferGauge) -> Self {
        self.gauge = Some(gauge.clone());
        self
    }

    /// Cancel `token` while the first ticket is being printed.
    pub fn cancel_during_first(mut self, token: &CancelToken) -> Self {
        self.cancel_after_first = Some(token.clone());
        self
    }

    /// Drop any failures still queued (the operator fixed the printer).
    pub fn repair(&self) {
        self.script.lock().unwrap().clear();
    }

    pub fn log(&self) -> MutexGuard<'_, SinkLog> {
        self.log.lock().unwrap()
    }
}

impl PrinterSink for MockSink {
    type Handle = ();

    fn open(&mut self) -> Result<(), DeviceError> {
        self.log().opens += 1;
        Ok(())
    }

    fn write(&mut self, _handle: &mut (), bitmap: &TicketBitmap) -> Result<Ack, DeviceError> {
        let live = self.gauge.as_ref().map_or(0, |g| g.live());
        {
            let mut log = self.log();
            log.submissions.push(bitmap.ticket_id().to_string());
            log.live_buffers.push(live);
            log.heights.push(bitmap.height());
        }
        if let Some(token) = self.cancel_after_first.take() {
            token.cancel();
        }
        self.pending = self
            .script
            .lock()
            .unwrap()
            .get_mut(bitmap.ticket_id())
            .and_then(|queue| queue.pop_front());
        Ok(Ack {
            bytes: bitmap.pixels().len(),
        })
    }

    fn await_completion(
        &mut self,
        _handle: &mut (),
        _ack: Ack,
        _timeout: Duration,
    ) -> Result<(), DeviceError> {
        match self.pending.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn close(&mut self, _handle: ()) {
        self.log().closes += 1;
    }
}

/// Config with pacing off.
pub fn test_config() -> RunConfig {
    let mut config = RunConfig::default();
    config.dispatch.inter_print_delay_ms = 0;
    config
}

pub fn ticket(id: &str) -> TicketRecord {
    TicketRecord::new(id, format!("https://tickets.example.com/{}", id))
        .item("Adult", "2 x 12.50")
        .item("Child", "1 x 7.00")
        .total_cents(3200)
}

pub fn tickets(ids: &[&str]) -> Vec<TicketRecord> {
    ids.iter().map(|id| ticket(id)).collect()
}
