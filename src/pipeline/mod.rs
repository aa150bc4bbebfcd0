//! # Ticket Pipeline
//!
//! Drives a list of tickets through compose, render and dispatch, one at a
//! time.
//!
//! ## Ticket States
//!
//! ```text
//! Pending ──► Composed ──► Rendered ──► Dispatched ──► Released
//!    │            │
//!    └────────────┴──► Aborted   (bad record, QR or canvas failure)
//! ```
//!
//! The next ticket is not composed until the current one is `Released` or
//! `Aborted`. Since the bitmap is created in `Rendered` and dropped in
//! `Released`, at most one bitmap is alive at any moment.
//!
//! ## Failures
//!
//! Per-ticket failures are recorded and the run moves on. A device fault
//! (under the default halt policy) stops the run: the failing ticket is
//! recorded as failed and every remaining ticket as skipped. Use
//! [`Pipeline::resume`] after the operator fixes the printer.
//!
//! ## Cancellation
//!
//! [`CancelToken`] is checked before each ticket starts, never mid-ticket.

mod worker;

pub use worker::{ProgressEvent, RunHandle, spawn_run};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, instrument, warn};

use crate::config::{ConfigError, RunConfig};
use crate::dispatch::{Directive, Dispatcher};
use crate::error::BoletaError;
use crate::layout::{Composer, FooterCatalog, FooterProvider};
use crate::outcome::{FailureReason, Halt, PrintOutcome, RunSummary};
use crate::printer::PrinterSink;
use crate::qr::{QrEncoder, QrcodeEncoder};
use crate::render::{BufferGauge, Renderer};
use crate::ticket::TicketRecord;

/// Lifecycle of one ticket within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketState {
    Pending,
    Composed,
    Rendered,
    Dispatched,
    Released,
    Aborted,
}

impl TicketState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TicketState::Released | TicketState::Aborted)
    }
}

/// Cooperative cancellation, honored between tickets.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The ticket orchestrator.
pub struct Pipeline<S: PrinterSink, E: QrEncoder = QrcodeEncoder, F: FooterProvider = FooterCatalog> {
    composer: Composer<E>,
    renderer: Renderer,
    dispatcher: Dispatcher<S>,
    footers: F,
    cancel: CancelToken,
    events: Option<UnboundedSender<ProgressEvent>>,
}

impl<S: PrinterSink> Pipeline<S> {
    /// Build a pipeline from a validated configuration.
    pub fn new(config: &RunConfig, sink: S) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            composer: Composer::new(config.composer.clone()),
            renderer: Renderer::new(config.canvas.clone()),
            dispatcher: Dispatcher::new(sink, config.dispatch.clone()),
            footers: config.footers.to_catalog(),
            cancel: CancelToken::new(),
            events: None,
        })
    }
}

impl<S: PrinterSink, E: QrEncoder, F: FooterProvider> Pipeline<S, E, F> {
    pub fn with_encoder<E2: QrEncoder>(self, encoder: E2) -> Pipeline<S, E2, F> {
        Pipeline {
            composer: Composer::with_encoder(self.composer.config().clone(), encoder),
            renderer: self.renderer,
            dispatcher: self.dispatcher,
            footers: self.footers,
            cancel: self.cancel,
            events: self.events,
        }
    }

    pub fn with_footers<F2: FooterProvider>(self, footers: F2) -> Pipeline<S, E, F2> {
        Pipeline {
            composer: self.composer,
            renderer: self.renderer,
            dispatcher: self.dispatcher,
            footers,
            cancel: self.cancel,
            events: self.events,
        }
    }

    /// Share an existing gauge, e.g. to observe buffers from a test.
    pub fn with_gauge(mut self, gauge: BufferGauge) -> Self {
        self.renderer = Renderer::with_gauge(self.renderer.canvas().clone(), gauge);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub(crate) fn set_events(&mut self, events: UnboundedSender<ProgressEvent>) {
        self.events = Some(events);
    }

    pub fn gauge(&self) -> &BufferGauge {
        self.renderer.gauge()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn sink(&self) -> &S {
        self.dispatcher.sink()
    }

    pub fn into_sink(self) -> S {
        self.dispatcher.into_sink()
    }

    /// Print `records` in order. Every record ends with exactly one outcome.
    #[instrument(skip_all, fields(tickets = records.len()))]
    pub fn run(&mut self, records: &[TicketRecord]) -> RunSummary {
        let mut summary = RunSummary::start();
        info!(run_id = %summary.run_id, "run started");
        self.emit(ProgressEvent::Started {
            run_id: summary.run_id,
            total: records.len(),
        });

        let mut remaining = records.iter().enumerate();
        while let Some((index, record)) = remaining.next() {
            if self.cancel.is_cancelled() {
                info!(ticket_id = %record.id, "run cancelled");
                summary.cancelled = true;
                self.skip(&mut summary, record);
                for (_, record) in remaining.by_ref() {
                    self.skip(&mut summary, record);
                }
                break;
            }

            debug_assert_eq!(self.gauge().live(), 0, "bitmap leaked across tickets");
            let (outcome, directive) = self.process(index, record);
            let halt = match (directive, outcome.failure()) {
                (Directive::Pause, Some(reason)) => Some(Halt {
                    ticket_id: record.id.clone(),
                    reason: reason.clone(),
                }),
                _ => None,
            };
            self.emit(ProgressEvent::TicketFinished(outcome.clone()));
            summary.record(outcome);

            if let Some(halt) = halt {
                warn!(ticket_id = %halt.ticket_id, reason = %halt.reason, "run halted");
                self.emit(ProgressEvent::Halted(halt.clone()));
                summary.halt = Some(halt);
                for (_, record) in remaining.by_ref() {
                    self.skip(&mut summary, record);
                }
                break;
            }
        }

        summary.finish();
        info!(
            run_id = %summary.run_id,
            printed = summary.printed(),
            failed = summary.failed(),
            skipped = summary.skipped(),
            peak_buffers = self.gauge().peak(),
            "run finished"
        );
        self.emit(ProgressEvent::Finished(summary.clone()));
        summary
    }

    /// Re-run the tickets a previous run left pending, in input order.
    pub fn resume(&mut self, records: &[TicketRecord], previous: &RunSummary) -> RunSummary {
        let pending = previous.pending_ids();
        let retry: Vec<TicketRecord> = records
            .iter()
            .filter(|record| pending.contains(record.id.as_str()))
            .cloned()
            .collect();
        info!(previous_run = %previous.run_id, pending = retry.len(), "resuming run");
        self.run(&retry)
    }

    #[instrument(skip(self, record), fields(ticket_id = %record.id))]
    fn process(&mut self, index: usize, record: &TicketRecord) -> (PrintOutcome, Directive) {
        let mut ticket = Progress::new(&record.id);

        let composed = self
            .footers
            .footer_for(index, record)
            .map_err(|unknown| unknown.for_ticket(&record.id))
            .and_then(|footer| self.composer.compose(record, footer));
        let plan = match composed {
            Ok(plan) => plan,
            Err(e) => return ticket.abort(e.into()),
        };
        ticket.advance(TicketState::Composed);

        let bitmap = match self.renderer.render(plan) {
            Ok(bitmap) => bitmap,
            Err(e) => return ticket.abort(e.into()),
        };
        ticket.advance(TicketState::Rendered);

        let dispatched = self.dispatcher.submit(&bitmap);
        ticket.advance(TicketState::Dispatched);

        bitmap.release();
        ticket.advance(TicketState::Released);

        (dispatched.outcome, dispatched.directive)
    }

    fn skip(&self, summary: &mut RunSummary, record: &TicketRecord) {
        let outcome = PrintOutcome::skipped(&record.id);
        self.emit(ProgressEvent::TicketFinished(outcome.clone()));
        summary.record(outcome);
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(events) = &self.events {
            // Receiver gone means nobody is watching; the run continues.
            let _ = events.send(event);
        }
    }
}

/// State tracker for the ticket in flight.
struct Progress<'a> {
    ticket_id: &'a str,
    state: TicketState,
}

impl<'a> Progress<'a> {
    fn new(ticket_id: &'a str) -> Self {
        Self {
            ticket_id,
            state: TicketState::Pending,
        }
    }

    fn advance(&mut self, next: TicketState) {
        debug!(from = ?self.state, to = ?next, "ticket state");
        self.state = next;
    }

    fn abort(mut self, reason: FailureReason) -> (PrintOutcome, Directive) {
        warn!(at = ?self.state, %reason, "ticket aborted");
        self.advance(TicketState::Aborted);
        (
            PrintOutcome::failed(self.ticket_id, reason, 0),
            Directive::Continue,
        )
    }
}

/// Print `records` against `sink` with `config`.
///
/// ```no_run
/// use boleta::{PngDirectory, RunConfig, TicketRecord, print_tickets};
///
/// let records = vec![TicketRecord::new("A-1", "https://example.com/t/A-1").total_cents(1250)];
/// let summary = print_tickets(&records, &RunConfig::default(), PngDirectory::new("out"))?;
/// println!("{}", summary.headline());
/// # Ok::<(), boleta::BoletaError>(())
/// ```
pub fn print_tickets<S: PrinterSink>(
    records: &[TicketRecord],
    config: &RunConfig,
    sink: S,
) -> Result<RunSummary, BoletaError> {
    let mut pipeline = Pipeline::new(config, sink)?;
    Ok(pipeline.run(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::{Ack, DeviceError, HardwareFault};
    use crate::render::TicketBitmap;
    use std::time::Duration;

    /// Records the ticket ids it prints; fails the ids listed in `fail`.
    #[derive(Default)]
    struct Recording {
        printed: Vec<String>,
        fail: Vec<(String, DeviceError)>,
        pending: Option<DeviceError>,
    }

    impl PrinterSink for Recording {
        type Handle = ();

        fn open(&mut self) -> Result<(), DeviceError> {
            Ok(())
        }

        fn write(&mut self, _: &mut (), bitmap: &TicketBitmap) -> Result<Ack, DeviceError> {
            self.pending = self
                .fail
                .iter()
                .find(|(id, _)| id == bitmap.ticket_id())
                .map(|(_, e)| e.clone());
            if self.pending.is_none() {
                self.printed.push(bitmap.ticket_id().to_string());
            }
            Ok(Ack { bytes: 0 })
        }

        fn await_completion(&mut self, _: &mut (), _: Ack, _: Duration) -> Result<(), DeviceError> {
            self.pending.take().map_or(Ok(()), Err)
        }

        fn close(&mut self, _: ()) {}
    }

    fn config() -> RunConfig {
        let mut config = RunConfig::default();
        config.dispatch.inter_print_delay_ms = 0;
        config
    }

    fn records(n: usize) -> Vec<TicketRecord> {
        (1..=n)
            .map(|i| TicketRecord::new(i.to_string(), format!("payload-{}", i)).total_cents(100))
            .collect()
    }

    #[test]
    fn test_prints_in_order() {
        let mut pipeline = Pipeline::new(&config(), Recording::default()).unwrap();
        let summary = pipeline.run(&records(4));
        assert_eq!(summary.printed(), 4);
        assert_eq!(pipeline.sink().printed, vec!["1", "2", "3", "4"]);
        assert_eq!(pipeline.gauge().peak(), 1);
        assert_eq!(pipeline.gauge().live(), 0);
    }

    #[test]
    fn test_device_fault_skips_rest() {
        let sink = Recording {
            fail: vec![("2".into(), DeviceError::Hardware(HardwareFault::PaperOut))],
            ..Default::default()
        };
        let mut pipeline = Pipeline::new(&config(), sink).unwrap();
        let summary = pipeline.run(&records(4));
        assert_eq!(summary.headline(), "1 printed, 1 failed, 2 skipped");
        let halt = summary.halt.unwrap();
        assert_eq!(halt.ticket_id, "2");
        assert_eq!(halt.reason, FailureReason::Hardware(HardwareFault::PaperOut));
    }

    #[test]
    fn test_cancel_before_start() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut pipeline = Pipeline::new(&config(), Recording::default())
            .unwrap()
            .with_cancel(cancel);
        let summary = pipeline.run(&records(2));
        assert!(summary.cancelled);
        assert_eq!(summary.skipped(), 2);
        assert_eq!(pipeline.gauge().allocated(), 0);
    }

    #[test]
    fn test_unknown_footer_is_invalid_record() {
        let mut pipeline = Pipeline::new(&config(), Recording::default()).unwrap();
        let records = vec![TicketRecord::new("1", "p").footer("nope")];
        let summary = pipeline.run(&records);
        assert!(matches!(
            summary.outcomes[0].failure(),
            Some(FailureReason::InvalidRecord(reason)) if reason.contains("nope")
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = config();
        config.canvas.width = 0;
        assert!(Pipeline::new(&config, Recording::default()).is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(TicketState::Released.is_terminal());
        assert!(TicketState::Aborted.is_terminal());
        assert!(!TicketState::Dispatched.is_terminal());
    }
}
