//! Background runs.
//!
//! Rendering is CPU-bound and dispatch blocks on device I/O, so a run goes
//! to tokio's blocking pool. The caller keeps a [`RunHandle`] to watch
//! progress, cancel between tickets, and collect the summary.

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{CancelToken, Pipeline};
use crate::error::BoletaError;
use crate::layout::FooterProvider;
use crate::outcome::{Halt, PrintOutcome, RunSummary};
use crate::printer::PrinterSink;
use crate::qr::QrEncoder;
use crate::ticket::TicketRecord;

/// Progress notifications, in run order.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Started { run_id: Uuid, total: usize },
    TicketFinished(PrintOutcome),
    Halted(Halt),
    Finished(RunSummary),
}

pub struct RunHandle {
    events: UnboundedReceiver<ProgressEvent>,
    cancel: CancelToken,
    task: JoinHandle<RunSummary>,
}

impl RunHandle {
    /// Next progress event, or `None` once the run is over and drained.
    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        self.events.recv().await
    }

    /// Stop before the next ticket. The ticket in flight completes.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Wait for the run to finish.
    pub async fn join(self) -> Result<RunSummary, BoletaError> {
        self.task
            .await
            .map_err(|e| BoletaError::Worker(e.to_string()))
    }
}

/// Run `records` through `pipeline` on the blocking pool.
///
/// Must be called from within a tokio runtime.
pub fn spawn_run<S, E, F>(mut pipeline: Pipeline<S, E, F>, records: Vec<TicketRecord>) -> RunHandle
where
    S: PrinterSink + Send + 'static,
    E: QrEncoder + Send + 'static,
    F: FooterProvider + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = pipeline.cancel_token();
    pipeline.set_events(tx);

    let task = tokio::task::spawn_blocking(move || pipeline.run(&records));

    RunHandle {
        events: rx,
        cancel,
        task,
    }
}
