//! # Boleta CLI
//!
//! Command-line interface for printing ticket batches.
//!
//! ## Usage
//!
//! ```bash
//! # Print every ticket in a JSON file on the default RFCOMM printer
//! boleta print tickets.json
//!
//! # Use a config file and a different device
//! boleta --config boleta.toml print --device /dev/ttyUSB0 tickets.json
//!
//! # Render and encode without touching the printer
//! boleta print --dry-run tickets.json
//!
//! # Write each ticket as a PNG instead of printing
//! boleta preview tickets.json --out previews/
//! ```
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).
//! The exit code is 2 when a printer fault halted the run.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use boleta::{
    DryRun, Pipeline, PngDirectory, PrintStatus, PrinterSink, ProgressEvent, RunConfig,
    RunSummary, SerialPrinter, TicketRecord, load_config, load_tickets, spawn_run,
};

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG: &str = "boleta.toml";

/// Boleta - receipt ticket printer
#[derive(Parser, Debug)]
#[command(name = "boleta")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a batch of tickets
    Print {
        /// JSON file with a ticket array or {"tickets": [...]}
        tickets: PathBuf,

        /// Printer device path (overrides the config)
        #[arg(long)]
        device: Option<String>,

        /// Encode print jobs without sending them
        #[arg(long, conflicts_with = "png_dir")]
        dry_run: bool,

        /// Write PNGs to this directory instead of printing
        #[arg(long, value_name = "DIR")]
        png_dir: Option<PathBuf>,

        /// Disable the pause between tickets
        #[arg(long)]
        no_delay: bool,
    },

    /// Render tickets to PNG files
    Preview {
        tickets: PathBuf,

        /// Output directory
        #[arg(long, value_name = "DIR")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(summary) => {
            print!("{}", summary);
            if summary.is_halted() {
                std::process::exit(2);
            }
        }
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<RunSummary> {
    let cli = Cli::parse();
    let mut config = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Print {
            tickets,
            device,
            dry_run,
            png_dir,
            no_delay,
        } => {
            if let Some(device) = device {
                config.printer.device = device;
            }
            if no_delay {
                config.dispatch.inter_print_delay_ms = 0;
            }
            let records = read_tickets(&tickets)?;

            if let Some(dir) = png_dir {
                execute(&config, PngDirectory::new(dir), records).await
            } else if dry_run {
                execute(&config, DryRun::new(config.profile()?), records).await
            } else {
                let mut printer = SerialPrinter::new(&config.printer.device, config.profile()?);
                printer.set_write_timeout(config.dispatch.ack_timeout());
                info!(device = %config.printer.device, "printing to device");
                execute(&config, printer, records).await
            }
        }
        Commands::Preview { tickets, out } => {
            config.dispatch.inter_print_delay_ms = 0;
            let records = read_tickets(&tickets)?;
            execute(&config, PngDirectory::new(&out), records).await
        }
    }
}

fn resolve_config(path: Option<&Path>) -> Result<RunConfig> {
    let config = match path {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None if Path::new(DEFAULT_CONFIG).exists() => load_config(Path::new(DEFAULT_CONFIG))
            .with_context(|| format!("Failed to load config from {}", DEFAULT_CONFIG))?,
        None => RunConfig::default(),
    };
    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

fn read_tickets(path: &Path) -> Result<Vec<TicketRecord>> {
    let records =
        load_tickets(path).with_context(|| format!("Failed to load tickets from {:?}", path))?;
    info!(count = records.len(), "loaded tickets");
    Ok(records)
}

/// Run the batch in the background, logging progress as it happens.
/// Ctrl-C stops the run after the ticket in flight.
async fn execute<S>(config: &RunConfig, sink: S, records: Vec<TicketRecord>) -> Result<RunSummary>
where
    S: PrinterSink + Send + 'static,
{
    let pipeline = Pipeline::new(config, sink)?;
    let gauge = pipeline.gauge().clone();
    let mut handle = spawn_run(pipeline, records);

    let cancel = handle.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, stopping after the current ticket");
            cancel.cancel();
        }
    });

    while let Some(event) = handle.next_event().await {
        match event {
            ProgressEvent::Started { run_id, total } => info!(%run_id, total, "run started"),
            ProgressEvent::TicketFinished(outcome) => match &outcome.status {
                PrintStatus::Printed => info!(ticket_id = %outcome.ticket_id, "printed"),
                PrintStatus::Skipped => debug!(ticket_id = %outcome.ticket_id, "skipped"),
                PrintStatus::Failed(reason) => {
                    warn!(ticket_id = %outcome.ticket_id, %reason, "failed")
                }
            },
            ProgressEvent::Halted(halt) => error!(
                ticket_id = %halt.ticket_id,
                reason = %halt.reason,
                "printer needs attention, run halted"
            ),
            ProgressEvent::Finished(_) => {}
        }
    }

    let summary = handle.join().await?;
    debug!(peak_buffers = gauge.peak(), "buffer usage");
    Ok(summary)
}
