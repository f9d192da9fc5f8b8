//! Process command - run one invoice through the pipeline.

use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use super::Context;
use crate::pipeline::{FileOutcome, InvoiceWorker};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Invoice PDF
    #[arg(required = true)]
    input: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: ProcessFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum ProcessFormat {
    /// JSON outcome record
    Json,
    /// One-line summary
    Text,
}

pub async fn run(args: ProcessArgs, ctx: Context) -> anyhow::Result<()> {
    let start = Instant::now();

    if !args.input.is_file() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let backend = ctx.backend()?;
    let worker = InvoiceWorker::new(&ctx.config, backend);
    worker.folders().ensure()?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(format!("Processing {}", args.input.display()));
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let outcome = worker.process(&args.input).await;
    pb.finish_and_clear();

    match args.format {
        ProcessFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        ProcessFormat::Text => print_outcome(&outcome),
    }
    debug!("Total processing time: {:?}", start.elapsed());

    if outcome.is_failure() {
        anyhow::bail!("Processing failed: {}", args.input.display());
    }
    Ok(())
}

fn print_outcome(outcome: &FileOutcome) {
    let moved = outcome
        .moved_to()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(not moved)".to_string());

    match outcome {
        FileOutcome::Delivered { posted, delivery, .. } => {
            println!("{} {}", style("✓").green(), posted.message());
            println!("{} {}: {}", style("✓").green(), delivery, moved);
        }
        FileOutcome::Pending { posted, .. } => {
            println!("{} {}", style("✓").green(), posted.message());
            println!("{} Partner verification triggered, send manually: {}", style("!").yellow(), moved);
        }
        FileOutcome::Failed { stage, message, .. } => {
            println!("{} {} failed: {}", style("✗").red(), stage, message);
            println!("  moved to {}", moved);
        }
        FileOutcome::Vanished => {
            println!("{} File disappeared before processing", style("!").yellow());
        }
    }
}
