//! Watch command - run the ingestion pipeline until interrupted.

use std::path::PathBuf;

use clap::Args;
use console::style;
use facto_core::models::config::WatcherBackend;
use tracing::{info, warn};

use super::Context;
use crate::pipeline::Pipeline;

/// Arguments for the watch command.
#[derive(Args)]
pub struct WatchArgs {
    /// Inbox folder (overrides watch.input_dir)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Number of invoices processed concurrently (overrides watch.max_workers)
    #[arg(short = 'j', long)]
    workers: Option<usize>,

    /// Watcher implementation (overrides watch.watcher)
    #[arg(long, value_enum)]
    watcher: Option<WatcherKind>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum WatcherKind {
    /// Periodic directory listing; works on network shares
    Poll,
    /// Operating system notifications
    Native,
}

pub async fn run(args: WatchArgs, mut ctx: Context) -> anyhow::Result<()> {
    let watch = &mut ctx.config.watch;
    if let Some(input) = args.input {
        watch.input_dir = input;
    }
    if let Some(workers) = args.workers {
        watch.max_workers = workers;
    }
    if let Some(kind) = args.watcher {
        watch.watcher = match kind {
            WatcherKind::Poll => WatcherBackend::Poll,
            WatcherKind::Native => WatcherBackend::Native,
        };
    }

    let backend = ctx.backend()?;
    let pipeline = Pipeline::new(&ctx.config, backend);

    eprintln!(
        "{} Watching {} with {} worker(s). Press Ctrl-C to stop.",
        style("ℹ").blue(),
        ctx.config.watch.input_dir.display(),
        ctx.config.watch.max_workers
    );

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Interrupt received, stopping"),
            Err(e) => {
                warn!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await
            }
        }
    };
    let summary = pipeline.run(shutdown).await?;

    eprintln!(
        "{} Stopped: {} sent, {} awaiting delivery, {} failed",
        style("✓").green(),
        style(summary.sent).green(),
        style(summary.posted).yellow(),
        style(summary.failed).red()
    );
    Ok(())
}
