//! CLI application for Belgian invoice ingestion and Peppol delivery.

mod commands;
mod pipeline;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::{check, config, extract, process, watch, Context};

/// Watch a folder for invoice PDFs, post them to Odoo and send them over Peppol
#[derive(Parser)]
#[command(name = "facto")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Use an in-memory ledger seeded with reference data instead of Odoo
    #[arg(long, global = true)]
    dry_run: bool,

    /// Also append log lines to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the inbox folder and process invoices as they arrive
    Watch(watch::WatchArgs),

    /// Run a single invoice through the pipeline
    Process(process::ProcessArgs),

    /// Extract invoice data without contacting the ledger
    Extract(extract::ExtractArgs),

    /// Check the ledger connection and reference data
    Check,

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_file.as_deref())?;

    let config_path = cli.config.unwrap_or_else(commands::default_config_path);

    // Config management works on the raw file, without env overrides
    match cli.command {
        Commands::Config(args) => config::run(args, &config_path).await,
        Commands::Watch(args) => watch::run(args, Context::load(config_path, cli.dry_run)?).await,
        Commands::Process(args) => process::run(args, Context::load(config_path, cli.dry_run)?).await,
        Commands::Extract(args) => extract::run(args, Context::load(config_path, cli.dry_run)?).await,
        Commands::Check => check::run(Context::load(config_path, cli.dry_run)?).await,
    }
}

/// Install the stderr subscriber, plus an ANSI-free file layer when requested.
///
/// `RUST_LOG` takes precedence over the verbosity flag.
fn init_logging(verbose: u8, log_file: Option<&Path>) -> anyhow::Result<()> {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    Ok(())
}
