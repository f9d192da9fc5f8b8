//! Config command - manage configuration.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;
use serde_json::Value;

use facto_core::FactoConfig;

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show current configuration
    Show,

    /// Initialize a new configuration file
    Init(InitArgs),

    /// Get a specific configuration value
    Get {
        /// Configuration key (e.g., "watch.input_dir")
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// New value (JSON, or a plain string)
        value: String,
    },

    /// Show configuration file path
    Path,
}

#[derive(Args)]
struct InitArgs {
    /// Output path for configuration file (default: the active config path)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite existing file
    #[arg(long)]
    force: bool,
}

pub async fn run(args: ConfigArgs, config_path: &Path) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(config_path),
        ConfigCommand::Init(init_args) => init_config(init_args, config_path),
        ConfigCommand::Get { key } => get_config(config_path, &key),
        ConfigCommand::Set { key, value } => set_config(config_path, &key, &value),
        ConfigCommand::Path => show_path(config_path),
    }
}

fn load(config_path: &Path) -> anyhow::Result<FactoConfig> {
    if config_path.exists() {
        Ok(FactoConfig::from_file(config_path)?)
    } else {
        Ok(FactoConfig::default())
    }
}

/// The API key is never echoed.
fn redacted(config: &FactoConfig) -> anyhow::Result<Value> {
    let mut json = serde_json::to_value(config)?;
    if let Some(key) = json.pointer_mut("/ledger/api_key") {
        *key = Value::String("********".to_string());
    }
    Ok(json)
}

fn show_config(config_path: &Path) -> anyhow::Result<()> {
    if !config_path.exists() {
        eprintln!("{} No config file found, showing defaults.", style("ℹ").blue());
    }
    let config = load(config_path)?;
    println!("{}", serde_json::to_string_pretty(&redacted(&config)?)?);
    Ok(())
}

fn init_config(args: InitArgs, config_path: &Path) -> anyhow::Result<()> {
    let output_path = args.output.unwrap_or_else(|| config_path.to_path_buf());

    if output_path.exists() && !args.force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            output_path.display()
        );
    }

    FactoConfig::default().save(&output_path)?;

    println!(
        "{} Created configuration file at {}",
        style("✓").green(),
        output_path.display()
    );
    Ok(())
}

/// `watch.max_workers` as a JSON pointer (`/watch/max_workers`).
fn pointer(key: &str) -> anyhow::Result<String> {
    if key.is_empty() || key.split('.').any(str::is_empty) {
        anyhow::bail!("Invalid configuration key: {:?}", key);
    }
    Ok(format!("/{}", key.replace('.', "/")))
}

fn get_config(config_path: &Path, key: &str) -> anyhow::Result<()> {
    let json = redacted(&load(config_path)?)?;
    let value = json
        .pointer(&pointer(key)?)
        .ok_or_else(|| anyhow::anyhow!("Configuration key not found: {}", key))?;

    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn set_config(config_path: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let path = pointer(key)?;
    let secret = path == "/ledger/api_key";

    // Bare words are taken as strings
    let parsed_value: Value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));

    let mut json = serde_json::to_value(load(config_path)?)?;
    if secret {
        // Skipped on output while empty, so it may be absent
        if let Some(ledger) = json.get_mut("ledger").and_then(Value::as_object_mut) {
            ledger.entry("api_key").or_insert(Value::String(String::new()));
        }
    }
    match json.pointer_mut(&path) {
        Some(slot) if !slot.is_object() => *slot = parsed_value.clone(),
        Some(_) => anyhow::bail!("{} is a section, not a value", key),
        None => anyhow::bail!("Configuration key not found: {}", key),
    }

    // Round-trip through the typed config to reject ill-typed values
    let config: FactoConfig = serde_json::from_value(json)
        .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e))?;
    config.save(config_path)?;

    let shown = if secret {
        "\"********\"".to_string()
    } else {
        serde_json::to_string(&parsed_value)?
    };
    println!("{} Set {} = {}", style("✓").green(), key, shown);
    Ok(())
}

fn show_path(config_path: &Path) -> anyhow::Result<()> {
    println!("Configuration file: {}", config_path.display());

    if config_path.exists() {
        println!("Status: {}", style("exists").green());
    } else {
        println!("Status: {}", style("not created").yellow());
        println!();
        println!("Run 'facto config init' to create a configuration file.");
    }
    Ok(())
}
