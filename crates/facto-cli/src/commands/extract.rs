//! Extract command - parse invoices without contacting the ledger.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use facto_core::invoice::{ExtractionResult, InvoiceExtractor, TemplateInvoiceParser};
use facto_core::invoice::rules::format_amount;
use facto_core::{ParsedInvoice, PdfReader, TaxBucket};

use super::Context;
use crate::pipeline::watcher::is_pdf;

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input files or glob patterns
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Include extraction warnings in the output
    #[arg(long)]
    warnings: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output, one row per invoice
    Csv,
    /// Plain text summary
    Text,
}

/// Parsed invoice plus its source, for output.
struct Extracted {
    path: PathBuf,
    result: ExtractionResult,
}

pub async fn run(args: ExtractArgs, ctx: Context) -> anyhow::Result<()> {
    let start = Instant::now();
    ctx.config.validate(false)?;

    let files = expand_inputs(&args.inputs)?;
    if files.is_empty() {
        anyhow::bail!("No PDF files match {}", args.inputs.join(" "));
    }

    let parser = TemplateInvoiceParser::from_config(&ctx.config.extraction);
    let reader = PdfReader::new();

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let mut extracted = Vec::with_capacity(files.len());
    let mut failed = Vec::new();
    for path in files {
        let result = reader
            .read_file(&path)
            .map_err(anyhow::Error::from)
            .and_then(|document| Ok(parser.extract_document(&document)?));
        match result {
            Ok(result) => {
                for warning in &result.warnings {
                    warn!("{}: {}", path.display(), warning);
                }
                extracted.push(Extracted { path, result });
            }
            Err(e) => {
                warn!("Failed to extract {}: {}", path.display(), e);
                failed.push((path, e.to_string()));
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    if !extracted.is_empty() {
        let output = match args.format {
            OutputFormat::Json => format_json(&extracted, args.warnings)?,
            OutputFormat::Csv => format_csv(&extracted)?,
            OutputFormat::Text => format_text(&extracted, args.warnings),
        };

        match &args.output {
            Some(path) => {
                fs::write(path, &output)?;
                eprintln!("{} Output written to {}", style("✓").green(), path.display());
            }
            None => println!("{}", output),
        }
    }

    debug!("Extracted {} files in {:?}", extracted.len(), start.elapsed());

    if !failed.is_empty() {
        eprintln!("{}", style("Failed files:").red());
        for (path, error) in &failed {
            eprintln!("  - {}: {}", path.display(), error);
        }
        anyhow::bail!("{} of {} files failed", failed.len(), failed.len() + extracted.len());
    }
    Ok(())
}

/// Resolve each input as a literal path or, failing that, a glob pattern.
fn expand_inputs(inputs: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        let literal = PathBuf::from(input);
        if literal.is_file() {
            files.push(literal);
            continue;
        }
        let before = files.len();
        for entry in glob(input)? {
            let path = entry?;
            if path.is_file() && is_pdf(&path) {
                files.push(path);
            }
        }
        if files.len() == before {
            anyhow::bail!("Input file not found: {}", input);
        }
    }
    Ok(files)
}

fn format_json(extracted: &[Extracted], with_warnings: bool) -> anyhow::Result<String> {
    let values = extracted
        .iter()
        .map(|e| {
            if with_warnings {
                serde_json::to_value(&e.result)
            } else {
                serde_json::to_value(&e.result.invoice)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let output = match values.as_slice() {
        [single] => serde_json::to_string_pretty(single)?,
        _ => serde_json::to_string_pretty(&values)?,
    };
    Ok(output)
}

fn format_csv(extracted: &[Extracted]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "file",
        "invoice_number",
        "invoice_date",
        "buyer_name",
        "buyer_vat",
        "postal_code",
        "city",
        "basis",
        "rate_0",
        "rate_6",
        "rate_21",
        "grand_total",
        "archive_name",
    ])?;

    for e in extracted {
        let invoice = &e.result.invoice;
        let totals = &invoice.tax_totals;
        wtr.write_record([
            e.path.display().to_string(),
            invoice.invoice_number.clone(),
            invoice.invoice_date.to_string(),
            invoice.buyer.name.clone(),
            invoice.buyer.vat_number.clone().unwrap_or_default(),
            invoice.buyer.postal_code.clone(),
            invoice.buyer.city.clone(),
            totals.basis.to_string(),
            totals.rate_0_total.to_string(),
            totals.rate_6_total.to_string(),
            totals.rate_21_total.to_string(),
            totals.grand_total.to_string(),
            invoice.archive_filename(),
        ])?;
    }

    Ok(String::from_utf8(wtr.into_inner()?)?)
}

fn format_text(extracted: &[Extracted], with_warnings: bool) -> String {
    let mut output = String::new();
    for (i, e) in extracted.iter().enumerate() {
        if i > 0 {
            output.push('\n');
        }
        output.push_str(&format!("File: {}\n", e.path.display()));
        output.push_str(&invoice_text(&e.result.invoice));
        if with_warnings && !e.result.warnings.is_empty() {
            output.push_str("Warnings:\n");
            for warning in &e.result.warnings {
                output.push_str(&format!("  - {}\n", warning));
            }
        }
    }
    output
}

fn invoice_text(invoice: &ParsedInvoice) -> String {
    let mut output = String::new();

    output.push_str(&format!("Invoice: {}\n", invoice.invoice_number));
    output.push_str(&format!("Date: {}\n", invoice.invoice_date));
    output.push('\n');

    let buyer = &invoice.buyer;
    output.push_str("Buyer:\n");
    output.push_str(&format!("  {}\n", buyer.name));
    output.push_str(&format!("  {}\n", buyer.address_line()));
    if let Some(vat) = &buyer.vat_number {
        output.push_str(&format!("  VAT: {}\n", vat));
    }
    if let Some(phone) = &buyer.phone {
        output.push_str(&format!("  Phone: {}\n", phone));
    }
    output.push('\n');

    if !invoice.line_items.is_empty() {
        output.push_str("Lines:\n");
        for item in &invoice.line_items {
            output.push_str(&format!(
                "  {} x {} @ {} = {}\n",
                item.quantity,
                item.description,
                format_amount(item.unit_price),
                format_amount(item.total)
            ));
        }
        output.push('\n');
    }

    let totals = &invoice.tax_totals;
    output.push_str("Totals:\n");
    output.push_str(&format!("  Basis: {} EUR\n", format_amount(totals.basis)));
    for bucket in TaxBucket::ALL {
        output.push_str(&format!("  {:>3}:   {} EUR\n", bucket.display(), format_amount(totals.bucket(bucket))));
    }
    output.push_str(&format!("  Total: {} EUR\n", format_amount(totals.grand_total)));
    output.push_str(&format!("\nArchive name: {}\n", invoice.archive_filename()));

    output
}
