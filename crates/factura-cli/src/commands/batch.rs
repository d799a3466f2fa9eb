//! Batch processing command for multiple invoice files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use factura_core::extraction::rules::patterns::INVOICE_TOTAL;
use factura_core::{
    Document, DocumentKind, DocumentTextProvider, ExtractionResult, FacturaConfig,
    InvoiceParser, Ledger, RuleParser,
};

use super::process::{format_result, OutputFormat};
use super::{ledger_path, load_config};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern matching the input files
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Append every successful result to the ledger
    #[arg(long)]
    save: bool,

    /// Ledger file (overrides the configured path)
    #[arg(long)]
    ledger: Option<PathBuf>,

    /// Skip OCR and use only PDF text extraction
    #[arg(long)]
    text_only: bool,

    /// Number of parallel workers
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Result of processing a single file.
struct ProcessResult {
    index: usize,
    path: PathBuf,
    outcome: Result<ExtractionResult, String>,
    processing_time_ms: u64,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;
    let parser = RuleParser::from_config(&config.extraction)?;

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| DocumentKind::from_path(p).is_some())
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let overall_pb = ProgressBar::new(files.len() as u64);
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let semaphore = Arc::new(Semaphore::new(args.jobs.max(1)));
    let mut tasks = JoinSet::new();

    for (index, path) in files.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let parser = parser.clone();
        let config = config.clone();
        let text_only = args.text_only;

        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            let file_start = Instant::now();
            let task_path = path.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                process_single_file(&task_path, &parser, &config, text_only)
            })
            .await?;

            anyhow::Ok(ProcessResult {
                index,
                path,
                outcome: outcome.map_err(|e| e.to_string()),
                processing_time_ms: file_start.elapsed().as_millis() as u64,
            })
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let result = joined??;
        overall_pb.inc(1);

        if let Err(message) = &result.outcome {
            if args.continue_on_error {
                warn!("Failed to process {}: {}", result.path.display(), message);
            } else {
                error!("Failed to process {}: {}", result.path.display(), message);
                tasks.abort_all();
                overall_pb.abandon();
                anyhow::bail!("Processing failed for {}: {}", result.path.display(), message);
            }
        }
        results.push(result);
    }

    overall_pb.finish_with_message("Complete");
    results.sort_by_key(|r| r.index);

    let successful: Vec<_> = results.iter().filter(|r| r.outcome.is_ok()).collect();
    let failed: Vec<_> = results.iter().filter(|r| r.outcome.is_err()).collect();

    if let Some(output_dir) = &args.output_dir {
        for result in &successful {
            if let Ok(extraction) = &result.outcome {
                let output_name = result
                    .path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("factura");
                let output_path =
                    output_dir.join(format!("{}.{}", output_name, args.format.extension()));

                fs::write(&output_path, format_result(extraction, args.format)?)?;
                debug!("Wrote output to {}", output_path.display());
            }
        }
    }

    if args.save {
        let ledger = Ledger::new(ledger_path(args.ledger.as_deref(), &config));
        for result in &successful {
            if let Ok(extraction) = &result.outcome {
                ledger.append(extraction)?;
            }
        }
        println!(
            "{} Saved {} rows to ledger {}",
            style("✓").green(),
            successful.len(),
            ledger.path().display()
        );
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        let field_names: Vec<&str> = parser.rules().names().collect();
        write_summary(&summary_path, &field_names, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(successful.len()).green(),
        style(failed.len()).red()
    );

    let totals: Vec<Decimal> = successful
        .iter()
        .filter_map(|r| r.outcome.as_ref().ok())
        .filter_map(|extraction| extraction.decimal(INVOICE_TOTAL))
        .collect();
    if !totals.is_empty() {
        let sum: Decimal = totals.iter().sum();
        println!(
            "   {} across {} invoices: {}{}",
            INVOICE_TOTAL,
            totals.len(),
            sum,
            config.extraction.currency_suffix
        );
    }

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            if let Err(message) = &result.outcome {
                println!("  - {}: {}", result.path.display(), message);
            }
        }
    }

    Ok(())
}

fn process_single_file(
    path: &Path,
    parser: &RuleParser,
    config: &FacturaConfig,
    text_only: bool,
) -> anyhow::Result<ExtractionResult> {
    let document = Document::open(path)?;
    let provider =
        DocumentTextProvider::new(config.pdf.clone(), config.ocr.clone()).text_only(text_only);
    let text = provider.extract(&document)?;
    debug!("{}: text from {:?}", path.display(), text.source);

    Ok(parser.parse(&text.text))
}

fn write_summary(
    path: &Path,
    field_names: &[&str],
    results: &[ProcessResult],
) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    let mut header = vec!["filename", "status", "fields_found"];
    header.extend_from_slice(field_names);
    header.extend(["processing_time_ms", "error"]);
    wtr.write_record(&header)?;

    for result in results {
        let filename = result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_string();
        let time = result.processing_time_ms.to_string();

        let mut record = vec![filename];
        match &result.outcome {
            Ok(extraction) => {
                record.push("success".to_string());
                record.push(format!("{}/{}", extraction.found_count(), extraction.len()));
                for name in field_names {
                    record.push(extraction.get(name).unwrap_or_default().to_string());
                }
                record.push(time);
                record.push(String::new());
            }
            Err(message) => {
                record.push("error".to_string());
                record.push(String::new());
                record.extend(field_names.iter().map(|_| String::new()));
                record.push(time);
                record.push(message.clone());
            }
        }
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}
