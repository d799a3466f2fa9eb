//! Process command - extract fields from a single invoice file.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use factura_core::{
    Document, DocumentTextProvider, ExtractionResult, InvoiceParser, Ledger, RuleParser,
};

use super::{ledger_path, load_config};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF, image or plain text)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Append the result to the ledger
    #[arg(long)]
    save: bool,

    /// Ledger file (overrides the configured path)
    #[arg(long)]
    ledger: Option<PathBuf>,

    /// Skip OCR and use only PDF text extraction
    #[arg(long)]
    text_only: bool,

    /// Check extracted values for consistency
    #[arg(long)]
    validate: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON object, fields in table order
    Json,
    /// CSV with a header row
    Csv,
    /// Aligned "field: value" lines
    Text,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {msg}")?
            .progress_chars("##-"),
    );

    pb.set_message("Reading document...");
    pb.set_position(10);
    let document = Document::open(&args.input)?;

    pb.set_message("Extracting text...");
    pb.set_position(30);
    let provider = DocumentTextProvider::new(config.pdf.clone(), config.ocr.clone())
        .text_only(args.text_only);
    let text = provider.extract(&document)?;
    debug!("Text source: {:?}", text.source);

    pb.set_message("Extracting invoice fields...");
    pb.set_position(70);
    let parser = RuleParser::from_config(&config.extraction)?;
    let result = parser.parse(&text.text);

    pb.set_position(100);
    pb.finish_and_clear();

    if args.validate {
        let missing = result.missing();
        if !missing.is_empty() {
            eprintln!(
                "{} {}/{} fields not found: {}",
                style("⚠").yellow(),
                missing.len(),
                result.len(),
                missing.join(", ")
            );
        }

        let issues = result.validate();
        if !issues.is_empty() {
            eprintln!("{}", style("Validation issues:").yellow());
            for issue in &issues {
                eprintln!("  - {}", issue);
            }
        }
    }

    let output = format_result(&result, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.save {
        let ledger = Ledger::new(ledger_path(args.ledger.as_deref(), &config));
        ledger.append(&result)?;
        eprintln!(
            "{} Saved to ledger {}",
            style("✓").green(),
            ledger.path().display()
        );
    }

    info!(
        "{} of {} fields found",
        result.found_count(),
        result.len()
    );
    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

pub fn format_result(result: &ExtractionResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Csv => format_csv(result),
        OutputFormat::Text => Ok(format_text(result)),
    }
}

fn format_csv(result: &ExtractionResult) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(result.names())?;
    wtr.write_record(result.values())?;

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(result: &ExtractionResult) -> String {
    let width = result
        .names()
        .map(|name| name.chars().count())
        .max()
        .unwrap_or(0);

    let mut output = String::new();
    for (name, value) in result.iter() {
        let padding = width - name.chars().count();
        output.push_str(&format!("{}:{} {}\n", name, " ".repeat(padding), value));
    }
    output
}
