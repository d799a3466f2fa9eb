//! Ledger command - inspect the accumulated invoice rows.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Subcommand};
use console::style;
use rust_decimal::Decimal;

use factura_core::extraction::rules::patterns::INVOICE_TOTAL;
use factura_core::Ledger;

use super::{ledger_path, load_config};

/// Arguments for the ledger command.
#[derive(Args)]
pub struct LedgerArgs {
    #[command(subcommand)]
    command: LedgerCommand,
}

#[derive(Subcommand)]
enum LedgerCommand {
    /// Print every row of the ledger
    Show {
        /// Ledger file (overrides the configured path)
        #[arg(long)]
        ledger: Option<PathBuf>,
    },

    /// Show the ledger file path
    Path {
        /// Ledger file (overrides the configured path)
        #[arg(long)]
        ledger: Option<PathBuf>,
    },
}

pub async fn run(args: LedgerArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    match args.command {
        LedgerCommand::Show { ledger } => {
            show_ledger(
                &Ledger::new(ledger_path(ledger.as_deref(), &config)),
                &config.extraction.currency_suffix,
            )
        }
        LedgerCommand::Path { ledger } => {
            show_path(&Ledger::new(ledger_path(ledger.as_deref(), &config)))
        }
    }
}

fn show_ledger(ledger: &Ledger, currency_suffix: &str) -> anyhow::Result<()> {
    let table = ledger.read()?;

    if table.is_empty() {
        println!(
            "{} No invoices in ledger {}",
            style("ℹ").blue(),
            ledger.path().display()
        );
        return Ok(());
    }

    let width = table
        .headers
        .iter()
        .map(|h| h.chars().count())
        .max()
        .unwrap_or(0);

    for (i, row) in table.rows.iter().enumerate() {
        println!("{}", style(format!("#{}", i + 1)).bold());
        for (header, value) in table.headers.iter().zip(row) {
            let padding = width - header.chars().count();
            println!("  {}:{} {}", header, " ".repeat(padding), value);
        }
        println!();
    }

    println!(
        "{} {} invoices in {}",
        style("✓").green(),
        table.len(),
        ledger.path().display()
    );

    let totals: Vec<Decimal> = table
        .column_values(INVOICE_TOTAL)
        .into_iter()
        .filter_map(parse_amount)
        .collect();
    if !totals.is_empty() {
        let sum: Decimal = totals.iter().sum();
        println!(
            "   {} across {} invoices: {}{}",
            INVOICE_TOTAL,
            totals.len(),
            sum,
            currency_suffix
        );
    }

    Ok(())
}

/// Ledger cell such as "45.67€" as a decimal. Sentinels and blanks give `None`.
fn parse_amount(cell: &str) -> Option<Decimal> {
    let number = cell
        .trim()
        .trim_end_matches(|c: char| !c.is_ascii_digit());
    Decimal::from_str(number).ok()
}

fn show_path(ledger: &Ledger) -> anyhow::Result<()> {
    println!("Ledger file: {}", ledger.path().display());

    if ledger.exists() {
        println!("Status: {}", style("exists").green());
    } else {
        println!("Status: {}", style("not created").yellow());
        println!();
        println!("Run 'factura process <file> --save' to add the first invoice.");
    }

    Ok(())
}
