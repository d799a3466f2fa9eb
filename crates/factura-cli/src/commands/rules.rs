//! Rules command - list the active extraction rule table.

use clap::Args;
use console::style;

use factura_core::RuleParser;

use super::load_config;

/// Arguments for the rules command.
#[derive(Args)]
pub struct RulesArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: RulesFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum RulesFormat {
    /// Human readable listing
    Text,
    /// JSON, usable as `extraction.rules` in the config file
    Json,
}

pub async fn run(args: RulesArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let parser = RuleParser::from_config(&config.extraction)?;
    let rules = parser.rules();

    match args.format {
        RulesFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&rules.to_rules())?);
        }
        RulesFormat::Text => {
            for (i, spec) in rules.fields().iter().enumerate() {
                println!(
                    "{:>2}. {} {}",
                    i + 1,
                    style(spec.name()).bold(),
                    style(format!("[{}]", spec.normalizer().label())).dim()
                );
                for (priority, pattern) in spec.patterns().iter().enumerate() {
                    println!("      {} {}", priority + 1, pattern.as_str());
                }
            }
            println!();
            println!(
                "{} {} fields, currency suffix {:?}",
                style("ℹ").blue(),
                rules.len(),
                config.extraction.currency_suffix
            );
        }
    }

    Ok(())
}
