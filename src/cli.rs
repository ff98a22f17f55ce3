use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::anonymizer::{DEFAULT_BATCH_SIZE, DEFAULT_MARKER_COLUMN, DEFAULT_PROGRESS_INTERVAL};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Replace sensitive table data with realistic synthetic values",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Anonymize the tables of a CSV directory according to a YAML catalog
    Anonymize(AnonymizeArgs),
    /// List the registered value generators
    Fakers(FakersArgs),
}

#[derive(Debug, Args)]
pub struct AnonymizeArgs {
    /// YAML catalog describing entities and their anonymization rules
    #[arg(short, long)]
    pub config: PathBuf,
    /// Directory holding one `<table>.csv` file per table
    #[arg(short, long)]
    pub data: PathBuf,
    /// Entity to anonymize (repeatable; defaults to every entity with rules)
    #[arg(short, long = "entity", action = clap::ArgAction::Append)]
    pub entities: Vec<String>,
    /// Rows per page and per write batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
    /// Compute replacements and statistics without writing anything
    #[arg(long)]
    pub dry_run: bool,
    /// Seed for reproducible output
    #[arg(long)]
    pub seed: Option<u64>,
    /// Rows between progress log lines (0 disables intermediate ticks)
    #[arg(long, default_value_t = DEFAULT_PROGRESS_INTERVAL)]
    pub progress_interval: usize,
    /// Column set to true on rewritten rows of entities with `mark_anonymized`
    #[arg(long, default_value = DEFAULT_MARKER_COLUMN)]
    pub marker_column: String,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Write a JSON statistics report to this path
    #[arg(long)]
    pub stats_json: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum ListFormat {
    #[default]
    Plain,
    Json,
}

#[derive(Debug, Args)]
pub struct FakersArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = ListFormat::Plain)]
    pub format: ListFormat,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
