pub mod anonymize_cmd;
pub mod anonymizer;
pub mod cli;
pub mod config;
pub mod csv_store;
pub mod data;
pub mod error;
pub mod faker;
pub mod ordering;
pub mod pattern;
pub mod rules;
pub mod schema;
pub mod stats;
pub mod store;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::{
    cli::{Cli, Commands, FakersArgs, ListFormat},
    faker::FakerRegistry,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("table_anonymizer", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Anonymize(args) => anonymize_cmd::execute(&args),
        Commands::Fakers(args) => handle_fakers(&args),
    }
}

fn handle_fakers(args: &FakersArgs) -> Result<()> {
    let registry = FakerRegistry::with_defaults();
    let names = registry.names().collect::<Vec<_>>();
    match args.format {
        ListFormat::Plain => {
            for name in &names {
                println!("{name}");
            }
        }
        ListFormat::Json => println!("{}", serde_json::to_string_pretty(&names)?),
    }
    Ok(())
}
