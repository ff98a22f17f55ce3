use std::{fs::File, io::BufWriter};

use anyhow::{Context, Result, anyhow, bail};
use log::{info, warn};

use crate::{
    anonymizer::{Anonymizer, RunOptions},
    cli::AnonymizeArgs,
    config::Catalog,
    csv_store::CsvDirectory,
    faker::FakerRegistry,
    rules::RuleSource,
    schema::SchemaProvider,
    stats::StatsRecorder,
};

pub fn execute(args: &AnonymizeArgs) -> Result<()> {
    let catalog = Catalog::load(&args.config)
        .with_context(|| format!("Loading catalog from {:?}", args.config))?;

    let entities = if args.entities.is_empty() {
        catalog.anonymized_entities()
    } else {
        args.entities.clone()
    };
    if entities.is_empty() {
        bail!(
            "Catalog {:?} defines no entity with an 'anonymize' block",
            args.config
        );
    }
    if let Some(unknown) = entities.iter().find(|e| catalog.record_type(e).is_none()) {
        bail!(
            "Unknown entity '{unknown}'. Known entities: {}",
            catalog.record_type_names().join(", ")
        );
    }

    let mut directory = CsvDirectory::new(&args.data);
    if let Some(delimiter) = args.delimiter {
        directory = directory.with_delimiter(delimiter);
    }
    let mut store = directory
        .load(catalog.record_types())
        .with_context(|| format!("Loading tables from {:?}", args.data))?;

    let registry = FakerRegistry::with_defaults();
    let anonymizer = Anonymizer::new(
        &registry,
        RunOptions {
            batch_size: args.batch_size,
            dry_run: args.dry_run,
            progress_interval: args.progress_interval,
            seed: args.seed,
            marker_column: args.marker_column.clone(),
        },
    );

    let mut stats = StatsRecorder::new();
    let mut failures = 0usize;
    let mut written = 0usize;
    for name in &entities {
        let Some(record_type) = catalog.record_type(name) else {
            continue;
        };
        let Some(rules) = catalog.rules_for(record_type) else {
            warn!("Entity '{name}' has no 'anonymize' block; skipped");
            continue;
        };
        let mut progress = |processed: usize, total: usize, message: &str| {
            info!("[{processed}/{total}] {message}");
        };
        match anonymizer.run(
            record_type,
            &rules,
            &mut store,
            Some(&mut stats),
            Some(&mut progress),
        ) {
            Ok(result) => written += result.written,
            Err(err) => {
                failures += 1;
                if let Some(partial) = err.partial() {
                    written += partial.written;
                }
                warn!("{err}");
            }
        }
    }

    if args.dry_run {
        info!("Dry run: no table was modified");
    } else if written > 0 {
        directory
            .save(&store)
            .with_context(|| format!("Saving tables to {:?}", args.data))?;
        info!("Wrote {written} anonymized row(s) to {:?}", args.data);
    }

    print!("{}", stats.render_table());

    if let Some(path) = &args.stats_json {
        let file = File::create(path).with_context(|| format!("Creating stats file {path:?}"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &stats.to_json())
            .with_context(|| format!("Writing stats report to {path:?}"))?;
        info!("Statistics written to {path:?}");
    }

    if failures > 0 {
        return Err(anyhow!("{failures} entity run(s) failed"));
    }
    Ok(())
}
