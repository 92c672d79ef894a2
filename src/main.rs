use anyhow::{Context, Result};
use clap::Parser;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chart_reconcile::config::NormalizerConfig;
use chart_reconcile::ingest::Ingestor;
use chart_reconcile::manifest::Manifest;
use chart_reconcile::normalize::Normalizer;
use chart_reconcile::output::CatalogDump;
use chart_reconcile::progress::{create_spinner, format_duration, set_log_only};
use chart_reconcile::safety::validate_output_path;

#[derive(Parser)]
#[command(name = "chart-reconcile")]
#[command(about = "Reconcile yearly chart listings into one canonical track catalog")]
struct Args {
    /// Run manifest (JSON) listing the current-year and historical sources
    manifest: PathBuf,

    /// Catalog dump to write (JSON)
    output: PathBuf,

    /// Exception tables layered over the built-in normalization rules
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log how rows whose artist or title matches this regex are resolved
    #[arg(long)]
    trace: Option<String>,

    /// Hide progress bars and log progress lines instead
    #[arg(long)]
    log_only: bool,

    /// Write ingestion statistics (JSON) to this file
    #[arg(long)]
    stats: Option<PathBuf>,
}

fn init_logging(trace: bool) {
    let default_filter = if trace { "info,chart_reconcile=debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.trace.is_some());
    set_log_only(args.log_only);

    let start = Instant::now();

    let config = match &args.config {
        Some(path) => {
            log::info!("Loading exception tables: {:?}", path);
            NormalizerConfig::from_json_file(path)?
        }
        None => NormalizerConfig::default(),
    };

    let manifest = Manifest::from_json_file(&args.manifest)?;
    let mut inputs = manifest.source_paths();
    inputs.push(args.manifest.clone());
    inputs.extend(args.config.iter().cloned());
    let input_refs: Vec<&Path> = inputs.iter().map(PathBuf::as_path).collect();
    validate_output_path(&args.output, ".json", &input_refs)?;

    log::info!(
        "Processing {}: {} current source(s), {} historical source(s)",
        manifest.year,
        manifest.current.len(),
        manifest.historical.len()
    );

    let mut ingestor = Ingestor::new(Normalizer::new(config));
    if let Some(pattern) = &args.trace {
        let pattern = Regex::new(pattern).context("Invalid --trace pattern")?;
        ingestor = ingestor.with_trace(pattern);
    }

    manifest.run(&mut ingestor)?;

    let mut stats = ingestor.stats().clone();
    stats.elapsed_seconds = start.elapsed().as_secs_f64();
    stats.log_phase("ingest");
    if let Some(path) = &args.stats {
        stats
            .write_to_file(path)
            .with_context(|| format!("Failed to write stats to {:?}", path))?;
    }

    let spinner = create_spinner("Writing catalog dump");
    let dump = CatalogDump::new(&ingestor, &manifest.year)?;
    dump.write_to_file(&args.output)?;
    spinner.finish_and_clear();

    println!("\n{:=<60}", "");
    println!("Reconciliation complete!");
    println!("  Chart positions: {}", dump.tracks.len());
    println!("  Catalog keys: {}", dump.catalog.len());
    println!("  Historical years: {}", ingestor.years().count());
    println!("  Accepted key attempts: {:.1}%", stats.acceptance_rate());
    println!("  Elapsed: {}", format_duration(start.elapsed()));
    println!("  Output: {:?}", args.output);
    println!("{:=<60}", "");

    Ok(())
}
