/// Estimation tool: loads inventory tables (JSON) and an estimation job
/// (TOML), resolves the evaluation scope once and writes the estimate table
/// as JSON.
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use canopy_core::{EstimationJob, EstimationScope, Estimator, InventoryTables};

#[derive(Parser, Debug)]
#[command(name = "estimate", about = "Stratified domain estimates from inventory tables")]
struct Args {
    /// Inventory tables as JSON (evaluations, strata, assignments, conditions, trees).
    #[arg(short, long)]
    inventory: PathBuf,

    /// Estimation job TOML with `[evaluation]` and `[estimate]` sections.
    #[arg(short, long)]
    job: PathBuf,

    /// Output path (stdout when omitted).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override the job's grouping columns (comma separated).
    #[arg(long, value_delimiter = ',')]
    group_by: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let text = fs::read_to_string(&args.inventory)
        .with_context(|| format!("Cannot read {}", args.inventory.display()))?;
    let tables: InventoryTables = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse inventory {}", args.inventory.display()))?;
    info!(
        conditions = tables.conditions.len(),
        trees = tables.trees.len(),
        "inventory loaded"
    );

    let mut job = EstimationJob::from_file(&args.job)
        .with_context(|| format!("Failed to load job {}", args.job.display()))?;
    if !args.group_by.is_empty() {
        job.estimate.group_by = args.group_by.clone();
    }

    let purpose = job.estimate.measure.evaluation_purpose();
    let scope = EstimationScope::resolve(&tables, &job.evaluation, purpose)
        .context("Failed to resolve evaluation scope")?;
    let table = Estimator::new(&tables)
        .estimate(&scope, &job.estimate)
        .context("Estimation failed")?;

    let json = table.to_json_pretty()?;
    match &args.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Cannot write {}", path.display()))?;
            eprintln!("[estimate] {} rows → {}", table.rows.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
