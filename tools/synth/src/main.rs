/// Synthetic inventory tool: writes seeded inventory tables as JSON for
/// fixtures and the `estimate` tool.
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use canopy_core::synthetic::{generate_inventory, SyntheticParams};

#[derive(Parser, Debug)]
#[command(name = "synth", about = "Generate a seeded synthetic forest inventory as JSON")]
struct Args {
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// State (geography) code.
    #[arg(long, default_value = "41")]
    statecd: u16,

    #[arg(long, default_value = "4")]
    strata: usize,

    /// Repeat one stratum row to exercise duplicate handling.
    #[arg(long)]
    duplicate_stratum: bool,

    #[arg(short, long, default_value = "data/inventory.json")]
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let params = SyntheticParams {
        seed: args.seed,
        statecd: args.statecd,
        n_strata: args.strata,
        duplicate_stratum_row: args.duplicate_stratum,
        ..SyntheticParams::default()
    };
    let tables = generate_inventory(&params);

    if let Some(dir) = args.output.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("Cannot create {}", dir.display()))?;
    }
    fs::write(&args.output, serde_json::to_string_pretty(&tables)?)
        .with_context(|| format!("Cannot write {}", args.output.display()))?;

    info!(
        evaluations = tables.evaluations.len(),
        plots = tables.conditions.iter().filter(|c| c.condid == 1).count(),
        trees = tables.trees.len(),
        path = %args.output.display(),
        "synthetic inventory written"
    );
    Ok(())
}
