/// Offline property battery: checks the estimator's invariants against
/// seeded synthetic inventories and reports every failure.

mod checks;

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "canopy-test", about = "Estimator property battery over synthetic inventories")]
struct Args {
    /// First seed.
    #[arg(long, default_value = "1")]
    seed: u64,

    /// Number of consecutive seeds to run.
    #[arg(short, long, default_value = "16")]
    count: u64,

    /// Relative tolerance for floating-point comparisons.
    #[arg(long, default_value = "1e-9")]
    tolerance: f64,

    /// Write the full report as JSON.
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    let mut results = Vec::new();
    for seed in args.seed..args.seed.saturating_add(args.count) {
        info!(seed, "running battery");
        results.extend(checks::run_seed(seed, args.tolerance));
    }

    let failed: Vec<_> = results.iter().filter(|r| !r.passed).collect();
    for r in &failed {
        eprintln!("FAIL  {:<24} seed {:>6}  {}", r.check, r.seed, r.detail);
    }
    eprintln!(
        "[canopy-test] {} checks over {} seeds: {} passed, {} failed",
        results.len(),
        args.count,
        results.len() - failed.len(),
        failed.len()
    );

    if let Some(path) = &args.report {
        fs::write(path, serde_json::to_string_pretty(&results)?)
            .with_context(|| format!("Cannot write report {}", path.display()))?;
    }

    if !failed.is_empty() {
        bail!("{} of {} checks failed", failed.len(), results.len());
    }
    Ok(())
}
