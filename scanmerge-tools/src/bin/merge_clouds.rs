//! Merge several scans into one filtered, deduplicated cloud
//!
//! ```text
//! merge_clouds --grid '[0.05, first]' --range '[0.5, 30.0]' a.ptx b.npz merged.npz
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use scanmerge_algorithms::{merge_clouds, CloudSource};
use scanmerge_io::{write_cloud, CloudBundle};
use scanmerge_tools::{init_logging, MergeConfig, Overrides};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "merge_clouds")]
#[command(about = "Filter, align and merge laser scan clouds", version)]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Box filter as YAML, e.g. '[[-.inf, -.inf, -.inf], [.inf, .inf, .inf]]'
    #[arg(short = 'b', long = "box")]
    bounds: Option<String>,

    /// Range filter as YAML, e.g. '[0.0, .inf]'
    #[arg(short, long)]
    range: Option<String>,

    /// Voxel grid as YAML, e.g. '[0.0, first]'
    #[arg(short, long)]
    grid: Option<String>,

    /// Worker threads
    #[arg(short, long)]
    workers: Option<usize>,

    /// Seed for the random keep policy
    #[arg(long)]
    seed: Option<u64>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Input clouds followed by the output path
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => {
            let config = MergeConfig::from_yaml(path)?;
            info!("Loaded config from: {}", path.display());
            config
        }
        None => MergeConfig::default(),
    };
    config.apply_overrides(&Overrides {
        bounds: cli.bounds,
        range: cli.range,
        grid: cli.grid,
        workers: cli.workers,
        seed: cli.seed,
    })?;

    let mut paths = cli.paths;
    let output = match paths.pop() {
        Some(output) => output,
        None => bail!("missing output path"),
    };
    let mut inputs = config.inputs;
    inputs.extend(paths);
    if inputs.is_empty() {
        bail!("no input clouds given");
    }
    info!("{:?}", config.params);

    let start = Instant::now();
    let sources: Vec<CloudSource> = inputs.into_iter().map(CloudSource::Path).collect();
    let count = sources.len();
    let merged = merge_clouds(sources, None, &config.params).context("merge failed")?;
    info!(
        "merged {} clouds into {} points in {:.2?}",
        count,
        merged.len(),
        start.elapsed()
    );

    write_cloud(&CloudBundle::new(merged), &output)
        .with_context(|| format!("writing {}", output.display()))?;
    println!("{}", output.display());
    Ok(())
}
