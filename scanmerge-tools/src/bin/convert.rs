//! Convert clouds between `.ptx`, `.npy` and `.npz`

use anyhow::{Context, Result};
use clap::Parser;
use scanmerge_io::{read_cloud, write_cloud};
use scanmerge_tools::{init_logging, output_path, parse_format};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "convert")]
#[command(about = "Re-write clouds with their poses in another format", version)]
struct Cli {
    /// Output format: npz, npy or ptx
    #[arg(short = 'o', long, default_value = "npz")]
    output_format: String,

    /// Output path template with {dir}, {name} and {ext}
    #[arg(short = 'O', long, default_value = "{dir}/{name}{ext}")]
    output: String,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Input clouds
    #[arg(required = true)]
    input: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let format = parse_format(&cli.output_format)?;
    for (i, input) in cli.input.iter().enumerate() {
        let output = output_path(&cli.output, input, format)?;
        println!("{} {} {}", i, input.display(), output.display());
        let bundle = read_cloud(input).with_context(|| format!("reading {}", input.display()))?;
        write_cloud(&bundle, &output).with_context(|| format!("writing {}", output.display()))?;
    }
    Ok(())
}
