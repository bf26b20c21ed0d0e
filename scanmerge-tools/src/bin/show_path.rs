//! Print the scanner setup path of a set of PTX files
//!
//! Only the first frame header of each file is read. The cloud pose
//! translations can also be saved as an xyz cloud for external viewers.

use anyhow::{Context, Result};
use clap::Parser;
use scanmerge_core::{Point3f, PointCloud, ScanCloud};
use scanmerge_io::{read_ptx_header, write_cloud, CloudBundle};
use scanmerge_tools::init_logging;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "show_path")]
#[command(about = "Print the cloud pose translation of each PTX file", version)]
struct Cli {
    /// Save the positions as a cloud (.npy, .npz or .ptx)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// PTX files
    #[arg(required = true)]
    input: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut positions = Vec::with_capacity(cli.input.len());
    for (i, path) in cli.input.iter().enumerate() {
        let header =
            read_ptx_header(path).with_context(|| format!("reading header of {}", path.display()))?;
        let t = header.cloud_pose.translation_vector();
        println!(
            "{} ({}, {}) [{:.6} {:.6} {:.6}]",
            i, header.rows, header.cols, t.x, t.y, t.z
        );
        positions.push(Point3f::new(t.x as f32, t.y as f32, t.z as f32));
    }

    if let Some(output) = cli.output {
        let cloud = ScanCloud::from(PointCloud::from_points(positions));
        write_cloud(&CloudBundle::new(cloud), &output)
            .with_context(|| format!("writing {}", output.display()))?;
    }
    Ok(())
}
