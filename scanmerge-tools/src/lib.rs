//! Shared pieces of the scanmerge command-line tools

pub mod config;

pub use config::{MergeConfig, Overrides};

use anyhow::{bail, Result};
use scanmerge_io::FileFormat;
use std::path::{Path, PathBuf};

/// Initialize logging from the number of `-v` flags
pub fn init_logging(verbose: u8) {
    env_logger::Builder::new()
        .filter_level(match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();
}

/// Parse an output format name such as `npz` or `.ptx`
pub fn parse_format(name: &str) -> Result<FileFormat> {
    let name = name.trim_start_matches('.');
    Ok(FileFormat::from_path(format!("cloud.{}", name))?)
}

/// Fill an output path template.
///
/// `{dir}` is the input's directory (`.` if it has none), `{name}` its file
/// stem and `{ext}` the output extension including the dot.
pub fn output_path(template: &str, input: &Path, format: FileFormat) -> Result<PathBuf> {
    let name = match input.file_stem().and_then(|s| s.to_str()) {
        Some(name) => name,
        None => bail!("input {} has no file name", input.display()),
    };
    let dir = match input.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_string_lossy().into_owned(),
        _ => ".".to_string(),
    };
    let path = template
        .replace("{dir}", &dir)
        .replace("{name}", name)
        .replace("{ext}", &format!(".{}", format.extension()));
    Ok(PathBuf::from(path))
}
