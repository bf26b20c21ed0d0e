//! Merge configuration for the command-line tools
//!
//! A YAML file can list the inputs and every merge parameter; command-line
//! flags override single parameters with small YAML snippets, e.g.
//! `--grid '[0.05, random]'`.

use anyhow::{bail, Context, Result};
use scanmerge_algorithms::{BoxBounds, MergeParams, RangeBounds, VoxelParams};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level keys of a config file, aliases included
const CONFIG_KEYS: &[&str] = &[
    "inputs", "bounds", "box", "range", "voxel", "grid", "seed", "workers",
];

/// Contents of a merge config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Clouds to merge, before any given on the command line
    #[serde(default)]
    pub inputs: Vec<PathBuf>,

    #[serde(flatten)]
    pub params: MergeParams,
}

impl MergeConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Parse a config document; unknown top-level keys are an error.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(content)?;
        if let Some(mapping) = value.as_mapping() {
            let unknown: Vec<String> = mapping
                .keys()
                .map(|key| key.as_str().map_or_else(|| format!("{:?}", key), str::to_string))
                .filter(|key| !CONFIG_KEYS.contains(&key.as_str()))
                .collect();
            if !unknown.is_empty() {
                bail!(
                    "unknown config key(s): {} (expected one of: {})",
                    unknown.join(", "),
                    CONFIG_KEYS.join(", ")
                );
            }
        }
        Ok(serde_yaml::from_value(value)?)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply command-line overrides given as YAML snippets
    pub fn apply_overrides(&mut self, overrides: &Overrides) -> Result<()> {
        if let Some(text) = &overrides.bounds {
            let bounds: BoxBounds =
                serde_yaml::from_str(text).with_context(|| format!("invalid --box '{}'", text))?;
            self.params.bounds = Some(bounds);
        }
        if let Some(text) = &overrides.range {
            let range: RangeBounds =
                serde_yaml::from_str(text).with_context(|| format!("invalid --range '{}'", text))?;
            self.params.range = Some(range);
        }
        if let Some(text) = &overrides.grid {
            let voxel: VoxelParams =
                serde_yaml::from_str(text).with_context(|| format!("invalid --grid '{}'", text))?;
            self.params.voxel = voxel;
        }
        if let Some(workers) = overrides.workers {
            self.params.workers = workers;
        }
        if let Some(seed) = overrides.seed {
            self.params.seed = seed;
        }
        Ok(())
    }
}

/// Parameter overrides from the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub bounds: Option<String>,
    pub range: Option<String>,
    pub grid: Option<String>,
    pub workers: Option<usize>,
    pub seed: Option<u64>,
}
