//! File format detection by extension

use scanmerge_core::{Error, Result};
use std::fmt;
use std::path::Path;

/// Supported cloud file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    /// Single `.npy` array holding the cloud fields
    Npy,
    /// Compressed `.npz` bundle of cloud and poses
    Npz,
    /// PTX text scan
    Ptx,
}

impl FileFormat {
    /// Detect the format from a path's extension (case-insensitive)
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase());
        match ext.as_deref() {
            Some("npy") => Ok(FileFormat::Npy),
            Some("npz") => Ok(FileFormat::Npz),
            Some("ptx") => Ok(FileFormat::Ptx),
            _ => Err(Error::UnsupportedFormat(format!(
                "unsupported cloud format: {}",
                path.display()
            ))),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Npy => "npy",
            FileFormat::Npz => "npz",
            FileFormat::Ptx => "ptx",
        }
    }

    /// Whether the format can store poses next to the cloud
    pub fn has_poses(self) -> bool {
        !matches!(self, FileFormat::Npy)
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(FileFormat::from_path("scan.ptx").unwrap(), FileFormat::Ptx);
        assert_eq!(FileFormat::from_path("a/b/cloud.NPZ").unwrap(), FileFormat::Npz);
        assert_eq!(FileFormat::from_path("cloud.npy").unwrap(), FileFormat::Npy);
        assert!(matches!(
            FileFormat::from_path("cloud.ply"),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(FileFormat::from_path("cloud").is_err());
    }

    #[test]
    fn test_only_npy_drops_poses() {
        assert!(!FileFormat::Npy.has_poses());
        assert!(FileFormat::Npz.has_poses());
        assert!(FileFormat::Ptx.has_poses());
    }
}
