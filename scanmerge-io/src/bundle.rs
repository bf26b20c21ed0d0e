//! Format-agnostic cloud loading and saving
//!
//! A [`CloudBundle`] is a cloud together with the two poses that place it:
//! the sensor origin in cloud coordinates and the cloud in the map frame.

use crate::archive::{
    cloud_to_array, pose_to_array, read_npy_cloud, write_npy_cloud, write_npz, NpzArchive,
    NpzEntry,
};
use crate::format::FileFormat;
use crate::ptx::{PtxReadOptions, PtxReader, PtxWriter};
use log::{info, warn};
use scanmerge_core::{Error, Pose, Result, ScanCloud, ScanFrame};
use std::path::Path;

/// Archive key of the cloud array
pub const CLOUD_KEY: &str = "cloud";
/// Archive key of the sensor-to-cloud pose
pub const SENSOR_TO_CLOUD_KEY: &str = "sensor_to_cloud";
/// Archive key of the cloud-to-map pose
pub const CLOUD_TO_MAP_KEY: &str = "cloud_to_map";

// Older archives name the poses after the PTX header fields.
const LEGACY_SENSOR_KEY: &str = "sensor_pose";
const LEGACY_CLOUD_KEY: &str = "cloud_pose";

/// A cloud with its placement poses
#[derive(Debug, Clone, PartialEq)]
pub struct CloudBundle {
    pub cloud: ScanCloud,
    pub sensor_to_cloud: Pose,
    pub cloud_to_map: Pose,
}

impl CloudBundle {
    /// A cloud already in map coordinates
    pub fn new(cloud: ScanCloud) -> Self {
        Self {
            cloud,
            sensor_to_cloud: Pose::identity(),
            cloud_to_map: Pose::identity(),
        }
    }

    pub fn with_poses(mut self, sensor_to_cloud: Pose, cloud_to_map: Pose) -> Self {
        self.sensor_to_cloud = sensor_to_cloud;
        self.cloud_to_map = cloud_to_map;
        self
    }

    pub fn from_frame(frame: ScanFrame) -> Self {
        Self {
            cloud: frame.cloud,
            sensor_to_cloud: frame.scanner_pose,
            cloud_to_map: frame.cloud_pose,
        }
    }

    pub fn into_frame(self) -> ScanFrame {
        ScanFrame::new(self.sensor_to_cloud, self.cloud_to_map, self.cloud)
    }
}

/// Read the pose under `key`, falling back to `legacy`, then to identity.
fn read_archive_pose(archive: &mut NpzArchive, key: &str, legacy: &str) -> Result<Pose> {
    if archive.contains(key) {
        archive.read_pose(key)
    } else if archive.contains(legacy) {
        info!("reading legacy pose key '{}' as '{}'", legacy, key);
        archive.read_pose(legacy)
    } else {
        Ok(Pose::identity())
    }
}

/// Load a cloud bundle from a `.ptx`, `.npy` or `.npz` file.
///
/// A PTX file yields its first frame with its grid and poses; the cloud is
/// not transformed. A `.npy` file holds only the cloud. Missing poses are
/// identity.
pub fn read_cloud<P: AsRef<Path>>(path: P) -> Result<CloudBundle> {
    let path = path.as_ref();
    let bundle = match FileFormat::from_path(path)? {
        FileFormat::Ptx => {
            let mut reader = PtxReader::open(path, PtxReadOptions::default())?;
            let frame = match reader.next() {
                Some(frame) => frame,
                None => {
                    return Err(reader.take_stop_reason().unwrap_or_else(|| {
                        Error::TruncatedSource(format!("{} holds no frame", path.display()))
                    }))
                }
            };
            if let Ok(Some(_)) = reader.read_header() {
                warn!(
                    "{} holds more than one frame; only the first is loaded",
                    path.display()
                );
            }
            CloudBundle::from_frame(frame)
        }
        FileFormat::Npy => CloudBundle::new(read_npy_cloud(path)?),
        FileFormat::Npz => {
            let mut archive = NpzArchive::open(path)?;
            let cloud = archive.read_cloud(CLOUD_KEY)?;
            let sensor_to_cloud =
                read_archive_pose(&mut archive, SENSOR_TO_CLOUD_KEY, LEGACY_SENSOR_KEY)?;
            let cloud_to_map = read_archive_pose(&mut archive, CLOUD_TO_MAP_KEY, LEGACY_CLOUD_KEY)?;
            CloudBundle::new(cloud).with_poses(sensor_to_cloud, cloud_to_map)
        }
    };
    info!(
        "{}: loaded {} {} points",
        path.display(),
        bundle.cloud.len(),
        bundle.cloud.layout()
    );
    Ok(bundle)
}

/// Save a cloud bundle; the format follows the path's extension.
///
/// `.npy` stores the cloud only and drops the poses.
pub fn write_cloud<P: AsRef<Path>>(bundle: &CloudBundle, path: P) -> Result<()> {
    let path = path.as_ref();
    let format = FileFormat::from_path(path)?;
    if !format.has_poses()
        && (!bundle.sensor_to_cloud.is_identity() || !bundle.cloud_to_map.is_identity())
    {
        warn!("{}: .{} output drops the bundle poses", path.display(), format);
    }
    match format {
        FileFormat::Ptx => {
            let mut writer = PtxWriter::create(path)?;
            writer.write_frame(&bundle.clone().into_frame())?;
            writer.finish()?;
        }
        FileFormat::Npy => write_npy_cloud(&bundle.cloud, path)?,
        FileFormat::Npz => write_npz(
            path,
            [
                (CLOUD_KEY, NpzEntry::Cloud(cloud_to_array(&bundle.cloud)?)),
                (
                    SENSOR_TO_CLOUD_KEY,
                    NpzEntry::Pose(pose_to_array(&bundle.sensor_to_cloud)),
                ),
                (
                    CLOUD_TO_MAP_KEY,
                    NpzEntry::Pose(pose_to_array(&bundle.cloud_to_map)),
                ),
            ],
        )?,
    }
    info!("{}: wrote {} points", path.display(), bundle.cloud.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanmerge_core::{GridShape, Vector3d};
    use tempfile::tempdir;

    fn sample_bundle() -> CloudBundle {
        let cloud = ScanCloud::from_fields(4, &[1.0, 2.0, 3.0, 0.5, 4.0, 5.0, 6.0, 0.25])
            .unwrap()
            .with_grid(2, 1)
            .unwrap();
        CloudBundle::new(cloud).with_poses(
            Pose::translation(Vector3d::new(0.0, 0.0, 1.5)),
            Pose::translation(Vector3d::new(10.0, 0.0, 0.0)),
        )
    }

    #[test]
    fn test_npz_bundle_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scan.npz");
        let bundle = sample_bundle();
        write_cloud(&bundle, &path).unwrap();
        assert_eq!(read_cloud(&path).unwrap(), bundle);
    }

    #[test]
    fn test_ptx_bundle_keeps_grid_and_poses() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scan.ptx");
        let bundle = sample_bundle();
        write_cloud(&bundle, &path).unwrap();
        let loaded = read_cloud(&path).unwrap();
        assert_eq!(loaded.cloud.grid(), Some(GridShape::new(2, 1)));
        assert_eq!(loaded.sensor_to_cloud, bundle.sensor_to_cloud);
        assert_eq!(loaded.cloud_to_map, bundle.cloud_to_map);
        assert_eq!(loaded.cloud.positions(), bundle.cloud.positions());
    }

    #[test]
    fn test_npy_has_identity_poses() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cloud.npy");
        write_cloud(&sample_bundle(), &path).unwrap();
        let loaded = read_cloud(&path).unwrap();
        assert!(loaded.sensor_to_cloud.is_identity());
        assert!(loaded.cloud_to_map.is_identity());
        assert_eq!(loaded.cloud.len(), 2);
    }

    #[test]
    fn test_legacy_pose_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("legacy.npz");
        let bundle = sample_bundle();
        write_npz(
            &path,
            [
                (CLOUD_KEY, NpzEntry::Cloud(cloud_to_array(&bundle.cloud).unwrap())),
                (LEGACY_CLOUD_KEY, NpzEntry::Pose(pose_to_array(&bundle.cloud_to_map))),
            ],
        )
        .unwrap();
        let loaded = read_cloud(&path).unwrap();
        assert_eq!(loaded.cloud_to_map, bundle.cloud_to_map);
        assert!(loaded.sensor_to_cloud.is_identity());
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            read_cloud("cloud.las"),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_empty_ptx_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.ptx");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(read_cloud(&path), Err(Error::TruncatedSource(_))));
    }
}
