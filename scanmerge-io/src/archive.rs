//! NumPy array archives (`.npy` / `.npz`)
//!
//! Clouds are stored as `f32` arrays of shape `(n, width)`, or
//! `(rows, cols, width)` for organized clouds. Poses are `f64` arrays of shape
//! `(4, 4)`.

use log::debug;
use ndarray::{Array2, ArrayD, Ix2, IxDyn};
use ndarray_npy::{read_npy, write_npy, NpzReader, NpzWriter};
use scanmerge_core::{Error, Pose, Result, ScanCloud};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

fn archive_error(path: &Path, e: impl std::fmt::Display) -> Error {
    Error::Archive(format!("{}: {}", path.display(), e))
}

/// Dense array for a cloud, keeping the grid shape if it has one
pub fn cloud_to_array(cloud: &ScanCloud) -> Result<ArrayD<f32>> {
    let width = cloud.width();
    let shape = match cloud.grid() {
        Some(grid) => vec![grid.rows, grid.cols, width],
        None => vec![cloud.len(), width],
    };
    ArrayD::from_shape_vec(IxDyn(&shape), cloud.to_fields())
        .map_err(|e| Error::ShapeMismatch(e.to_string()))
}

/// Cloud from a `(n, width)` or `(rows, cols, width)` array
pub fn cloud_from_array(array: &ArrayD<f32>) -> Result<ScanCloud> {
    let shape = array.shape().to_vec();
    let fields: Vec<f32> = array.iter().copied().collect();
    match shape.as_slice() {
        [_, width] => ScanCloud::from_fields(*width, &fields),
        [rows, cols, width] => ScanCloud::from_fields(*width, &fields)?.with_grid(*rows, *cols),
        _ => Err(Error::ShapeMismatch(format!(
            "cloud array must have 2 or 3 dimensions, found shape {:?}",
            shape
        ))),
    }
}

pub fn pose_to_array(pose: &Pose) -> Array2<f64> {
    Array2::from_shape_fn((4, 4), |(i, j)| pose.matrix[(i, j)])
}

pub fn pose_from_array(array: &Array2<f64>) -> Result<Pose> {
    if array.shape() != [4, 4] {
        return Err(Error::ShapeMismatch(format!(
            "pose array must be 4x4, found shape {:?}",
            array.shape()
        )));
    }
    let mut values = [0.0; 16];
    for (value, v) in values.iter_mut().zip(array.iter()) {
        *value = *v;
    }
    Ok(Pose::from_row_major(&values))
}

/// Read a cloud stored as a single `.npy` array
pub fn read_npy_cloud<P: AsRef<Path>>(path: P) -> Result<ScanCloud> {
    let path = path.as_ref();
    let array: ArrayD<f32> = match read_npy(path) {
        Ok(array) => array,
        Err(f32_err) => {
            // Accept double precision arrays as well.
            let array: ArrayD<f64> = read_npy(path).map_err(|_| archive_error(path, f32_err))?;
            array.mapv(|v| v as f32)
        }
    };
    cloud_from_array(&array)
}

/// Write a cloud as a single `.npy` array
pub fn write_npy_cloud<P: AsRef<Path>>(cloud: &ScanCloud, path: P) -> Result<()> {
    let path = path.as_ref();
    let array = cloud_to_array(cloud)?;
    write_npy(path, &array).map_err(|e| archive_error(path, e))
}

/// Reader over the named arrays of a `.npz` archive
pub struct NpzArchive {
    path: std::path::PathBuf,
    npz: NpzReader<File>,
    // key without ".npy" suffix -> name inside the zip
    names: BTreeMap<String, String>,
}

impl NpzArchive {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let mut npz = NpzReader::new(file).map_err(|e| archive_error(&path, e))?;
        let names = npz
            .names()
            .map_err(|e| archive_error(&path, e))?
            .into_iter()
            .map(|name| (name.strip_suffix(".npy").unwrap_or(&name).to_string(), name))
            .collect();
        Ok(Self { path, npz, names })
    }

    /// Array keys, without the `.npy` suffix
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.names.contains_key(key)
    }

    fn name(&self, key: &str) -> Result<String> {
        self.names
            .get(key)
            .cloned()
            .ok_or_else(|| archive_error(&self.path, format!("no array named '{}'", key)))
    }

    /// Read a cloud array; double precision is narrowed to `f32`
    pub fn read_cloud(&mut self, key: &str) -> Result<ScanCloud> {
        let name = self.name(key)?;
        let array: ArrayD<f32> = match self.npz.by_name::<_, IxDyn>(&name) {
            Ok(array) => array,
            Err(f32_err) => {
                let array: ArrayD<f64> = self
                    .npz
                    .by_name::<_, IxDyn>(&name)
                    .map_err(|_| archive_error(&self.path, f32_err))?;
                array.mapv(|v| v as f32)
            }
        };
        debug!("{}: '{}' shape {:?}", self.path.display(), key, array.shape());
        cloud_from_array(&array)
    }

    /// Read a 4x4 pose array; single precision is widened to `f64`
    pub fn read_pose(&mut self, key: &str) -> Result<Pose> {
        let name = self.name(key)?;
        let array: Array2<f64> = match self.npz.by_name::<_, Ix2>(&name) {
            Ok(array) => array,
            Err(f64_err) => {
                let array: Array2<f32> = self
                    .npz
                    .by_name::<_, Ix2>(&name)
                    .map_err(|_| archive_error(&self.path, f64_err))?;
                array.mapv(f64::from)
            }
        };
        pose_from_array(&array)
    }
}

/// Array to store in a `.npz` archive
#[derive(Debug, Clone, PartialEq)]
pub enum NpzEntry {
    Cloud(ArrayD<f32>),
    Pose(Array2<f64>),
}

/// Write named entries to a compressed `.npz` archive
pub fn write_npz<'a, P, I>(path: P, entries: I) -> Result<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = (&'a str, NpzEntry)>,
{
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut npz = NpzWriter::new_compressed(BufWriter::new(file));
    for (name, entry) in entries {
        match &entry {
            NpzEntry::Cloud(array) => npz.add_array(name, array),
            NpzEntry::Pose(array) => npz.add_array(name, array),
        }
        .map_err(|e| archive_error(path, e))?;
    }
    npz.finish().map_err(|e| archive_error(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanmerge_core::{GridShape, PointLayout, Vector3d};
    use tempfile::tempdir;

    #[test]
    fn test_cloud_array_shapes() {
        let flat = ScanCloud::from_fields(4, &[1.0, 2.0, 3.0, 0.5, 4.0, 5.0, 6.0, 0.25]).unwrap();
        assert_eq!(cloud_to_array(&flat).unwrap().shape(), &[2, 4]);

        let grid = flat.clone().with_grid(1, 2).unwrap();
        let array = cloud_to_array(&grid).unwrap();
        assert_eq!(array.shape(), &[1, 2, 4]);
        let back = cloud_from_array(&array).unwrap();
        assert_eq!(back.grid(), Some(GridShape::new(1, 2)));
        assert_eq!(back.layout(), PointLayout::XyzIntensity);
    }

    #[test]
    fn test_cloud_from_bad_array() {
        let array = ArrayD::<f32>::zeros(IxDyn(&[2, 5]));
        assert!(matches!(
            cloud_from_array(&array),
            Err(Error::UnsupportedFieldWidth(5))
        ));
        let array = ArrayD::<f32>::zeros(IxDyn(&[6]));
        assert!(matches!(cloud_from_array(&array), Err(Error::ShapeMismatch(_))));
    }

    #[test]
    fn test_pose_array_is_row_major() {
        let pose = Pose::translation(Vector3d::new(1.0, 2.0, 3.0));
        let array = pose_to_array(&pose);
        assert_eq!(array[[0, 3]], 1.0);
        assert_eq!(array[[2, 3]], 3.0);
        assert_eq!(pose_from_array(&array).unwrap(), pose);
    }

    #[test]
    fn test_npz_archive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bundle.npz");
        let cloud = ScanCloud::from_fields(3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let pose = Pose::translation(Vector3d::new(0.0, 0.0, 5.0));
        write_npz(
            &path,
            [
                ("cloud", NpzEntry::Cloud(cloud_to_array(&cloud).unwrap())),
                ("cloud_to_map", NpzEntry::Pose(pose_to_array(&pose))),
            ],
        )
        .unwrap();

        let mut archive = NpzArchive::open(&path).unwrap();
        assert_eq!(archive.keys().collect::<Vec<_>>(), vec!["cloud", "cloud_to_map"]);
        assert!(!archive.contains("sensor_to_cloud"));
        assert_eq!(archive.read_cloud("cloud").unwrap(), cloud);
        assert_eq!(archive.read_pose("cloud_to_map").unwrap(), pose);
        assert!(matches!(archive.read_pose("missing"), Err(Error::Archive(_))));
    }

    #[test]
    fn test_npy_cloud_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cloud.npy");
        let cloud = ScanCloud::from_fields(4, &[1.0, 2.0, 3.0, 0.5]).unwrap();
        write_npy_cloud(&cloud, &path).unwrap();
        assert_eq!(read_npy_cloud(&path).unwrap(), cloud);
    }
}
