//! Parallel multi-cloud merge
//!
//! Every source is loaded, filtered and aligned on its own worker; the
//! results are then concatenated in input order and deduplicated once more
//! over the union.

use crate::filtering::{
    filter_box, filter_range, filter_voxel_grid, BoxBounds, RangeBounds, VoxelParams,
};
use crate::parallel::{default_workers, PoolConfig};
use log::{debug, error, info};
use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;
use scanmerge_core::{Bounded, Error, Pose, Result, ScanCloud};
use scanmerge_io::read_cloud;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Seed of the voxel filter's random stream when none is given
pub const DEFAULT_SEED: u64 = 135;

/// One input of a merge
#[derive(Debug, Clone, PartialEq)]
pub enum CloudSource {
    /// A cloud already in memory
    Loaded(ScanCloud),
    /// A `.ptx`, `.npy` or `.npz` file, loaded by the worker
    Path(PathBuf),
}

impl fmt::Display for CloudSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudSource::Loaded(cloud) => write!(f, "<{} {} points>", cloud.layout(), cloud.len()),
            CloudSource::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

impl From<ScanCloud> for CloudSource {
    fn from(cloud: ScanCloud) -> Self {
        CloudSource::Loaded(cloud)
    }
}

impl From<PathBuf> for CloudSource {
    fn from(path: PathBuf) -> Self {
        CloudSource::Path(path)
    }
}

impl From<&str> for CloudSource {
    fn from(path: &str) -> Self {
        CloudSource::Path(PathBuf::from(path))
    }
}

/// Filter and pool settings shared by all sources of a merge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeParams {
    /// Box filter; `None` skips it
    #[serde(alias = "box")]
    pub bounds: Option<BoxBounds>,
    /// Range filter; `None` skips it
    pub range: Option<RangeBounds>,
    /// Voxel deduplication; resolution 0 disables it
    #[serde(alias = "grid")]
    pub voxel: VoxelParams,
    /// Seed of the voxel filter's random streams
    pub seed: u64,
    /// Worker threads
    pub workers: usize,
}

impl Default for MergeParams {
    fn default() -> Self {
        Self {
            bounds: None,
            range: None,
            voxel: VoxelParams::disabled(),
            seed: DEFAULT_SEED,
            workers: default_workers(),
        }
    }
}

impl MergeParams {
    pub fn with_bounds(mut self, bounds: BoxBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_range(mut self, range: RangeBounds) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_voxel(mut self, voxel: VoxelParams) -> Self {
        self.voxel = voxel;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Check every parameter before any work starts
    pub fn validate(&self) -> Result<()> {
        if let Some(bounds) = &self.bounds {
            bounds.validate()?;
        }
        if let Some(range) = &self.range {
            range.validate()?;
        }
        if self.voxel.is_enabled() {
            self.voxel.validate()?;
        } else if self.voxel.resolution != 0.0 {
            return Err(Error::InvalidParameter(format!(
                "voxel resolution must be 0 or positive, got {}",
                self.voxel.resolution
            )));
        }
        if self.workers == 0 {
            return Err(Error::InvalidParameter(
                "worker count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::default().with_threads(self.workers)
    }
}

/// Load, filter and align one source.
///
/// Stages run in a fixed order: box, range, voxel grid, pose. An explicit
/// `pose` wins over the `cloud_to_map` pose stored with a path source.
pub fn process_source(
    index: usize,
    source: CloudSource,
    pose: Option<Pose>,
    params: &MergeParams,
) -> Result<ScanCloud> {
    let (mut cloud, pose) = match source {
        CloudSource::Loaded(cloud) => (cloud, pose.unwrap_or_default()),
        CloudSource::Path(path) => {
            let bundle = read_cloud(&path)?;
            info!("source {}: {} ({} points)", index, path.display(), bundle.cloud.len());
            (bundle.cloud, pose.unwrap_or(bundle.cloud_to_map))
        }
    };

    if let Some(bounds) = &params.bounds {
        filter_box(&mut cloud, bounds)?;
    }
    if let Some(range) = &params.range {
        filter_range(&mut cloud, range)?;
    }
    if params.voxel.is_enabled() {
        let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(index as u64));
        filter_voxel_grid(&mut cloud, &params.voxel, &mut rng)?;
    }
    if !pose.is_identity() {
        cloud.transform(&pose);
    }
    debug!("source {}: {} points after processing", index, cloud.len());
    Ok(cloud.flatten())
}

/// Merge `sources` into one flat cloud.
///
/// `poses`, when given, holds one pose per source. Sources are processed in
/// parallel on `params.workers` threads; the merged cloud keeps input order
/// and, if voxel deduplication is enabled, is deduplicated once more over all
/// sources with a stream seeded by `params.seed`.
///
/// # Errors
/// Parameter errors and a pose count that differs from the source count are
/// reported before any source is touched. A source that fails to load or
/// filter fails the merge once all sources have finished.
pub fn merge_clouds(
    sources: Vec<CloudSource>,
    poses: Option<Vec<Pose>>,
    params: &MergeParams,
) -> Result<ScanCloud> {
    params.validate()?;
    if sources.is_empty() {
        return Err(Error::InvalidParameter("no sources to merge".to_string()));
    }
    let poses: Vec<Option<Pose>> = match poses {
        Some(poses) if poses.len() != sources.len() => {
            return Err(Error::ShapeMismatch(format!(
                "{} poses given for {} sources",
                poses.len(),
                sources.len()
            )))
        }
        Some(poses) => poses.into_iter().map(Some).collect(),
        None => vec![None; sources.len()],
    };

    let pool = params.pool_config().build()?;
    info!(
        "merging {} sources on {} workers",
        sources.len(),
        pool.current_num_threads()
    );

    let labels: Vec<String> = sources.iter().map(ToString::to_string).collect();
    let results: Vec<Result<ScanCloud>> = pool.install(|| {
        sources
            .into_par_iter()
            .zip(poses)
            .enumerate()
            .map(|(i, (source, pose))| process_source(i, source, pose, params))
            .collect()
    });

    let mut clouds = Vec::with_capacity(results.len());
    for (label, result) in labels.iter().zip(results) {
        match result {
            Ok(cloud) => clouds.push(cloud),
            Err(e) => {
                error!("source {} failed: {}", label, e);
                return Err(e);
            }
        }
    }

    let mut merged = ScanCloud::concatenate(clouds)?;
    info!("{} points after concatenation", merged.len());
    if params.voxel.is_enabled() {
        let mut rng = StdRng::seed_from_u64(params.seed);
        filter_voxel_grid(&mut merged, &params.voxel, &mut rng)?;
    }
    if let Some((min, max)) = merged.bounding_box() {
        debug!("merged extent: min {:?}, max {:?}", min, max);
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filtering::KeepPolicy;
    use approx::assert_relative_eq;
    use scanmerge_core::{IntensityPoint3f, Point3f, PointCloud, UnitQuaternion, Vector3, Vector3d};

    fn line_cloud(xs: &[f32]) -> ScanCloud {
        ScanCloud::from(PointCloud::from_points(
            xs.iter()
                .map(|&x| IntensityPoint3f {
                    position: Point3f::new(x, 0.0, 0.0),
                    intensity: x,
                })
                .collect::<Vec<_>>(),
        ))
    }

    fn xs(cloud: &ScanCloud) -> Vec<f32> {
        cloud.positions().iter().map(|p| p.x).collect()
    }

    #[test]
    fn test_merge_without_dedup_concatenates() {
        let merged = merge_clouds(
            vec![line_cloud(&[1.0, 2.0]).into(), line_cloud(&[3.0]).into()],
            None,
            &MergeParams::default().with_workers(2),
        )
        .unwrap();
        assert_eq!(xs(&merged), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_merge_applies_poses_after_filters() {
        let params = MergeParams::default()
            .with_workers(2)
            .with_bounds(BoxBounds::new([0.0; 3], [2.5, 1.0, 1.0]));
        let merged = merge_clouds(
            vec![line_cloud(&[1.0, 5.0]).into(), line_cloud(&[2.0, 3.0]).into()],
            Some(vec![
                Pose::identity(),
                Pose::translation(Vector3d::new(10.0, 0.0, 0.0)),
            ]),
            &params,
        )
        .unwrap();
        assert_eq!(xs(&merged), vec![1.0, 12.0]);
    }

    #[test]
    fn test_rotated_pose_after_range_filter() {
        // Quarter turn about z, then 1 m up
        let pose = Pose::from_translation_rotation(
            Vector3d::new(0.0, 0.0, 1.0),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2),
        );
        let params = MergeParams::default()
            .with_workers(2)
            .with_range(RangeBounds::new(0.5, 4.0));
        let merged = merge_clouds(
            vec![line_cloud(&[0.25, 1.5, 3.0, 6.0]).into()],
            Some(vec![pose]),
            &params,
        )
        .unwrap();

        let positions = merged.positions();
        assert_eq!(positions.len(), 2);
        for (p, expected_y) in positions.iter().zip([1.5, 3.0]) {
            assert_relative_eq!(p.x, 0.0, epsilon = 1e-6);
            assert_relative_eq!(p.y, expected_y, epsilon = 1e-6);
            assert_relative_eq!(p.z, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_global_dedup_across_sources() {
        let params = MergeParams::default()
            .with_workers(2)
            .with_voxel(VoxelParams::new(1.0, KeepPolicy::First).with_preserve_order(true));
        let merged = merge_clouds(
            vec![line_cloud(&[0.2, 0.4, 1.5]).into(), line_cloud(&[0.6, 2.5]).into()],
            None,
            &params,
        )
        .unwrap();
        assert_eq!(xs(&merged), vec![0.2, 1.5, 2.5]);
    }

    #[test]
    fn test_result_independent_of_workers() {
        let sources: Vec<CloudSource> = (0..6)
            .map(|i| line_cloud(&[i as f32 * 0.3, i as f32 * 0.3 + 0.1, 7.0]).into())
            .collect();
        let params = MergeParams::default().with_voxel(VoxelParams::new(0.5, KeepPolicy::Random));
        let one = merge_clouds(sources.clone(), None, &params.clone().with_workers(1)).unwrap();
        let four = merge_clouds(sources, None, &params.with_workers(4)).unwrap();
        assert_eq!(one, four);
    }

    #[test]
    fn test_pose_count_mismatch() {
        let result = merge_clouds(
            vec![line_cloud(&[1.0]).into(), line_cloud(&[2.0]).into()],
            Some(vec![Pose::identity()]),
            &MergeParams::default(),
        );
        assert!(matches!(result, Err(Error::ShapeMismatch(_))));
    }

    #[test]
    fn test_invalid_parameters_fail_fast() {
        let sources = || vec![CloudSource::from("does/not/exist.ptx")];
        let bad_box = MergeParams::default().with_bounds(BoxBounds::new([1.0; 3], [0.0; 3]));
        assert!(matches!(
            merge_clouds(sources(), None, &bad_box),
            Err(Error::ShapeMismatch(_))
        ));
        let no_workers = MergeParams::default().with_workers(0);
        assert!(matches!(
            merge_clouds(sources(), None, &no_workers),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            merge_clouds(Vec::new(), None, &MergeParams::default()),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_failed_source_fails_merge() {
        let result = merge_clouds(
            vec![line_cloud(&[1.0]).into(), CloudSource::from("does/not/exist.npz")],
            None,
            &MergeParams::default().with_workers(2),
        );
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_source_emptied_before_dedup_fails() {
        let params = MergeParams::default()
            .with_workers(1)
            .with_bounds(BoxBounds::new([100.0; 3], [200.0; 3]))
            .with_voxel(VoxelParams::new(1.0, KeepPolicy::First));
        let result = merge_clouds(vec![line_cloud(&[1.0]).into()], None, &params);
        assert!(matches!(result, Err(Error::EmptyInput)));
    }

    #[test]
    fn test_params_from_yaml() {
        let params: MergeParams = serde_yaml::from_str(
            "box: [[-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]]\n\
             range: [0.5, 20.0]\n\
             grid: [0.05, random]\n\
             workers: 3\n",
        )
        .unwrap();
        assert_eq!(params.bounds, Some(BoxBounds::new([-1.0; 3], [1.0; 3])));
        assert_eq!(params.range, Some(RangeBounds::new(0.5, 20.0)));
        assert_eq!(params.voxel, VoxelParams::new(0.05, KeepPolicy::Random));
        assert_eq!(params.seed, DEFAULT_SEED);
        assert_eq!(params.workers, 3);
    }
}
