//! Spatial filters
//!
//! Box, range and voxel-grid filters over scan clouds. Every filter flattens
//! its input; the output never carries a grid shape. The `_in_place`
//! variants consume the cloud's storage, the others leave the input untouched.

use log::{debug, info};
use rand::Rng;
use rayon::prelude::*;
use scanmerge_core::{Error, Point3f, PointCloud, Result, ScanCloud, ScanRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Axis-aligned box, inclusive on both ends.
///
/// Deserializes from `{min, max}` or from the pair form `[[x, y, z], [x, y, z]]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "BoxBoundsRepr")]
pub struct BoxBounds {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoxBoundsRepr {
    Pair([f64; 3], [f64; 3]),
    Named { min: [f64; 3], max: [f64; 3] },
}

impl From<BoxBoundsRepr> for BoxBounds {
    fn from(repr: BoxBoundsRepr) -> Self {
        match repr {
            BoxBoundsRepr::Pair(min, max) | BoxBoundsRepr::Named { min, max } => {
                BoxBounds { min, max }
            }
        }
    }
}

impl BoxBounds {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    /// The whole space
    pub fn unbounded() -> Self {
        Self::new([f64::NEG_INFINITY; 3], [f64::INFINITY; 3])
    }

    /// `min <= max` on every axis
    pub fn validate(&self) -> Result<()> {
        if self.min.iter().zip(&self.max).all(|(lo, hi)| lo <= hi) {
            Ok(())
        } else {
            Err(Error::ShapeMismatch(format!(
                "box minimum {:?} exceeds maximum {:?}",
                self.min, self.max
            )))
        }
    }

    /// Whether the box is the whole space, making the filter a no-op
    pub fn is_unbounded(&self) -> bool {
        self.min.iter().all(|&v| v == f64::NEG_INFINITY)
            && self.max.iter().all(|&v| v == f64::INFINITY)
    }

    pub fn contains(&self, p: &Point3f) -> bool {
        let coords = [p.x as f64, p.y as f64, p.z as f64];
        (0..3).all(|i| self.min[i] <= coords[i] && coords[i] <= self.max[i])
    }
}

impl Default for BoxBounds {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Interval of distances from the origin, inclusive on both ends.
///
/// Deserializes from `{min, max}` or from the pair form `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RangeBoundsRepr")]
pub struct RangeBounds {
    pub min: f64,
    pub max: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RangeBoundsRepr {
    Pair(f64, f64),
    Named { min: f64, max: f64 },
}

impl From<RangeBoundsRepr> for RangeBounds {
    fn from(repr: RangeBoundsRepr) -> Self {
        match repr {
            RangeBoundsRepr::Pair(min, max) | RangeBoundsRepr::Named { min, max } => {
                RangeBounds { min, max }
            }
        }
    }
}

impl RangeBounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn validate(&self) -> Result<()> {
        if self.min <= self.max {
            Ok(())
        } else {
            Err(Error::InvalidParameter(format!(
                "range minimum {} exceeds maximum {}",
                self.min, self.max
            )))
        }
    }

    /// Ranges with `min <= 0` or an infinite `max` leave the cloud untouched.
    pub fn is_noop(&self) -> bool {
        self.min <= 0.0 || self.max == f64::INFINITY
    }

    pub fn contains(&self, p: &Point3f) -> bool {
        let (x, y, z) = (p.x as f64, p.y as f64, p.z as f64);
        let r = (x * x + y * y + z * z).sqrt();
        self.min <= r && r <= self.max
    }
}

impl Default for RangeBounds {
    fn default() -> Self {
        Self::new(0.0, f64::INFINITY)
    }
}

/// Which point survives in a voxel holding several
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeepPolicy {
    /// Lowest original index
    #[default]
    First,
    /// Highest original index
    Last,
    /// Uniformly chosen with the caller's random source
    Random,
}

impl fmt::Display for KeepPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeepPolicy::First => "first",
            KeepPolicy::Last => "last",
            KeepPolicy::Random => "random",
        };
        f.write_str(name)
    }
}

/// Voxel-grid deduplication parameters.
///
/// A resolution of 0 disables deduplication in the merge pipeline. Deserializes
/// from `{resolution, keep, preserve_order}` or from the pair form
/// `[resolution, keep]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "VoxelParamsRepr")]
pub struct VoxelParams {
    /// Edge length of a voxel
    pub resolution: f64,
    pub keep: KeepPolicy,
    /// Output survivors by original index instead of by cell
    pub preserve_order: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VoxelParamsRepr {
    Pair(f64, KeepPolicy),
    Named {
        resolution: f64,
        #[serde(default)]
        keep: KeepPolicy,
        #[serde(default)]
        preserve_order: bool,
    },
}

impl From<VoxelParamsRepr> for VoxelParams {
    fn from(repr: VoxelParamsRepr) -> Self {
        match repr {
            VoxelParamsRepr::Pair(resolution, keep) => VoxelParams::new(resolution, keep),
            VoxelParamsRepr::Named {
                resolution,
                keep,
                preserve_order,
            } => VoxelParams::new(resolution, keep).with_preserve_order(preserve_order),
        }
    }
}

impl VoxelParams {
    pub fn new(resolution: f64, keep: KeepPolicy) -> Self {
        Self {
            resolution,
            keep,
            preserve_order: false,
        }
    }

    /// Deduplication switched off
    pub fn disabled() -> Self {
        Self::new(0.0, KeepPolicy::First)
    }

    pub fn with_preserve_order(mut self, preserve_order: bool) -> Self {
        self.preserve_order = preserve_order;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.resolution > 0.0
    }

    pub fn validate(&self) -> Result<()> {
        if self.resolution > 0.0 && self.resolution.is_finite() {
            Ok(())
        } else {
            Err(Error::InvalidParameter(format!(
                "voxel resolution must be positive and finite, got {}",
                self.resolution
            )))
        }
    }
}

impl Default for VoxelParams {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Integer cell coordinates of a voxel
pub type VoxelKey = (i64, i64, i64);

/// Cell holding `p` at edge length `resolution`
pub fn voxel_key(p: &Point3f, resolution: f64) -> VoxelKey {
    (
        (p.x as f64 / resolution).floor() as i64,
        (p.y as f64 / resolution).floor() as i64,
        (p.z as f64 / resolution).floor() as i64,
    )
}

fn log_kept(stage: &str, kept: usize, total: usize, detail: fmt::Arguments<'_>) {
    let ratio = if total == 0 {
        1.0
    } else {
        kept as f64 / total as f64
    };
    info!(
        "{}: {:.3} = {} / {} points kept ({})",
        stage, ratio, kept, total, detail
    );
}

/// Box filter, in place.
///
/// Keeps the points inside `bounds` in their original order. The unbounded
/// box only flattens the cloud.
///
/// # Errors
/// `ShapeMismatch` if `bounds.min` exceeds `bounds.max` on any axis.
pub fn box_filter_in_place<T: ScanRecord>(
    cloud: &mut PointCloud<T>,
    bounds: &BoxBounds,
) -> Result<()> {
    bounds.validate()?;
    if bounds.is_unbounded() {
        cloud.grid = None;
        return Ok(());
    }
    let total = cloud.len();
    cloud.retain(|p| bounds.contains(&p.position()));
    log_kept(
        "box filter",
        cloud.len(),
        total,
        format_args!("min {:?}, max {:?}", bounds.min, bounds.max),
    );
    Ok(())
}

/// Box filter returning a new cloud
///
/// # Example
/// ```rust
/// use scanmerge_core::{PointCloud, Point3f};
/// use scanmerge_algorithms::{box_filter, BoxBounds};
///
/// fn main() -> scanmerge_core::Result<()> {
///     let cloud = PointCloud::from_points(vec![
///         Point3f::new(0.5, 0.5, 0.5),
///         Point3f::new(2.0, 0.0, 0.0),
///     ]);
///     let bounds = BoxBounds::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
///     let filtered = box_filter(&cloud, &bounds)?;
///     assert_eq!(filtered.len(), 1);
///     Ok(())
/// }
/// ```
pub fn box_filter<T: ScanRecord>(
    cloud: &PointCloud<T>,
    bounds: &BoxBounds,
) -> Result<PointCloud<T>> {
    bounds.validate()?;
    if bounds.is_unbounded() {
        return Ok(PointCloud::from_points(cloud.points.clone()));
    }
    let filtered: PointCloud<T> = cloud
        .iter()
        .filter(|p| bounds.contains(&p.position()))
        .copied()
        .collect();
    log_kept(
        "box filter",
        filtered.len(),
        cloud.len(),
        format_args!("min {:?}, max {:?}", bounds.min, bounds.max),
    );
    Ok(filtered)
}

/// Range filter, in place.
///
/// Keeps the points whose distance from the origin lies in `range`, in their
/// original order. See [`RangeBounds::is_noop`] for the shortcut.
pub fn range_filter_in_place<T: ScanRecord>(
    cloud: &mut PointCloud<T>,
    range: &RangeBounds,
) -> Result<()> {
    range.validate()?;
    if range.is_noop() {
        cloud.grid = None;
        return Ok(());
    }
    let total = cloud.len();
    cloud.retain(|p| range.contains(&p.position()));
    log_kept(
        "range filter",
        cloud.len(),
        total,
        format_args!("range min {}, max {}", range.min, range.max),
    );
    Ok(())
}

/// Range filter returning a new cloud
pub fn range_filter<T: ScanRecord>(
    cloud: &PointCloud<T>,
    range: &RangeBounds,
) -> Result<PointCloud<T>> {
    range.validate()?;
    if range.is_noop() {
        return Ok(PointCloud::from_points(cloud.points.clone()));
    }
    let filtered: PointCloud<T> = cloud
        .iter()
        .filter(|p| range.contains(&p.position()))
        .copied()
        .collect();
    log_kept(
        "range filter",
        filtered.len(),
        cloud.len(),
        format_args!("range min {}, max {}", range.min, range.max),
    );
    Ok(filtered)
}

/// Indices of the voxel survivors, in output order.
///
/// # Errors
/// `InvalidParameter` for a non-positive resolution, `EmptyInput` for an
/// empty cloud.
pub fn voxel_survivors<T: ScanRecord, R: Rng + ?Sized>(
    points: &[T],
    params: &VoxelParams,
    rng: &mut R,
) -> Result<Vec<usize>> {
    params.validate()?;
    if points.is_empty() {
        return Err(Error::EmptyInput);
    }

    let resolution = params.resolution;
    let keys: Vec<VoxelKey> = points
        .par_iter()
        .map(|p| voxel_key(&p.position(), resolution))
        .collect();

    // cell -> (survivor, points seen)
    let mut cells: HashMap<VoxelKey, (usize, u64)> = HashMap::new();
    for (i, key) in keys.iter().enumerate() {
        let cell = cells.entry(*key).or_insert((i, 0));
        cell.1 += 1;
        match params.keep {
            KeepPolicy::First => {}
            KeepPolicy::Last => cell.0 = i,
            KeepPolicy::Random => {
                // Reservoir sampling keeps each candidate with probability 1/seen.
                if rng.gen_range(0..cell.1) == 0 {
                    cell.0 = i;
                }
            }
        }
    }

    let mut survivors: Vec<(VoxelKey, usize)> =
        cells.into_iter().map(|(key, (i, _))| (key, i)).collect();
    if params.preserve_order {
        survivors.sort_unstable_by_key(|&(_, i)| i);
    } else {
        survivors.sort_unstable_by_key(|&(key, _)| key);
    }
    debug!(
        "voxel grid: {} occupied cells at resolution {}",
        survivors.len(),
        resolution
    );
    Ok(survivors.into_iter().map(|(_, i)| i).collect())
}

/// Voxel-grid filter, in place.
///
/// At most one point survives per occupied cell, chosen by `params.keep`.
/// Output is ordered by cell key, or by original index with
/// `preserve_order`. Deterministic for a fixed input and `rng` state.
///
/// An empty cloud is an error rather than an empty result.
pub fn voxel_grid_filter_in_place<T: ScanRecord, R: Rng + ?Sized>(
    cloud: &mut PointCloud<T>,
    params: &VoxelParams,
    rng: &mut R,
) -> Result<()> {
    let indices = voxel_survivors(&cloud.points, params, rng)?;
    let total = cloud.len();
    *cloud = cloud.select(&indices);
    log_kept(
        "voxel grid",
        cloud.len(),
        total,
        format_args!("grid res. {:.3} m, keep {}", params.resolution, params.keep),
    );
    Ok(())
}

/// Voxel-grid filter returning a new cloud
///
/// # Example
/// ```rust
/// use rand::{rngs::StdRng, SeedableRng};
/// use scanmerge_core::{PointCloud, Point3f};
/// use scanmerge_algorithms::{voxel_grid_filter, KeepPolicy, VoxelParams};
///
/// fn main() -> scanmerge_core::Result<()> {
///     let cloud = PointCloud::from_points(vec![
///         Point3f::new(0.0, 0.0, 0.0),
///         Point3f::new(0.1, 0.0, 0.0),
///         Point3f::new(0.0, 0.1, 0.0),
///         Point3f::new(1.0, 0.0, 0.0),
///     ]);
///     let mut rng = StdRng::seed_from_u64(135);
///     let params = VoxelParams::new(0.5, KeepPolicy::First);
///     let filtered = voxel_grid_filter(&cloud, &params, &mut rng)?;
///     assert_eq!(filtered.len(), 2);
///     Ok(())
/// }
/// ```
pub fn voxel_grid_filter<T: ScanRecord, R: Rng + ?Sized>(
    cloud: &PointCloud<T>,
    params: &VoxelParams,
    rng: &mut R,
) -> Result<PointCloud<T>> {
    let indices = voxel_survivors(&cloud.points, params, rng)?;
    let filtered = cloud.select(&indices);
    log_kept(
        "voxel grid",
        filtered.len(),
        cloud.len(),
        format_args!("grid res. {:.3} m, keep {}", params.resolution, params.keep),
    );
    Ok(filtered)
}

/// [`box_filter_in_place`] over any record layout
pub fn filter_box(cloud: &mut ScanCloud, bounds: &BoxBounds) -> Result<()> {
    scanmerge_core::visit_scan_cloud!(cloud, c => box_filter_in_place(c, bounds))
}

/// [`range_filter_in_place`] over any record layout
pub fn filter_range(cloud: &mut ScanCloud, range: &RangeBounds) -> Result<()> {
    scanmerge_core::visit_scan_cloud!(cloud, c => range_filter_in_place(c, range))
}

/// [`voxel_grid_filter_in_place`] over any record layout
pub fn filter_voxel_grid<R: Rng + ?Sized>(
    cloud: &mut ScanCloud,
    params: &VoxelParams,
    rng: &mut R,
) -> Result<()> {
    scanmerge_core::visit_scan_cloud!(cloud, c => voxel_grid_filter_in_place(c, params, rng))
}
