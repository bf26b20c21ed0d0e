//! Scan cloud: a point cloud whose record layout is chosen at parse time

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::point::*;
use crate::point_cloud::{GridShape, PointCloud};
use crate::pose::Pose;

/// A point cloud of one of the three supported record layouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScanCloud {
    Xyz(PointCloud<Point3f>),
    XyzIntensity(PointCloud<IntensityPoint3f>),
    XyzIntensityRgb(PointCloud<ColoredIntensityPoint3f>),
}

/// Evaluate `$body` with `$cloud` bound to the inner `PointCloud<T>` of a
/// [`ScanCloud`], whatever its layout.
#[macro_export]
macro_rules! visit_scan_cloud {
    ($scan:expr, $cloud:ident => $body:expr) => {
        match $scan {
            $crate::ScanCloud::Xyz($cloud) => $body,
            $crate::ScanCloud::XyzIntensity($cloud) => $body,
            $crate::ScanCloud::XyzIntensityRgb($cloud) => $body,
        }
    };
}

/// Like [`visit_scan_cloud!`] but re-wraps the resulting `PointCloud<T>` in the
/// same layout variant.
#[macro_export]
macro_rules! map_scan_cloud {
    ($scan:expr, $cloud:ident => $body:expr) => {
        match $scan {
            $crate::ScanCloud::Xyz($cloud) => $crate::ScanCloud::Xyz($body),
            $crate::ScanCloud::XyzIntensity($cloud) => $crate::ScanCloud::XyzIntensity($body),
            $crate::ScanCloud::XyzIntensityRgb($cloud) => $crate::ScanCloud::XyzIntensityRgb($body),
        }
    };
}

impl ScanCloud {
    /// Empty flat cloud of the given layout
    pub fn empty(layout: PointLayout) -> Self {
        match layout {
            PointLayout::Xyz => ScanCloud::Xyz(PointCloud::new()),
            PointLayout::XyzIntensity => ScanCloud::XyzIntensity(PointCloud::new()),
            PointLayout::XyzIntensityRgb => ScanCloud::XyzIntensityRgb(PointCloud::new()),
        }
    }

    /// Record layout of the points
    pub fn layout(&self) -> PointLayout {
        match self {
            ScanCloud::Xyz(_) => PointLayout::Xyz,
            ScanCloud::XyzIntensity(_) => PointLayout::XyzIntensity,
            ScanCloud::XyzIntensityRgb(_) => PointLayout::XyzIntensityRgb,
        }
    }

    /// Values per record
    pub fn width(&self) -> usize {
        self.layout().width()
    }

    pub fn len(&self) -> usize {
        visit_scan_cloud!(self, c => c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scan-grid shape, if the cloud is still organized
    pub fn grid(&self) -> Option<GridShape> {
        visit_scan_cloud!(self, c => c.grid)
    }

    /// Drop the grid shape
    pub fn flatten(self) -> Self {
        map_scan_cloud!(self, c => c.flatten())
    }

    /// Positions of all points, row-major
    pub fn positions(&self) -> Vec<Point3f> {
        visit_scan_cloud!(self, c => c.positions())
    }

    /// Intensity per point, if the layout carries it
    pub fn intensities(&self) -> Option<Vec<f32>> {
        match self {
            ScanCloud::Xyz(_) => None,
            ScanCloud::XyzIntensity(c) => Some(c.iter().map(|p| p.intensity).collect()),
            ScanCloud::XyzIntensityRgb(c) => Some(c.iter().map(|p| p.intensity).collect()),
        }
    }

    /// RGB per point, if the layout carries it
    pub fn colors(&self) -> Option<Vec<[u8; 3]>> {
        match self {
            ScanCloud::XyzIntensityRgb(c) => Some(c.iter().map(|p| p.color).collect()),
            _ => None,
        }
    }

    /// Apply a pose to all positions in place
    pub fn transform(&mut self, pose: &Pose) {
        visit_scan_cloud!(self, c => c.transform(pose))
    }

    /// Transformed copy; `self` is left untouched
    pub fn transformed(&self, pose: &Pose) -> Self {
        map_scan_cloud!(self, c => c.transformed(pose))
    }

    /// Flatten and concatenate `clouds` in order.
    ///
    /// All clouds must share one layout.
    pub fn concatenate(clouds: Vec<ScanCloud>) -> Result<Self> {
        let layout = match clouds.first() {
            Some(first) => first.layout(),
            None => return Err(Error::EmptyInput),
        };
        if let Some(other) = clouds.iter().find(|c| c.layout() != layout) {
            return Err(Error::ShapeMismatch(format!(
                "cannot concatenate {} cloud with {} cloud",
                layout,
                other.layout()
            )));
        }
        let merged = match layout {
            PointLayout::Xyz => ScanCloud::Xyz(PointCloud::concatenate(
                clouds.into_iter().filter_map(|c| match c {
                    ScanCloud::Xyz(c) => Some(c),
                    _ => None,
                }),
            )),
            PointLayout::XyzIntensity => ScanCloud::XyzIntensity(PointCloud::concatenate(
                clouds.into_iter().filter_map(|c| match c {
                    ScanCloud::XyzIntensity(c) => Some(c),
                    _ => None,
                }),
            )),
            PointLayout::XyzIntensityRgb => ScanCloud::XyzIntensityRgb(PointCloud::concatenate(
                clouds.into_iter().filter_map(|c| match c {
                    ScanCloud::XyzIntensityRgb(c) => Some(c),
                    _ => None,
                }),
            )),
        };
        Ok(merged)
    }

    /// Dense row-major `f32` fields, [`ScanCloud::width`] per point
    pub fn to_fields(&self) -> Vec<f32> {
        visit_scan_cloud!(self, c => c.to_fields())
    }

    /// Build a flat cloud from dense fields with `width` values per record.
    pub fn from_fields(width: usize, fields: &[f32]) -> Result<Self> {
        let cloud = match PointLayout::from_width(width)? {
            PointLayout::Xyz => ScanCloud::Xyz(PointCloud::from_fields(fields)?),
            PointLayout::XyzIntensity => ScanCloud::XyzIntensity(PointCloud::from_fields(fields)?),
            PointLayout::XyzIntensityRgb => {
                ScanCloud::XyzIntensityRgb(PointCloud::from_fields(fields)?)
            }
        };
        Ok(cloud)
    }

    /// Restore a grid shape on a flat cloud
    pub fn with_grid(self, rows: usize, cols: usize) -> Result<Self> {
        let cloud = match self {
            ScanCloud::Xyz(c) => ScanCloud::Xyz(PointCloud::from_grid(c.points, rows, cols)?),
            ScanCloud::XyzIntensity(c) => {
                ScanCloud::XyzIntensity(PointCloud::from_grid(c.points, rows, cols)?)
            }
            ScanCloud::XyzIntensityRgb(c) => {
                ScanCloud::XyzIntensityRgb(PointCloud::from_grid(c.points, rows, cols)?)
            }
        };
        Ok(cloud)
    }
}

impl From<PointCloud<Point3f>> for ScanCloud {
    fn from(cloud: PointCloud<Point3f>) -> Self {
        ScanCloud::Xyz(cloud)
    }
}

impl From<PointCloud<IntensityPoint3f>> for ScanCloud {
    fn from(cloud: PointCloud<IntensityPoint3f>) -> Self {
        ScanCloud::XyzIntensity(cloud)
    }
}

impl From<PointCloud<ColoredIntensityPoint3f>> for ScanCloud {
    fn from(cloud: PointCloud<ColoredIntensityPoint3f>) -> Self {
        ScanCloud::XyzIntensityRgb(cloud)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intensity_cloud(xs: &[f32]) -> ScanCloud {
        ScanCloud::from(PointCloud::from_points(
            xs.iter()
                .map(|&x| IntensityPoint3f {
                    position: Point3f::new(x, 0.0, 0.0),
                    intensity: 0.5,
                })
                .collect::<Vec<_>>(),
        ))
    }

    #[test]
    fn test_concatenate_same_layout() {
        let merged =
            ScanCloud::concatenate(vec![intensity_cloud(&[1.0, 2.0]), intensity_cloud(&[3.0])])
                .unwrap();
        assert_eq!(merged.layout(), PointLayout::XyzIntensity);
        let xs: Vec<f32> = merged.positions().iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_concatenate_layout_mismatch() {
        let xyz = ScanCloud::from(PointCloud::from_points(vec![Point3f::origin()]));
        let result = ScanCloud::concatenate(vec![intensity_cloud(&[1.0]), xyz]);
        assert!(matches!(result, Err(Error::ShapeMismatch(_))));
    }

    #[test]
    fn test_from_fields_width() {
        let cloud = ScanCloud::from_fields(7, &[1.0, 2.0, 3.0, 0.5, 10.0, 20.0, 30.0]).unwrap();
        assert_eq!(cloud.colors().unwrap(), vec![[10, 20, 30]]);
        assert!(matches!(
            ScanCloud::from_fields(5, &[0.0; 5]),
            Err(Error::UnsupportedFieldWidth(5))
        ));
    }

    #[test]
    fn test_with_grid_and_flatten() {
        let cloud = intensity_cloud(&[1.0, 2.0, 3.0, 4.0]).with_grid(2, 2).unwrap();
        assert_eq!(cloud.grid(), Some(GridShape::new(2, 2)));
        assert_eq!(cloud.flatten().grid(), None);
    }
}
