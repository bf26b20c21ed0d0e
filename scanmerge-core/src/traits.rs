//! Core traits for scanmerge

use crate::{point::*, point_cloud::*, scan_cloud::ScanCloud};

/// Trait for objects with an axis-aligned extent
pub trait Bounded {
    /// Minimum and maximum corner, `None` when there is nothing to bound
    fn bounding_box(&self) -> Option<(Point3f, Point3f)>;

    /// Center of the bounding box
    fn center(&self) -> Option<Point3f> {
        let (min, max) = self.bounding_box()?;
        Some(Point3f::new(
            (min.x + max.x) / 2.0,
            (min.y + max.y) / 2.0,
            (min.z + max.z) / 2.0,
        ))
    }
}

impl<T: ScanRecord> Bounded for PointCloud<T> {
    fn bounding_box(&self) -> Option<(Point3f, Point3f)> {
        let first = self.points.first()?.position();
        let mut min = first;
        let mut max = first;

        for point in &self.points {
            let p = point.position();
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);

            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }

        Some((min, max))
    }
}

impl Bounded for ScanCloud {
    fn bounding_box(&self) -> Option<(Point3f, Point3f)> {
        crate::visit_scan_cloud!(self, c => c.bounding_box())
    }
}
