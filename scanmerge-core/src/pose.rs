//! Rigid 4x4 poses and their application to scan records

use nalgebra::{Isometry3, Matrix3, Matrix4, UnitQuaternion, Vector3, Vector4};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::point::{Point3f, ScanRecord, Vector3d};

/// Below this many records the transform runs on the calling thread.
const PARALLEL_MIN_POINTS: usize = 1 << 16;

/// A rigid transformation between two coordinate frames.
///
/// The upper-left 3x3 block is the rotation and the rightmost column holds the
/// translation. Rotations are assumed orthonormal but this is not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub matrix: Matrix4<f64>,
}

impl Pose {
    /// Create an identity pose
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Create a pure translation
    pub fn translation(translation: Vector3d) -> Self {
        Self {
            matrix: Matrix4::new_translation(&translation),
        }
    }

    /// Create a pure rotation from a quaternion
    pub fn rotation(rotation: UnitQuaternion<f64>) -> Self {
        Self {
            matrix: rotation.to_homogeneous(),
        }
    }

    /// Create a pose from translation and rotation
    pub fn from_translation_rotation(translation: Vector3d, rotation: UnitQuaternion<f64>) -> Self {
        let isometry = Isometry3::from_parts(translation.into(), rotation);
        Self {
            matrix: isometry.to_homogeneous(),
        }
    }

    /// Build a pose from its four columns (rotation X, Y, Z, then translation).
    pub fn from_columns(columns: [[f64; 4]; 4]) -> Self {
        let cols = columns.map(Vector4::from);
        Self {
            matrix: Matrix4::from_columns(&cols),
        }
    }

    /// The four columns of the matrix, in order.
    pub fn columns(&self) -> [[f64; 4]; 4] {
        std::array::from_fn(|j| {
            let c = self.matrix.column(j);
            [c[0], c[1], c[2], c[3]]
        })
    }

    /// Build a scanner pose from its registered position and axis vectors.
    ///
    /// `rows` is `[position, x_axis, y_axis, z_axis]`; each axis becomes a column
    /// of the rotation block.
    pub fn from_scanner_rows(rows: [[f64; 3]; 4]) -> Self {
        let mut matrix = Matrix4::identity();
        matrix
            .fixed_view_mut::<3, 1>(0, 3)
            .copy_from(&Vector3::from(rows[0]));
        for axis in 0..3 {
            matrix
                .fixed_view_mut::<3, 1>(0, axis)
                .copy_from(&Vector3::from(rows[axis + 1]));
        }
        Self { matrix }
    }

    /// Inverse of [`Pose::from_scanner_rows`].
    pub fn scanner_rows(&self) -> [[f64; 3]; 4] {
        let column = |j: usize| {
            let c = self.matrix.column(j);
            [c[0], c[1], c[2]]
        };
        [column(3), column(0), column(1), column(2)]
    }

    /// Build from 16 values in row-major order
    pub fn from_row_major(values: &[f64; 16]) -> Self {
        Self {
            matrix: Matrix4::from_row_slice(values),
        }
    }

    /// The 16 matrix values in row-major order
    pub fn to_row_major(&self) -> [f64; 16] {
        std::array::from_fn(|k| self.matrix[(k / 4, k % 4)])
    }

    /// Rotation block
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// Translation column
    pub fn translation_vector(&self) -> Vector3d {
        self.matrix.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// Apply the pose to a position: `R * p + t` in double precision, cast back to `f32`.
    pub fn transform_point(&self, point: &Point3f) -> Point3f {
        let p = point.coords.cast::<f64>();
        let q = self.rotation_matrix() * p + self.translation_vector();
        Point3f::new(q.x as f32, q.y as f32, q.z as f32)
    }

    /// Get the inverse pose
    pub fn inverse(self) -> Option<Self> {
        self.matrix.try_inverse().map(|inv_matrix| Self { matrix: inv_matrix })
    }

    /// Exactly the identity matrix, element for element.
    pub fn is_identity(&self) -> bool {
        self.matrix == Matrix4::identity()
    }

    /// Every element within `epsilon` of `other`
    pub fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.matrix
            .iter()
            .zip(other.matrix.iter())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<Matrix4<f64>> for Pose {
    fn from(matrix: Matrix4<f64>) -> Self {
        Self { matrix }
    }
}

impl From<Isometry3<f64>> for Pose {
    fn from(isometry: Isometry3<f64>) -> Self {
        Self {
            matrix: isometry.to_homogeneous(),
        }
    }
}

/// Apply `pose` to the position of every record in place.
///
/// Non-positional fields are left untouched. The identity pose is a no-op.
pub fn transform_records<T: ScanRecord>(records: &mut [T], pose: &Pose) {
    if pose.is_identity() {
        return;
    }
    let apply = |record: &mut T| {
        let p = pose.transform_point(record.position_mut());
        *record.position_mut() = p;
    };
    if records.len() >= PARALLEL_MIN_POINTS {
        records.par_iter_mut().for_each(apply);
    } else {
        records.iter_mut().for_each(apply);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::ColoredIntensityPoint3f;
    use approx::assert_relative_eq;

    fn sample_pose() -> Pose {
        let rotation = UnitQuaternion::from_euler_angles(0.1, -0.4, 1.2);
        Pose::from_translation_rotation(Vector3d::new(10.0, -2.0, 0.5), rotation)
    }

    #[test]
    fn test_scanner_rows_roundtrip() {
        let rows = [
            [1.0, 2.0, 3.0],
            [0.0, 1.0, 0.0],
            [-1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        let pose = Pose::from_scanner_rows(rows);
        assert_eq!(pose.translation_vector(), Vector3d::new(1.0, 2.0, 3.0));
        // X axis lands in column 0
        assert_eq!(pose.matrix[(1, 0)], 1.0);
        assert_eq!(pose.matrix[(0, 1)], -1.0);
        assert_eq!(pose.matrix[(3, 3)], 1.0);
        assert_eq!(pose.scanner_rows(), rows);
    }

    #[test]
    fn test_columns_roundtrip() {
        let pose = sample_pose();
        let cols = pose.columns();
        assert_eq!(cols[3][0], 10.0);
        assert_eq!(cols[3][3], 1.0);
        assert_eq!(Pose::from_columns(cols), pose);
        assert_eq!(Pose::from_row_major(&pose.to_row_major()), pose);
    }

    #[test]
    fn test_transform_point_translation() {
        let pose = Pose::translation(Vector3d::new(10.0, 0.0, 0.0));
        let p = pose.transform_point(&Point3f::new(1.0, 2.0, 3.0));
        assert_eq!(p, Point3f::new(11.0, 2.0, 3.0));
    }

    #[test]
    fn test_identity_is_noop() {
        let original = vec![
            ColoredIntensityPoint3f {
                position: Point3f::new(0.1, 0.2, 0.3),
                intensity: 0.9,
                color: [4, 5, 6],
            };
            4
        ];
        let mut records = original.clone();
        transform_records(&mut records, &Pose::identity());
        assert_eq!(records, original);
    }

    #[test]
    fn test_transform_then_inverse() {
        let pose = sample_pose();
        let inverse = pose.inverse().unwrap();
        let original: Vec<Point3f> = (0..100)
            .map(|i| Point3f::new(i as f32 * 0.3, -(i as f32), 2.0))
            .collect();
        let mut points = original.clone();
        transform_records(&mut points, &pose);
        transform_records(&mut points, &inverse);
        for (a, b) in original.iter().zip(points.iter()) {
            assert_relative_eq!(a.x, b.x, epsilon = 1e-4);
            assert_relative_eq!(a.y, b.y, epsilon = 1e-4);
            assert_relative_eq!(a.z, b.z, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_transform_keeps_attributes() {
        let mut records = vec![ColoredIntensityPoint3f {
            position: Point3f::new(1.0, 0.0, 0.0),
            intensity: 0.3,
            color: [10, 20, 30],
        }];
        transform_records(&mut records, &sample_pose());
        assert_eq!(records[0].intensity, 0.3);
        assert_eq!(records[0].color, [10, 20, 30]);
    }
}
