//! Point cloud container with optional scan-grid structure

use crate::error::{Error, Result};
use crate::point::*;
use crate::pose::{transform_records, Pose};
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Rows and columns of an organized (scan-line) cloud
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridShape {
    pub rows: usize,
    pub cols: usize,
}

impl GridShape {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Number of cells in the grid
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A generic point cloud container.
///
/// Points are stored row-major. When `grid` is set the cloud keeps the
/// rows x cols structure of the scan it came from; dropping it (see
/// [`PointCloud::flatten`]) is always valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloud<T> {
    pub points: Vec<T>,
    pub grid: Option<GridShape>,
}

/// A point cloud with 3D points
pub type PointCloud3f = PointCloud<Point3f>;

/// A point cloud with intensity
pub type IntensityPointCloud3f = PointCloud<IntensityPoint3f>;

/// A point cloud with intensity and colors
pub type ColoredIntensityPointCloud3f = PointCloud<ColoredIntensityPoint3f>;

impl<T> PointCloud<T> {
    /// Create a new empty point cloud
    pub fn new() -> Self {
        Self {
            points: Vec::new(),
            grid: None,
        }
    }

    /// Create a new point cloud with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            grid: None,
        }
    }

    /// Create a flat point cloud from a vector of points
    pub fn from_points(points: Vec<T>) -> Self {
        Self { points, grid: None }
    }

    /// Create an organized cloud; `points.len()` must equal `rows * cols`
    pub fn from_grid(points: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        let grid = GridShape::new(rows, cols);
        if grid.len() != points.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} points cannot fill a {}x{} grid",
                points.len(),
                rows,
                cols
            )));
        }
        Ok(Self {
            points,
            grid: Some(grid),
        })
    }

    /// Get the number of points in the cloud
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether the cloud still carries its scan-grid shape
    pub fn is_organized(&self) -> bool {
        self.grid.is_some()
    }

    /// Drop the grid shape; the point order is already row-major.
    pub fn flatten(mut self) -> Self {
        self.grid = None;
        self
    }

    /// Point at `(row, col)` of an organized cloud
    pub fn at(&self, row: usize, col: usize) -> Option<&T> {
        let grid = self.grid?;
        if row >= grid.rows || col >= grid.cols {
            return None;
        }
        self.points.get(row * grid.cols + col)
    }

    /// Add a point to the cloud. Pushing into an organized cloud flattens it.
    pub fn push(&mut self, point: T) {
        self.grid = None;
        self.points.push(point);
    }

    /// Get an iterator over the points
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.points.iter()
    }

    /// Get a mutable iterator over the points
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.points.iter_mut()
    }

    /// Clear all points from the cloud
    pub fn clear(&mut self) {
        self.points.clear();
        self.grid = None;
    }

    /// Reserve capacity for additional points
    pub fn reserve(&mut self, additional: usize) {
        self.points.reserve(additional);
    }

    /// Keep the points selected by `keep` in their original order. Flattens.
    pub fn retain<F: FnMut(&T) -> bool>(&mut self, keep: F) {
        self.grid = None;
        self.points.retain(keep);
    }
}

impl<T: Clone> PointCloud<T> {
    /// Flat cloud holding the points at `indices`, in that order
    pub fn select(&self, indices: &[usize]) -> Self {
        Self::from_points(indices.iter().map(|&i| self.points[i].clone()).collect())
    }

    /// Flattened concatenation of `clouds` in order
    pub fn concatenate<I>(clouds: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        let mut merged = Self::new();
        for cloud in clouds {
            merged.points.extend(cloud.points);
        }
        merged
    }
}

impl<T: ScanRecord> PointCloud<T> {
    /// Positions of all points, row-major
    pub fn positions(&self) -> Vec<Point3f> {
        self.points.iter().map(T::position).collect()
    }

    /// Apply a pose to all points in place
    pub fn transform(&mut self, pose: &Pose) {
        transform_records(&mut self.points, pose);
    }

    /// Transformed copy; `self` is left untouched
    pub fn transformed(&self, pose: &Pose) -> Self {
        let mut copy = self.clone();
        copy.transform(pose);
        copy
    }

    /// Dense row-major `f32` fields, `T::WIDTH` per point
    pub fn to_fields(&self) -> Vec<f32> {
        let mut fields = Vec::with_capacity(self.len() * T::WIDTH);
        for point in &self.points {
            point.extend_fields(&mut fields);
        }
        fields
    }

    /// Inverse of [`PointCloud::to_fields`]
    pub fn from_fields(fields: &[f32]) -> Result<Self> {
        if fields.len() % T::WIDTH != 0 {
            return Err(Error::ShapeMismatch(format!(
                "{} values is not a multiple of the record width {}",
                fields.len(),
                T::WIDTH
            )));
        }
        Ok(Self::from_points(
            fields.chunks_exact(T::WIDTH).map(T::from_fields).collect(),
        ))
    }
}

impl<T> Default for PointCloud<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<usize> for PointCloud<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

impl<T> IndexMut<usize> for PointCloud<T> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.points[index]
    }
}

impl<T> IntoIterator for PointCloud<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a PointCloud<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

impl<T> Extend<T> for PointCloud<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.grid = None;
        self.points.extend(iter);
    }
}

impl<T> FromIterator<T> for PointCloud<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_points(Vec::from_iter(iter))
    }
}
