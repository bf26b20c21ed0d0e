//! # scanmerge algorithms
//!
//! Spatial filters and the parallel merge pipeline for laser scan clouds.
//!
//! Filters select points by an axis-aligned box, by distance from the origin
//! or by voxel cell. [`merge_clouds`] runs them per source on a worker pool,
//! aligns each source with its pose and deduplicates the union.

pub mod filtering;
pub mod merge;
pub mod parallel;

// Re-export commonly used items
pub use filtering::*;
pub use merge::*;
pub use parallel::*;
