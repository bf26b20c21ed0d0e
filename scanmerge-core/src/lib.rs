//! Core data structures and traits for scanmerge
//!
//! This crate provides the fundamental types for terrestrial laser scan
//! processing: fixed-layout scan records, point clouds that may keep their
//! scan-grid structure, rigid poses, and scan frames.

pub mod point;
pub mod point_cloud;
pub mod scan_cloud;
pub mod frame;
pub mod traits;
pub mod pose;
pub mod error;

pub use point::*;
pub use point_cloud::*;
pub use scan_cloud::*;
pub use frame::*;
pub use traits::*;
pub use pose::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Isometry3, Matrix3, Matrix4, Point3, UnitQuaternion, Vector3};
