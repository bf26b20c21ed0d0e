//! I/O operations for laser scan clouds
//!
//! This crate reads and writes PTX scans and NumPy cloud archives, and loads
//! any of them as a [`CloudBundle`] picked by file extension.

pub mod archive;
pub mod bundle;
pub mod format;
pub mod ptx;

pub use archive::{cloud_from_array, cloud_to_array, pose_from_array, pose_to_array};
pub use bundle::{read_cloud, write_cloud, CloudBundle};
pub use format::FileFormat;
pub use ptx::{
    read_ptx, read_ptx_header, read_ptx_merged, write_ptx, PtxHeader, PtxReadOptions, PtxReader,
    PtxScan, PtxWriter,
};

#[cfg(test)]
mod tests;
