//! Test modules for scanmerge-io
//!
//! File level tests for the PTX codec and cross-format conversion.
