//! Content integrity module
//!
//! This module provides the checksum primitive shared by both directions
//! of a transfer:
//! - Sources are checksummed before they are shipped to a worker
//! - Produced targets are checksummed again after they land on disk

pub mod checksum;

pub use checksum::{checksum, checksum_file, verify};
