//! Filesystem views over disc readers.
//!
//! A partition is a byte range of a disc reader that holds a filesystem.
//! [`IsoPartition`] understands ISO-9660 and hands out [`PartitionFile`]
//! windows for files in the root directory.

pub mod file;
pub mod iso;

pub use file::PartitionFile;
pub use iso::{DirEntry, IsoPartition, Pvd};
