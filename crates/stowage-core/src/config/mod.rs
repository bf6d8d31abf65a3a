pub mod lmdb;
pub mod zip;

pub use lmdb::{LmdbConfig, SyncMode};
pub use zip::{ArchiveMode, Compression, ZipConfig};
