use crate::error::{Result, StowageError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the LMDB-backed store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmdbConfig {
    /// Directory holding the LMDB data and lock files
    pub path: PathBuf,

    /// Maximum map size for LMDB (in bytes)
    ///
    /// Fixed for the lifetime of the open store. Defaults to 1 TiB on 64 bit
    /// systems and 1 GiB on 32 bit ones. On Windows the map is preallocated on
    /// disk, so the default there is only 10 MiB.
    #[serde(default = "default_map_size")]
    pub map_size: usize,

    /// Sync mode for durability
    #[serde(default)]
    pub sync_mode: SyncMode,

    /// Use a writable memory map (default: true)
    #[serde(default = "default_true")]
    pub write_map: bool,

    /// Maximum number of concurrent read transactions
    /// Default: 126
    #[serde(default = "default_max_readers")]
    pub max_readers: u32,

    /// Entries pulled from the cursor per iterator refill (default: 1000)
    ///
    /// Iterators keep a single read transaction open and buffer this many
    /// entries at a time, so memory stays bounded on large stores.
    #[serde(default = "default_chunk_size")]
    pub iter_chunk_size: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Full durability – calls `fsync()` on every commit.
    Full,

    /// Skips syncing the LMDB meta-page on each commit.
    ///
    /// The last transaction may be lost on an OS crash but the database stays
    /// consistent.
    NoMetaSync,

    /// Disables `fsync()` entirely – the OS page cache decides when to flush (default).
    ///
    /// Spilled data is expected to be ephemeral, so commits favour
    /// throughput. Call `flush()` on the store to force a sync.
    #[default]
    NoSync,
}

fn default_map_size() -> usize {
    if cfg!(windows) {
        10 * 1024 * 1024
    } else {
        let limit = (usize::MAX / 4) as u64;
        (1u64 << 40).min(limit) as usize
    }
}

fn default_true() -> bool {
    true
}

fn default_max_readers() -> u32 {
    126
}

fn default_chunk_size() -> usize {
    1000
}

impl LmdbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            map_size: default_map_size(),
            sync_mode: SyncMode::default(),
            write_map: default_true(),
            max_readers: default_max_readers(),
            iter_chunk_size: default_chunk_size(),
        }
    }

    pub fn with_map_size(mut self, map_size: usize) -> Self {
        self.map_size = map_size;
        self
    }

    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }

    pub fn with_write_map(mut self, write_map: bool) -> Self {
        self.write_map = write_map;
        self
    }

    pub fn with_max_readers(mut self, max_readers: u32) -> Self {
        self.max_readers = max_readers;
        self
    }

    pub fn with_iter_chunk_size(mut self, chunk_size: usize) -> Self {
        self.iter_chunk_size = chunk_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.map_size == 0 {
            return Err(StowageError::Config("map_size must be non-zero".into()));
        }
        if self.iter_chunk_size == 0 {
            return Err(StowageError::Config(
                "iter_chunk_size must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = LmdbConfig::new("/tmp/spill");
        assert_eq!(cfg.sync_mode, SyncMode::NoSync);
        assert!(cfg.write_map);
        assert_eq!(cfg.max_readers, 126);
        assert_eq!(cfg.iter_chunk_size, 1000);

        #[cfg(all(not(windows), target_pointer_width = "64"))]
        assert_eq!(cfg.map_size, 1 << 40);
        #[cfg(windows)]
        assert_eq!(cfg.map_size, 10 * 1024 * 1024);
    }

    #[test]
    fn test_serde_fills_defaults() {
        let cfg: LmdbConfig = serde_json::from_str(r#"{"path": "/tmp/spill"}"#).unwrap();
        assert_eq!(cfg.map_size, default_map_size());
        assert_eq!(cfg.sync_mode, SyncMode::NoSync);

        let cfg: LmdbConfig =
            serde_json::from_str(r#"{"path": "/tmp/spill", "sync_mode": "Full"}"#).unwrap();
        assert_eq!(cfg.sync_mode, SyncMode::Full);
    }

    #[test]
    fn test_validate() {
        assert!(LmdbConfig::new("/tmp/x").validate().is_ok());
        assert!(LmdbConfig::new("/tmp/x").with_map_size(0).validate().is_err());
        assert!(LmdbConfig::new("/tmp/x")
            .with_iter_chunk_size(0)
            .validate()
            .is_err());
    }
}
