//! Backend selection
//!
//! Picks a concrete store from configuration so a buffering layer can hold
//! any backend as a `Box<dyn MappingStore>`.

use crate::{LmdbConfig, LmdbStore, MappingStore, Result, ZipConfig, ZipStore};
use serde::{Deserialize, Serialize};

/// Configuration for one of the available backends
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    Lmdb(LmdbConfig),
    Zip(ZipConfig),
}

impl StoreConfig {
    pub fn backend_name(&self) -> &'static str {
        match self {
            StoreConfig::Lmdb(_) => "lmdb",
            StoreConfig::Zip(_) => "zip",
        }
    }
}

impl From<LmdbConfig> for StoreConfig {
    fn from(cfg: LmdbConfig) -> Self {
        StoreConfig::Lmdb(cfg)
    }
}

impl From<ZipConfig> for StoreConfig {
    fn from(cfg: ZipConfig) -> Self {
        StoreConfig::Zip(cfg)
    }
}

/// Open the configured backend
///
/// The LMDB environment is opened immediately; the ZIP archive is opened
/// lazily on first use.
pub fn open_store(config: impl Into<StoreConfig>) -> Result<Box<dyn MappingStore + Send>> {
    let config = config.into();
    tracing::debug!(backend = config.backend_name(), "Opening backing store");

    match config {
        StoreConfig::Lmdb(cfg) => Ok(Box::new(LmdbStore::open(cfg)?)),
        StoreConfig::Zip(cfg) => Ok(Box::new(ZipStore::new(cfg))),
    }
}
