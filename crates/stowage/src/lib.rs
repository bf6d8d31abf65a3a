//! Stowage: interchangeable persistent key-value backing stores
//!
//! Two adapters expose the same mutable-mapping contract (string keys, byte
//! values) over structurally different media, for use as the slow tier of a
//! buffering or eviction layer:
//! - **`LmdbStore`**: embedded transactional, memory-mapped engine (LMDB)
//! - **`ZipStore`**: flat, append-only ZIP archive file
//!
//! # Quick Start
//!
//! ```no_run
//! use stowage::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let store = LmdbStore::open_path("./spill")?;
//! store.set("x", b"123")?;
//! assert_eq!(store.get("x")?, b"123");
//!
//! let mut archive = ZipStore::open("./spill.zip", ArchiveMode::Append);
//! archive.set("x", b"123")?;
//! archive.flush()?; // write the archive directory to disk
//! archive.close()?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod prelude;

// Re-export core types
pub use stowage_core::{
    config::{ArchiveMode, Compression, LmdbConfig, SyncMode, ZipConfig},
    error::{Result, StowageError},
    traits::{ItemIter, KeyIter, MappingStore, ValueIter},
};

// Re-export implementations
pub use stowage_lmdb::{LmdbIter, LmdbReadTxn, LmdbStore, LmdbWriteTxn};
pub use stowage_zip::{StoreState, ZipStore};

pub use backend::{open_store, StoreConfig};

/// Store over an embedded transactional engine
pub type TransactionalStore = LmdbStore;

/// Store over a flat archive file
pub type ArchiveStore = ZipStore;
