//! Stowage Prelude
//!
//! Import this to get all commonly used types and traits:
//!
//! ```
//! use stowage::prelude::*;
//! ```

// Core types
pub use crate::{Result, StowageError};

// Configs
pub use crate::{ArchiveMode, Compression, LmdbConfig, StoreConfig, SyncMode, ZipConfig};

// Traits
pub use crate::MappingStore;

// Implementations
pub use crate::{open_store, LmdbStore, StoreState, ZipStore};
