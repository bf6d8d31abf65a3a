//! Stowage Core: traits and types shared by the stowage backing stores
//!
//! Defines the uniform mapping contract (string keys, byte values) that every
//! backend implements, so a buffering layer can use any of them as its
//! durable tier:
//! - `MappingStore`: get/set/delete/contains/len/iterate/close
//! - `StowageError`: one error taxonomy across backends
//! - Backend configuration (`LmdbConfig`, `ZipConfig`)

pub mod config;
pub mod error;
pub mod observe;
pub mod traits;

pub use config::{ArchiveMode, Compression, LmdbConfig, SyncMode, ZipConfig};
pub use error::{Result, StowageError};
pub use traits::{ItemIter, KeyIter, MappingStore, ValueIter};
