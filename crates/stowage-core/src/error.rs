use crate::config::ArchiveMode;
use std::io;
use thiserror::Error;

/// Boxed error from an underlying storage engine or archive library.
pub type EngineSource = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum StowageError {
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Store is closed")]
    Closed,

    /// Failure reported by the backing engine, passed through unmodified.
    #[error("{backend} error: {source}")]
    Engine {
        backend: &'static str,
        #[source]
        source: EngineSource,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Operation '{operation}' not permitted on a store opened in mode '{mode}'")]
    Mode {
        mode: ArchiveMode,
        operation: &'static str,
    },

    #[error("Key decoding error: {0}")]
    KeyDecode(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StowageError {
    /// Wrap an engine error without translating it.
    pub fn engine<E>(backend: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Engine {
            backend,
            source: Box::new(source),
        }
    }

    pub fn is_key_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound(_))
    }

    /// Downcast the pass-through engine error, if this is one.
    pub fn engine_source<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Self::Engine { source, .. } => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, StowageError>;
