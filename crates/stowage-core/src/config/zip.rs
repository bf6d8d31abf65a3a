use crate::error::StowageError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// File mode a ZIP store is opened with.
///
/// Parses from and displays as the conventional single-letter codes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ArchiveMode {
    /// `r`: existing archive, reads only
    Read,
    /// `w`: truncate (or create) on first access
    Write,
    /// `x`: create, failing if the file already exists
    Exclusive,
    /// `a`: append to an existing archive, creating it if missing (default)
    #[default]
    Append,
}

impl ArchiveMode {
    pub fn is_writable(self) -> bool {
        !matches!(self, ArchiveMode::Read)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArchiveMode::Read => "r",
            ArchiveMode::Write => "w",
            ArchiveMode::Exclusive => "x",
            ArchiveMode::Append => "a",
        }
    }
}

impl fmt::Display for ArchiveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchiveMode {
    type Err = StowageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "r" => Ok(ArchiveMode::Read),
            "w" => Ok(ArchiveMode::Write),
            "x" => Ok(ArchiveMode::Exclusive),
            "a" => Ok(ArchiveMode::Append),
            other => Err(StowageError::Config(format!(
                "unknown archive mode '{}', expected one of r, w, x, a",
                other
            ))),
        }
    }
}

/// How member bytes are stored inside the archive
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Compression {
    /// Values stored verbatim (default)
    #[default]
    Stored,
    Deflated,
}

/// Configuration for the ZIP-backed store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZipConfig {
    /// Archive file path
    pub path: PathBuf,

    #[serde(default)]
    pub mode: ArchiveMode,

    #[serde(default)]
    pub compression: Compression,

    /// fsync the archive file on every flush (default: false)
    #[serde(default)]
    pub sync_on_flush: bool,
}

impl ZipConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: ArchiveMode::default(),
            compression: Compression::default(),
            sync_on_flush: false,
        }
    }

    pub fn with_mode(mut self, mode: ArchiveMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_sync_on_flush(mut self, sync: bool) -> Self {
        self.sync_on_flush = sync;
        self
    }
}
