use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;
use stowage_core::{
    config::{ArchiveMode, Compression},
    error::{Result, StowageError},
    observe,
    traits::{ItemIter, KeyIter, MappingStore, ValueIter},
    ZipConfig,
};
use zip::{result::ZipError, write::FileOptions, CompressionMethod, ZipArchive, ZipWriter};

const BACKEND: &str = "zip";

fn zip_err(e: ZipError) -> StowageError {
    StowageError::engine(BACKEND, e)
}

/// Lifecycle state of a `ZipStore`
///
/// A store starts `Open` in its construction mode and stays there across
/// flushes. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Open(ArchiveMode),
    Closed,
}

/// Mutable state behind the store: lifecycle plus the lazily created handle.
///
/// At most one of `reader` / `writer` is set at any time.
struct Inner {
    state: StoreState,
    /// Whether the archive file has been opened at least once, i.e. the
    /// mode's create/truncate semantics have already been applied
    opened: bool,
    reader: Option<ZipArchive<File>>,
    writer: Option<ZipWriter<File>>,
}

impl Inner {
    fn mode(&self) -> Result<ArchiveMode> {
        match self.state {
            StoreState::Open(mode) => Ok(mode),
            StoreState::Closed => Err(StowageError::Closed),
        }
    }

    fn has_handle(&self) -> bool {
        self.reader.is_some() || self.writer.is_some()
    }
}

/// Mapping store over a single ZIP archive
///
/// Keys are member names (a flat namespace), values are member contents.
/// The file is not touched until first use. The archive format is
/// append-only, which shapes the contract:
/// - `delete` always fails with `Unsupported`
/// - `set` on an existing key appends a second member of the same name;
///   `get` returns the newest one while iteration and `len` list every member
///
/// The zip library cannot read through a writer, so reads on a writable store
/// finish the pending writer (writing the central directory) and reopen the
/// file for reading, and writes after reads reopen it in append mode.
///
/// Not internally synchronized: a store is `Send` but not `Sync`.
pub struct ZipStore {
    config: ZipConfig,
    inner: RefCell<Inner>,
}

impl ZipStore {
    /// Create a store over `config.path` without touching the file yet
    pub fn new(config: ZipConfig) -> Self {
        let state = StoreState::Open(config.mode);
        Self {
            config,
            inner: RefCell::new(Inner {
                state,
                opened: false,
                reader: None,
                writer: None,
            }),
        }
    }

    /// Store over `path` opened in `mode` with default settings
    pub fn open(path: impl AsRef<Path>, mode: ArchiveMode) -> Self {
        Self::new(ZipConfig::new(path.as_ref()).with_mode(mode))
    }

    pub fn config(&self) -> &ZipConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn state(&self) -> StoreState {
        self.inner.borrow().state
    }

    pub fn is_closed(&self) -> bool {
        self.state() == StoreState::Closed
    }

    fn file_options(&self, len: usize) -> FileOptions {
        let method = match self.config.compression {
            Compression::Stored => CompressionMethod::Stored,
            Compression::Deflated => CompressionMethod::Deflated,
        };
        FileOptions::default()
            .compression_method(method)
            .large_file(len as u64 >= u32::MAX as u64)
    }

    /// Open a writer according to the mode.
    ///
    /// Only the first open applies `Write` truncation or the `Exclusive`
    /// existence check; reopens after a flush append to what is there.
    fn open_writer(&self, mode: ArchiveMode, reopen: bool) -> Result<ZipWriter<File>> {
        let path = &self.config.path;
        let writer = match (mode, reopen) {
            (ArchiveMode::Write, false) => ZipWriter::new(File::create(path)?),
            (ArchiveMode::Exclusive, false) => ZipWriter::new(
                OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create_new(true)
                    .open(path)?,
            ),
            _ => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .open(path)?;
                if file.metadata()?.len() == 0 {
                    ZipWriter::new(file)
                } else {
                    ZipWriter::new_append(file).map_err(zip_err)?
                }
            }
        };

        observe::record_handle_open(BACKEND);
        tracing::debug!(path = %path.display(), %mode, reopen, "Opened archive for writing");
        Ok(writer)
    }

    /// Write the central directory and release the file
    fn finish_writer(&self, mut writer: ZipWriter<File>, sync: bool) -> Result<()> {
        let mut file = writer.finish().map_err(zip_err)?;
        file.flush()?;
        if sync {
            file.sync_all()?;
        }
        Ok(())
    }

    /// Guarded initializer for the read handle
    fn reader<'a>(&self, inner: &'a mut Inner) -> Result<&'a mut ZipArchive<File>> {
        let mode = inner.mode()?;
        let reader = match inner.reader.take() {
            Some(reader) => reader,
            None => {
                if let Some(writer) = inner.writer.take() {
                    self.finish_writer(writer, false)?;
                } else if mode.is_writable() && !inner.opened {
                    let writer = self.open_writer(mode, false)?;
                    self.finish_writer(writer, false)?;
                }
                inner.opened = true;

                let file = File::open(&self.config.path)?;
                let archive = ZipArchive::new(file).map_err(zip_err)?;
                observe::record_handle_open(BACKEND);
                tracing::debug!(
                    path = %self.config.path.display(),
                    members = archive.len(),
                    "Opened archive for reading"
                );
                archive
            }
        };
        Ok(inner.reader.insert(reader))
    }

    /// Guarded initializer for the write handle
    fn writer<'a>(
        &self,
        inner: &'a mut Inner,
        operation: &'static str,
    ) -> Result<&'a mut ZipWriter<File>> {
        let mode = inner.mode()?;
        if !mode.is_writable() {
            return Err(StowageError::Mode { mode, operation });
        }

        let writer = match inner.writer.take() {
            Some(writer) => writer,
            None => {
                inner.reader = None;
                let writer = self.open_writer(mode, inner.opened)?;
                inner.opened = true;
                writer
            }
        };
        Ok(inner.writer.insert(writer))
    }

    /// Member names in archive order, duplicates included
    pub fn member_names(&self) -> Result<Vec<String>> {
        let mut inner = self.inner.borrow_mut();
        let reader = self.reader(&mut inner)?;
        (0..reader.len())
            .map(|index| {
                reader
                    .by_index_raw(index)
                    .map(|member| member.name().to_string())
                    .map_err(zip_err)
            })
            .collect()
    }

    /// Read the member at `index` in archive order
    pub fn read_index(&self, index: usize) -> Result<Vec<u8>> {
        let mut inner = self.inner.borrow_mut();
        let reader = self.reader(&mut inner)?;
        let mut member = reader.by_index(index).map_err(zip_err)?;
        let mut buf = Vec::with_capacity(member.size() as usize);
        member.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl MappingStore for ZipStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        observe::timed(BACKEND, "get", || {
            let mut inner = self.inner.borrow_mut();
            let reader = self.reader(&mut inner)?;
            let mut member = match reader.by_name(key) {
                Ok(member) => member,
                Err(ZipError::FileNotFound) => {
                    return Err(StowageError::KeyNotFound(key.to_string()))
                }
                Err(e) => return Err(zip_err(e)),
            };
            let mut buf = Vec::with_capacity(member.size() as usize);
            member.read_to_end(&mut buf)?;
            Ok(buf)
        })
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        observe::timed(BACKEND, "set", || {
            let options = self.file_options(value.len());
            let mut inner = self.inner.borrow_mut();
            let writer = self.writer(&mut inner, "set")?;
            writer.start_file(key, options).map_err(zip_err)?;
            writer.write_all(value)?;
            Ok(())
        })
    }

    /// Always fails: members cannot be removed from a ZIP archive
    fn delete(&self, key: &str) -> Result<()> {
        self.inner.borrow().mode()?;
        Err(StowageError::Unsupported(format!(
            "cannot delete '{}': ZIP archives do not support removing members",
            key
        )))
    }

    fn contains(&self, key: &str) -> Result<bool> {
        let mut inner = self.inner.borrow_mut();
        let reader = self.reader(&mut inner)?;
        let found = reader.file_names().any(|name| name == key);
        Ok(found)
    }

    fn len(&self) -> Result<usize> {
        let mut inner = self.inner.borrow_mut();
        Ok(self.reader(&mut inner)?.len())
    }

    fn keys(&self) -> Result<KeyIter<'_>> {
        Ok(Box::new(self.member_names()?.into_iter().map(Ok)))
    }

    fn values(&self) -> Result<ValueIter<'_>> {
        let count = self.len()?;
        Ok(Box::new((0..count).map(move |index| self.read_index(index))))
    }

    fn items(&self) -> Result<ItemIter<'_>> {
        let names = self.member_names()?;
        Ok(Box::new(names.into_iter().enumerate().map(
            move |(index, name)| Ok((name, self.read_index(index)?)),
        )))
    }

    /// Write pending directory metadata and release the handle
    ///
    /// The store stays open; the next operation reopens the file lazily.
    fn flush(&self) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.state == StoreState::Closed {
            return Ok(());
        }

        inner.reader = None;
        if let Some(writer) = inner.writer.take() {
            self.finish_writer(writer, self.config.sync_on_flush)?;
            tracing::debug!(path = %self.config.path.display(), "Flushed archive");
        }
        Ok(())
    }

    /// Flush, then move to the terminal `Closed` state
    fn close(&mut self) -> Result<()> {
        let flushed = self.flush();
        let inner = self.inner.get_mut();
        if inner.state != StoreState::Closed {
            inner.state = StoreState::Closed;
            tracing::debug!(path = %self.config.path.display(), "Closed archive store");
        }
        flushed
    }
}

impl Drop for ZipStore {
    fn drop(&mut self) {
        if self.inner.get_mut().has_handle() {
            if let Err(e) = self.close() {
                tracing::warn!(
                    path = %self.config.path.display(),
                    error = %e,
                    "Failed to flush archive on drop"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn archive_path() -> (std::path::PathBuf, TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        (temp_dir.path().join("spill.zip"), temp_dir)
    }

    #[test]
    fn test_set_flush_reopen_read() {
        let (path, _temp) = archive_path();

        let store = ZipStore::open(&path, ArchiveMode::Append);
        store.set("f", b"x").unwrap();
        store.flush().unwrap();

        let reader = ZipStore::open(&path, ArchiveMode::Read);
        assert_eq!(reader.get("f").unwrap(), b"x");
    }

    #[test]
    fn test_lazy_open_does_not_touch_file() {
        let (path, _temp) = archive_path();
        let store = ZipStore::open(&path, ArchiveMode::Write);
        assert_eq!(store.state(), StoreState::Open(ArchiveMode::Write));
        assert!(!path.exists());
        drop(store);
        assert!(!path.exists());
    }

    #[test]
    fn test_get_missing_key() {
        let (path, _temp) = archive_path();
        let store = ZipStore::open(&path, ArchiveMode::Append);
        store.set("a", b"1").unwrap();

        let err = store.get("b").unwrap_err();
        assert!(matches!(err, StowageError::KeyNotFound(ref k) if k == "b"));
    }

    #[test]
    fn test_read_after_write_without_flush() {
        let (path, _temp) = archive_path();
        let store = ZipStore::open(&path, ArchiveMode::Write);

        store.set("a", b"1").unwrap();
        assert_eq!(store.get("a").unwrap(), b"1");
        store.set("b", b"2").unwrap();
        assert_eq!(store.get("b").unwrap(), b"2");
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_delete_is_unsupported() {
        let (path, _temp) = archive_path();
        let store = ZipStore::open(&path, ArchiveMode::Append);
        store.set("a", b"1").unwrap();

        assert!(matches!(store.delete("a"), Err(StowageError::Unsupported(_))));
        assert!(matches!(
            store.delete("missing"),
            Err(StowageError::Unsupported(_))
        ));
        assert!(matches!(
            store.discard("a"),
            Err(StowageError::Unsupported(_))
        ));
        assert_eq!(store.get("a").unwrap(), b"1");
    }

    #[test]
    fn test_duplicate_names_newest_wins() {
        let (path, _temp) = archive_path();
        let store = ZipStore::open(&path, ArchiveMode::Append);

        store.set("k", b"old").unwrap();
        store.set("k", b"new").unwrap();

        assert_eq!(store.get("k").unwrap(), b"new");
        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(store.member_names().unwrap(), vec!["k", "k"]);

        let items: Vec<_> = store.items().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(
            items,
            vec![
                ("k".to_string(), b"old".to_vec()),
                ("k".to_string(), b"new".to_vec())
            ]
        );
    }

    #[test]
    fn test_duplicate_names_across_reopen() {
        let (path, _temp) = archive_path();
        {
            let store = ZipStore::open(&path, ArchiveMode::Append);
            store.set("k", b"old").unwrap();
        }
        {
            let store = ZipStore::open(&path, ArchiveMode::Append);
            store.set("k", b"new").unwrap();
        }

        let store = ZipStore::open(&path, ArchiveMode::Read);
        assert_eq!(store.get("k").unwrap(), b"new");
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_iteration_follows_archive_order() {
        let (path, _temp) = archive_path();
        let store = ZipStore::open(&path, ArchiveMode::Append);
        for key in ["zeta", "alpha", "mid"] {
            store.set(key, key.as_bytes()).unwrap();
        }

        let keys: Vec<String> = store.keys().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);

        let values: Vec<Vec<u8>> = store.values().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(values[0], b"zeta");
        assert_eq!(values[2], b"mid");
    }

    #[test]
    fn test_values_iteration_survives_interleaved_set() {
        let (path, _temp) = archive_path();
        let store = ZipStore::open(&path, ArchiveMode::Append);
        store.set("a", b"1").unwrap();
        store.set("b", b"2").unwrap();

        let mut values = store.values().unwrap();
        assert_eq!(values.next().unwrap().unwrap(), b"1");
        store.set("c", b"3").unwrap();
        assert_eq!(values.next().unwrap().unwrap(), b"2");
        assert!(values.next().is_none());

        assert_eq!(store.keys().unwrap().count(), 3);
    }

    #[test]
    fn test_contains_and_len() {
        let (path, _temp) = archive_path();
        let store = ZipStore::open(&path, ArchiveMode::Append);
        assert_eq!(store.len().unwrap(), 0);
        assert!(!store.contains("a").unwrap());

        store.set("a", b"1").unwrap();
        store.set("b", b"2").unwrap();

        assert!(store.contains("a").unwrap());
        assert!(!store.contains("c").unwrap());
        assert!(!store.contains_any(&7u8).unwrap());
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_flush_keeps_store_usable() {
        let (path, _temp) = archive_path();
        let store = ZipStore::open(&path, ArchiveMode::Write);

        store.set("a", b"1").unwrap();
        store.flush().unwrap();
        assert_eq!(store.state(), StoreState::Open(ArchiveMode::Write));

        // Reopening after a flush appends rather than truncating again
        store.set("b", b"2").unwrap();
        assert_eq!(store.get("a").unwrap(), b"1");
        assert_eq!(store.get("b").unwrap(), b"2");
        store.flush().unwrap();
        store.flush().unwrap();
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_closed_store_rejects_operations() {
        let (path, _temp) = archive_path();
        let mut store = ZipStore::open(&path, ArchiveMode::Append);
        store.set("a", b"1").unwrap();
        store.close().unwrap();

        assert!(store.is_closed());
        assert!(matches!(store.get("a"), Err(StowageError::Closed)));
        assert!(matches!(store.set("b", b"2"), Err(StowageError::Closed)));
        assert!(matches!(store.contains("a"), Err(StowageError::Closed)));
        assert!(matches!(store.len(), Err(StowageError::Closed)));
        assert!(matches!(store.keys(), Err(StowageError::Closed)));
        assert!(matches!(store.delete("a"), Err(StowageError::Closed)));

        store.close().unwrap();
        store.flush().unwrap();

        let reader = ZipStore::open(&path, ArchiveMode::Read);
        assert_eq!(reader.get("a").unwrap(), b"1");
    }

    #[test]
    fn test_read_mode_rejects_writes() {
        let (path, _temp) = archive_path();
        {
            let store = ZipStore::open(&path, ArchiveMode::Append);
            store.set("a", b"1").unwrap();
        }

        let store = ZipStore::open(&path, ArchiveMode::Read);
        let err = store.set("b", b"2").unwrap_err();
        assert!(matches!(
            err,
            StowageError::Mode {
                mode: ArchiveMode::Read,
                operation: "set"
            }
        ));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_read_mode_missing_file() {
        let (path, _temp) = archive_path();
        let store = ZipStore::open(&path, ArchiveMode::Read);
        assert!(matches!(store.len(), Err(StowageError::Io(_))));
    }

    #[test]
    fn test_write_mode_truncates() {
        let (path, _temp) = archive_path();
        {
            let store = ZipStore::open(&path, ArchiveMode::Append);
            store.set("old", b"1").unwrap();
        }

        let store = ZipStore::open(&path, ArchiveMode::Write);
        assert_eq!(store.len().unwrap(), 0);
        store.set("new", b"2").unwrap();
        assert_eq!(store.member_names().unwrap(), vec!["new"]);
    }

    #[test]
    fn test_exclusive_mode() {
        let (path, _temp) = archive_path();

        let store = ZipStore::open(&path, ArchiveMode::Exclusive);
        store.set("a", b"1").unwrap();
        store.flush().unwrap();
        store.set("b", b"2").unwrap();
        assert_eq!(store.len().unwrap(), 2);
        drop(store);

        let again = ZipStore::open(&path, ArchiveMode::Exclusive);
        let err = again.set("c", b"3").unwrap_err();
        assert!(
            matches!(err, StowageError::Io(ref e) if e.kind() == std::io::ErrorKind::AlreadyExists)
        );
    }

    #[test]
    fn test_append_mode_keeps_existing_members() {
        let (path, _temp) = archive_path();
        {
            let store = ZipStore::open(&path, ArchiveMode::Write);
            store.set("a", b"1").unwrap();
        }

        let store = ZipStore::open(&path, ArchiveMode::Append);
        store.set("b", b"2").unwrap();
        assert_eq!(store.member_names().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_stored_values_are_verbatim() {
        let (path, _temp) = archive_path();
        let value = b"0123456789-verbatim-payload-9876543210";
        {
            let store = ZipStore::open(&path, ArchiveMode::Append);
            store.set("payload", value).unwrap();
        }

        let raw = std::fs::read(&path).unwrap();
        assert!(raw.windows(value.len()).any(|w| w == value));
    }

    #[test]
    fn test_deflated_round_trip() {
        let (path, _temp) = archive_path();
        let value = vec![b'z'; 64 * 1024];
        {
            let store = ZipStore::new(
                ZipConfig::new(&path).with_compression(Compression::Deflated),
            );
            store.set("big", &value).unwrap();
        }

        assert!(std::fs::metadata(&path).unwrap().len() < value.len() as u64);
        let store = ZipStore::open(&path, ArchiveMode::Read);
        assert_eq!(store.get("big").unwrap(), value);
    }

    #[test]
    fn test_drop_flushes_on_error_path() {
        fn spill(path: &Path) -> Result<()> {
            let store = ZipStore::open(path, ArchiveMode::Append);
            store.set("partial", b"kept")?;
            Err(StowageError::Unsupported("caller bailed out".into()))
        }

        let (path, _temp) = archive_path();
        assert!(spill(&path).is_err());

        let store = ZipStore::open(&path, ArchiveMode::Read);
        assert_eq!(store.get("partial").unwrap(), b"kept");
    }
}
