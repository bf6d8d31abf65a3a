use lmdb::{Database, Environment, EnvironmentFlags};
use std::path::Path;
use stowage_core::{
    config::SyncMode,
    error::{Result, StowageError},
    observe,
    traits::{ItemIter, KeyIter, MappingStore, ValueIter},
    LmdbConfig,
};

use crate::iter::LmdbIter;
use crate::keys::decode_key;
use crate::txn::{lmdb_err, LmdbReadTxn, LmdbWriteTxn, BACKEND};

/// LMDB-backed mapping store
///
/// Keys are UTF-8 strings, values are bytes. Every read or write runs in its
/// own LMDB transaction: readers proceed concurrently on snapshots while
/// writers are serialized by LMDB itself. No application-level locking is
/// layered on top, so a store can be shared across threads behind an `Arc`.
///
/// Keys must be non-empty and at most `keys::MAX_KEY_SIZE` (511) bytes long.
/// Writing any other key fails with an engine error; looking one up reports
/// it as absent.
///
/// Commits are weakly durable by default (`SyncMode::NoSync`), since spilled
/// data is expected to be ephemeral. Use `flush` to force a sync.
pub struct LmdbStore {
    env: Option<Environment>,
    db: Database,
    config: LmdbConfig,
}

impl LmdbStore {
    /// Open (or create) a store in `cfg.path`
    pub fn open(cfg: LmdbConfig) -> Result<Self> {
        cfg.validate()?;
        std::fs::create_dir_all(&cfg.path)?;

        let mut env_builder = Environment::new();
        env_builder.set_map_size(cfg.map_size);
        env_builder.set_max_readers(cfg.max_readers);

        // Read transactions are not tied to threads, so a caller may hold an
        // iterator and issue lookups on the same thread.
        let mut flags = EnvironmentFlags::NO_TLS;
        match cfg.sync_mode {
            SyncMode::Full => {}
            SyncMode::NoMetaSync => flags.insert(EnvironmentFlags::NO_META_SYNC),
            SyncMode::NoSync => flags.insert(EnvironmentFlags::NO_SYNC),
        }
        if cfg.write_map {
            flags.insert(EnvironmentFlags::WRITE_MAP);
        }
        env_builder.set_flags(flags);

        let env = env_builder.open(&cfg.path).map_err(lmdb_err)?;
        let db = env.open_db(None).map_err(lmdb_err)?;

        tracing::debug!(
            path = %cfg.path.display(),
            map_size = cfg.map_size,
            sync_mode = ?cfg.sync_mode,
            "Opened LMDB store"
        );

        Ok(Self {
            env: Some(env),
            db,
            config: cfg,
        })
    }

    /// Open a store in `path` with default settings
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(LmdbConfig::new(path.as_ref()))
    }

    pub fn config(&self) -> &LmdbConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn is_closed(&self) -> bool {
        self.env.is_none()
    }

    fn env(&self) -> Result<&Environment> {
        self.env.as_ref().ok_or(StowageError::Closed)
    }

    /// Begin a read-only snapshot transaction
    pub fn read_txn(&self) -> Result<LmdbReadTxn<'_>> {
        let txn = self.env()?.begin_ro_txn().map_err(lmdb_err)?;
        Ok(LmdbReadTxn::new(txn, self.db))
    }

    /// Begin a write transaction, blocking while another writer is active
    pub fn write_txn(&self) -> Result<LmdbWriteTxn<'_>> {
        let txn = self.env()?.begin_rw_txn().map_err(lmdb_err)?;
        Ok(LmdbWriteTxn::new(txn, self.db))
    }

    /// Run `f` inside a read transaction
    pub fn read<T>(&self, f: impl FnOnce(&LmdbReadTxn<'_>) -> Result<T>) -> Result<T> {
        let txn = self.read_txn()?;
        f(&txn)
    }

    /// Run `f` inside a write transaction
    ///
    /// Commits when `f` returns `Ok`, aborts when it returns `Err` (or panics).
    pub fn write<T>(&self, f: impl FnOnce(&mut LmdbWriteTxn<'_>) -> Result<T>) -> Result<T> {
        let mut txn = self.write_txn()?;
        match f(&mut txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                txn.abort();
                Err(e)
            }
        }
    }

    /// Insert all pairs in a single write transaction
    ///
    /// Equivalent to calling `set` for each pair in order, but commits once.
    ///
    /// # Panics
    ///
    /// Panics, leaving the transaction uncommitted, if the cursor consumed a
    /// different number of pairs than it was given.
    pub fn bulk_update(&self, items: &[(String, Vec<u8>)]) -> Result<()> {
        observe::timed(BACKEND, "bulk_update", || {
            self.write(|txn| {
                let consumed =
                    txn.put_many(items.iter().map(|(k, v)| (k.as_str(), v.as_slice())))?;
                assert_eq!(
                    consumed,
                    items.len(),
                    "bulk update consumed {} of {} pairs",
                    consumed,
                    items.len()
                );
                Ok(())
            })
        })?;

        observe::record_bulk_update(BACKEND, items.len());
        tracing::debug!(items = items.len(), "Bulk update committed");
        Ok(())
    }

    /// Iterate raw entries on a fresh snapshot
    pub fn iter(&self) -> Result<LmdbIter<'_>> {
        Ok(LmdbIter::new(self.read_txn()?, self.config.iter_chunk_size))
    }
}

impl MappingStore for LmdbStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        observe::timed(BACKEND, "get", || {
            self.read(|txn| {
                txn.get(key)?
                    .map(<[u8]>::to_vec)
                    .ok_or_else(|| StowageError::KeyNotFound(key.to_string()))
            })
        })
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        observe::timed(BACKEND, "set", || self.write(|txn| txn.put(key, value)))
    }

    fn delete(&self, key: &str) -> Result<()> {
        observe::timed(BACKEND, "delete", || {
            self.write(|txn| {
                if txn.del(key)? {
                    Ok(())
                } else {
                    Err(StowageError::KeyNotFound(key.to_string()))
                }
            })
        })
    }

    fn contains(&self, key: &str) -> Result<bool> {
        self.read(|txn| txn.contains(key))
    }

    fn len(&self) -> Result<usize> {
        let stat = self.env()?.stat().map_err(lmdb_err)?;
        Ok(stat.entries())
    }

    fn keys(&self) -> Result<KeyIter<'_>> {
        Ok(Box::new(
            self.iter()?
                .map(|entry| entry.and_then(|(key, _)| decode_key(&key))),
        ))
    }

    fn values(&self) -> Result<ValueIter<'_>> {
        Ok(Box::new(self.iter()?.map(|entry| entry.map(|(_, value)| value))))
    }

    fn items(&self) -> Result<ItemIter<'_>> {
        Ok(Box::new(self.iter()?.map(|entry| {
            entry.and_then(|(key, value)| Ok((decode_key(&key)?, value)))
        })))
    }

    fn update(&self, items: &[(String, Vec<u8>)]) -> Result<()> {
        self.bulk_update(items)
    }

    /// Force buffered commits to disk, regardless of the sync mode
    fn flush(&self) -> Result<()> {
        self.env()?.sync(true).map_err(lmdb_err)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(env) = self.env.take() {
            drop(env);
            tracing::debug!(path = %self.config.path.display(), "Closed LMDB store");
        }
        Ok(())
    }
}
