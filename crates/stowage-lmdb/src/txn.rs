use lmdb::{Cursor, Database, RoTransaction, RwTransaction, Transaction, WriteFlags};
use lmdb_sys::{MDB_FIRST, MDB_NEXT, MDB_SET, MDB_SET_RANGE};
use std::collections::VecDeque;
use stowage_core::error::{Result, StowageError};

use crate::keys::{encode_key, is_storable};

pub(crate) const BACKEND: &str = "lmdb";

pub(crate) fn lmdb_err(e: lmdb::Error) -> StowageError {
    StowageError::engine(BACKEND, e)
}

/// Raw key/value pair copied out of the map
pub type RawEntry = (Vec<u8>, Vec<u8>);

/// Read-only transaction
///
/// Sees a consistent snapshot of the database as of `begin`. Aborted when
/// dropped.
pub struct LmdbReadTxn<'env> {
    txn: RoTransaction<'env>,
    db: Database,
}

impl<'env> LmdbReadTxn<'env> {
    pub fn new(txn: RoTransaction<'env>, db: Database) -> Self {
        Self { txn, db }
    }

    pub fn get(&self, key: &str) -> Result<Option<&[u8]>> {
        if !is_storable(key) {
            return Ok(None);
        }
        match self.txn.get(self.db, &encode_key(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(lmdb_err(e)),
        }
    }

    /// Positioned cursor lookup for an exact key
    pub fn contains(&self, key: &str) -> Result<bool> {
        if !is_storable(key) {
            return Ok(false);
        }
        let cursor = self.txn.open_ro_cursor(self.db).map_err(lmdb_err)?;
        match cursor.get(Some(encode_key(key)), None, MDB_SET) {
            Ok(_) => Ok(true),
            Err(lmdb::Error::NotFound) => Ok(false),
            Err(e) => Err(lmdb_err(e)),
        }
    }

    /// Copy up to `limit` entries following `after` (or from the first key)
    /// into `out`
    ///
    /// Returns `true` once the cursor has run past the last key.
    pub fn scan(
        &self,
        after: Option<&[u8]>,
        limit: usize,
        out: &mut VecDeque<RawEntry>,
    ) -> Result<bool> {
        let cursor = self.txn.open_ro_cursor(self.db).map_err(lmdb_err)?;
        let mut step = match after {
            Some(key) => cursor.get(Some(key), None, MDB_SET_RANGE),
            None => cursor.get(None, None, MDB_FIRST),
        };

        let mut taken = 0;
        loop {
            let (key, value) = match step {
                Ok((key, value)) => (key.or(after).unwrap_or_default(), value),
                Err(lmdb::Error::NotFound) => return Ok(true),
                Err(e) => return Err(lmdb_err(e)),
            };

            // SET_RANGE lands on `after` itself when it still exists
            if Some(key) != after {
                if taken == limit {
                    return Ok(false);
                }
                out.push_back((key.to_vec(), value.to_vec()));
                taken += 1;
            }

            step = cursor.get(None, None, MDB_NEXT);
        }
    }
}

/// Transaction statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitInfo {
    pub keys_written: usize,
    pub keys_deleted: usize,
}

/// Write transaction
///
/// LMDB admits one writer at a time; beginning a second write transaction
/// blocks until the first commits or aborts. Dropping an uncommitted
/// transaction aborts it.
pub struct LmdbWriteTxn<'env> {
    txn: Option<RwTransaction<'env>>,
    db: Database,
    stats: CommitInfo,
}

impl<'env> LmdbWriteTxn<'env> {
    pub fn new(txn: RwTransaction<'env>, db: Database) -> Self {
        Self {
            txn: Some(txn),
            db,
            stats: CommitInfo::default(),
        }
    }

    fn txn(&self) -> Result<&RwTransaction<'env>> {
        self.txn
            .as_ref()
            .ok_or_else(|| StowageError::engine(BACKEND, lmdb::Error::BadTxn))
    }

    fn txn_mut(&mut self) -> Result<&mut RwTransaction<'env>> {
        self.txn
            .as_mut()
            .ok_or_else(|| StowageError::engine(BACKEND, lmdb::Error::BadTxn))
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if !is_storable(key) {
            return Ok(None);
        }
        let db = self.db;
        match self.txn()?.get(db, &encode_key(key)) {
            Ok(bytes) => Ok(Some(bytes.to_vec())),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(lmdb_err(e)),
        }
    }

    pub fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        let db = self.db;
        self.txn_mut()?
            .put(db, &encode_key(key), &value, WriteFlags::empty())
            .map_err(lmdb_err)?;
        self.stats.keys_written += 1;
        Ok(())
    }

    /// Delete `key`, returning whether it was present
    pub fn del(&mut self, key: &str) -> Result<bool> {
        if !is_storable(key) {
            return Ok(false);
        }
        let db = self.db;
        match self.txn_mut()?.del(db, &encode_key(key), None) {
            Ok(()) => {
                self.stats.keys_deleted += 1;
                Ok(true)
            }
            Err(lmdb::Error::NotFound) => Ok(false),
            Err(e) => Err(lmdb_err(e)),
        }
    }

    /// Insert many pairs through one write cursor
    ///
    /// Returns the number of pairs taken from `items`. Every consumed pair
    /// was accepted by the cursor; the first rejected pair ends the call
    /// with an error.
    pub fn put_many<'i, I>(&mut self, items: I) -> Result<usize>
    where
        I: IntoIterator<Item = (&'i str, &'i [u8])>,
    {
        let db = self.db;
        let txn = self
            .txn
            .as_mut()
            .ok_or_else(|| StowageError::engine(BACKEND, lmdb::Error::BadTxn))?;
        let mut cursor = txn.open_rw_cursor(db).map_err(lmdb_err)?;

        let mut consumed = 0;
        for (key, value) in items {
            cursor
                .put(&encode_key(key), &value, WriteFlags::empty())
                .map_err(lmdb_err)?;
            consumed += 1;
        }
        drop(cursor);

        self.stats.keys_written += consumed;
        Ok(consumed)
    }

    pub fn commit(mut self) -> Result<CommitInfo> {
        if let Some(txn) = self.txn.take() {
            txn.commit().map_err(lmdb_err)?;
        }
        Ok(self.stats)
    }

    pub fn abort(mut self) {
        if let Some(txn) = self.txn.take() {
            txn.abort();
        }
    }
}

impl<'env> Drop for LmdbWriteTxn<'env> {
    fn drop(&mut self) {
        if let Some(txn) = self.txn.take() {
            txn.abort();
        }
    }
}
