use std::collections::VecDeque;
use stowage_core::error::Result;

use crate::txn::{LmdbReadTxn, RawEntry};

/// Forward-only iterator over every entry in the store
///
/// Holds one read transaction for its whole lifetime, so the sequence is a
/// stable snapshot: writes committed after the iterator was created are not
/// observed. Entries are copied out of the map `chunk_size` at a time by
/// re-positioning a cursor after the last key seen.
pub struct LmdbIter<'env> {
    txn: LmdbReadTxn<'env>,
    buffer: VecDeque<RawEntry>,
    last_key: Option<Vec<u8>>,
    chunk_size: usize,
    exhausted: bool,
}

impl<'env> LmdbIter<'env> {
    pub fn new(txn: LmdbReadTxn<'env>, chunk_size: usize) -> Self {
        Self {
            txn,
            buffer: VecDeque::with_capacity(chunk_size),
            last_key: None,
            chunk_size: chunk_size.max(1),
            exhausted: false,
        }
    }

    fn refill(&mut self) -> Result<()> {
        self.exhausted =
            self.txn
                .scan(self.last_key.as_deref(), self.chunk_size, &mut self.buffer)?;
        if let Some((key, _)) = self.buffer.back() {
            self.last_key = Some(key.clone());
        }
        Ok(())
    }
}

impl<'env> Iterator for LmdbIter<'env> {
    type Item = Result<RawEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.refill() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
