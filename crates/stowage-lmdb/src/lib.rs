//! LMDB-backed mapping store
//!
//! Implements `MappingStore` over an embedded, memory-mapped LMDB environment.
//!
//! Key features:
//! - Every operation runs in its own transaction (commit or abort, never partial)
//! - Snapshot-isolated readers, single writer enforced by LMDB
//! - Single-transaction bulk inserts through one write cursor
//! - Lazy chunked iteration over one read snapshot
//! - Weak durability by default, with an explicit forced sync

pub mod iter;
pub mod keys;
pub mod store;
pub mod txn;

pub use iter::LmdbIter;
pub use store::LmdbStore;
pub use txn::{CommitInfo, LmdbReadTxn, LmdbWriteTxn};
