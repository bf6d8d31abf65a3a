//! ZIP archive mapping store
//!
//! Implements `MappingStore` over a single ZIP file: keys are member names,
//! values are member contents.
//!
//! Features:
//! - Lazy file handle, created on first use and released by `flush`
//! - Explicit lifecycle: `Open(mode)` until `close`, then terminal `Closed`
//! - Read / Write / Exclusive / Append modes
//! - Append-only semantics: overwrites add a member, deletes are unsupported
//! - Flush on drop, so every exit path leaves a readable archive

mod store;

pub use store::{StoreState, ZipStore};
