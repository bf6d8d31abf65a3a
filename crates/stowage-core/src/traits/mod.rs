pub mod store;

pub use store::{ItemIter, KeyIter, MappingStore, ValueIter};
