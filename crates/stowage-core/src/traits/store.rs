use crate::error::Result;
use std::any::Any;

/// Lazy sequence of keys
pub type KeyIter<'a> = Box<dyn Iterator<Item = Result<String>> + 'a>;

/// Lazy sequence of values
pub type ValueIter<'a> = Box<dyn Iterator<Item = Result<Vec<u8>>> + 'a>;

/// Lazy sequence of key/value pairs
pub type ItemIter<'a> = Box<dyn Iterator<Item = Result<(String, Vec<u8>)>> + 'a>;

/// Mutable mapping of string keys to byte values over a persistent medium
///
/// Implementations are interchangeable as the slow tier of a buffering layer:
/// callers only rely on the operations below. Every iterator returned is
/// finite and restartable, a fresh call re-derives it from the current
/// state of the store.
pub trait MappingStore {
    /// Read the value stored under `key`
    ///
    /// Fails with `KeyNotFound` if the key is absent.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Store `value` under `key`
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove `key`
    ///
    /// Fails with `KeyNotFound` if the key is absent, or `Unsupported` if the
    /// medium cannot remove entries.
    fn delete(&self, key: &str) -> Result<()>;

    fn contains(&self, key: &str) -> Result<bool>;

    /// Number of live entries, as reported by the medium
    fn len(&self) -> Result<usize>;

    fn keys(&self) -> Result<KeyIter<'_>>;

    fn values(&self) -> Result<ValueIter<'_>>;

    fn items(&self) -> Result<ItemIter<'_>>;

    /// Release the underlying handle
    fn close(&mut self) -> Result<()>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Membership test for a probe of any type
    ///
    /// Keys are always strings, so any other probe is `false` without
    /// touching the medium.
    fn contains_any(&self, probe: &dyn Any) -> Result<bool> {
        if let Some(key) = probe.downcast_ref::<String>() {
            self.contains(key)
        } else if let Some(key) = probe.downcast_ref::<&str>() {
            self.contains(key)
        } else {
            Ok(false)
        }
    }

    /// Insert every pair in order
    ///
    /// The final state matches calling `set` for each pair in turn.
    fn update(&self, items: &[(String, Vec<u8>)]) -> Result<()> {
        for (key, value) in items {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Remove `key` if present
    fn discard(&self, key: &str) -> Result<()> {
        match self.delete(key) {
            Err(e) if e.is_key_not_found() => Ok(()),
            other => other,
        }
    }

    /// Push buffered writes to stable storage
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
