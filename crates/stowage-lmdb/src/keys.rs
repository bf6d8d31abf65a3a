use stowage_core::error::{Result, StowageError};

/// Encode a mapping key as stored in LMDB (UTF-8 bytes)
pub fn encode_key(key: &str) -> &[u8] {
    key.as_bytes()
}

/// Largest key LMDB accepts with its default build settings
pub const MAX_KEY_SIZE: usize = 511;

/// Whether `key` can be stored at all
///
/// LMDB rejects zero-length keys and keys over `MAX_KEY_SIZE` bytes, so such
/// a key is never present.
pub fn is_storable(key: &str) -> bool {
    !key.is_empty() && key.len() <= MAX_KEY_SIZE
}

/// Decode a stored key back to a string
pub fn decode_key(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| StowageError::KeyDecode(e.to_string()))
}
