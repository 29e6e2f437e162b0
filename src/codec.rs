//! Identifier codec
//!
//! User ids are stored as 8-byte big-endian keys so that byte-lexicographic
//! key order equals numeric id order.

use crate::error::{CollectError, Result};

/// Width of an encoded id
pub const ID_KEY_LEN: usize = 8;

/// Encode an id as its ordered 8-byte key
pub fn id_to_key(id: u64) -> [u8; ID_KEY_LEN] {
    id.to_be_bytes()
}

/// Decode an 8-byte key back into an id
///
/// Anything other than exactly 8 bytes is reported as `CorruptRecord`; the
/// store only ever decodes bytes it wrote itself.
pub fn key_to_id(bytes: &[u8]) -> Result<u64> {
    let raw: [u8; ID_KEY_LEN] = bytes.try_into().map_err(|_| {
        CollectError::CorruptRecord(format!(
            "id key must be {} bytes, got {}",
            ID_KEY_LEN,
            bytes.len()
        ))
    })?;
    Ok(u64::from_be_bytes(raw))
}
