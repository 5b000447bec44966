//! Hash slot calculation.
//!
//! Keys map to one of 16384 slots via CRC16 (XMODEM variant) of the key,
//! or of the first non-empty `{...}` hash tag inside the key.

use crc::{Crc, CRC_16_XMODEM};

/// Number of hash slots in a cluster.
pub const SLOT_COUNT: u16 = 16384;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Returns the hash slot (0-16383) that owns `key`.
///
/// ```
/// use muxprobe::key_slot;
///
/// assert_eq!(key_slot("foo"), 12182);
/// assert_eq!(key_slot("{user1000}.following"), key_slot("{user1000}.followers"));
/// ```
pub fn key_slot(key: &str) -> u16 {
    CRC16.checksum(hash_tag(key.as_bytes())) % SLOT_COUNT
}

/// Part of the key that is hashed: the first `{...}` section if it is
/// non-empty, otherwise the whole key.
fn hash_tag(key: &[u8]) -> &[u8] {
    let Some(open) = key.iter().position(|&b| b == b'{') else {
        return key;
    };
    match key[open + 1..].iter().position(|&b| b == b'}') {
        Some(len) if len > 0 => &key[open + 1..open + 1 + len],
        _ => key,
    }
}
