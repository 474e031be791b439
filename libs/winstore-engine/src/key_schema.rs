//! Binary layout of window store keys.
//!
//! ```text
//! [ raw key bytes ][ window start : i64 BE ][ sequence : u32 BE ]
//! ```
//!
//! The raw key length is implied by the total length minus the 12-byte suffix.
//! For a fixed raw key, byte order equals `(window start, sequence)` numeric
//! order as long as window starts are non-negative. Composite raw keys must
//! carry their own boundaries; this layer never parses them.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use winstore_api::{StoreError, TimeWindow, WindowedKey};

pub const TIMESTAMP_SIZE: usize = 8;
pub const SEQNUM_SIZE: usize = 4;
pub const SUFFIX_SIZE: usize = TIMESTAMP_SIZE + SEQNUM_SIZE;

/// Sequence used when duplicates are not retained.
pub const NO_SEQNUM: u32 = 0;

/// A decoded store key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreKey {
    pub key: Bytes,
    pub window_start: i64,
    pub sequence: u32,
}

/// Encode `(key, window_start, seqnum)`.
///
/// # Panics
///
/// In debug builds, if `window_start` is negative. Callers reject negative
/// window starts before encoding; the byte order of the layout only matches
/// numeric order for non-negative values.
pub fn to_store_key_binary(key: &[u8], window_start: i64, seqnum: u32) -> Bytes {
    debug_assert!(window_start >= 0, "negative window start {window_start}");
    let mut buf = BytesMut::with_capacity(key.len() + SUFFIX_SIZE);
    buf.put_slice(key);
    buf.put_i64(window_start);
    buf.put_u32(seqnum);
    buf.freeze()
}

pub fn to_binary(windowed: &WindowedKey, seqnum: u32) -> Bytes {
    to_store_key_binary(&windowed.key, windowed.window.start, seqnum)
}

pub fn decode(binary: &[u8]) -> Result<StoreKey, StoreError> {
    let key = extract_store_key_bytes(binary)?;
    Ok(StoreKey {
        key: Bytes::copy_from_slice(key),
        window_start: extract_store_timestamp(binary)?,
        sequence: extract_store_sequence(binary)?,
    })
}

pub fn extract_store_key_bytes(binary: &[u8]) -> Result<&[u8], StoreError> {
    check_len(binary)?;
    Ok(&binary[..binary.len() - SUFFIX_SIZE])
}

pub fn extract_store_timestamp(binary: &[u8]) -> Result<i64, StoreError> {
    check_len(binary)?;
    Ok((&binary[binary.len() - SUFFIX_SIZE..]).get_i64())
}

pub fn extract_store_sequence(binary: &[u8]) -> Result<u32, StoreError> {
    check_len(binary)?;
    Ok((&binary[binary.len() - SEQNUM_SIZE..]).get_u32())
}

/// Decode into a windowed key whose window spans `window_size` ms.
pub fn from_store_key(binary: &[u8], window_size: i64) -> Result<WindowedKey, StoreError> {
    let key = extract_store_key_bytes(binary)?;
    let start = extract_store_timestamp(binary)?;
    Ok(WindowedKey::new(
        Bytes::copy_from_slice(key),
        TimeWindow::for_start(start, window_size),
    ))
}

/// Smallest store key of `key` with a window starting at or after `time_from`.
pub fn lower_range(key: &[u8], time_from: i64) -> Bytes {
    to_store_key_binary(key, time_from.max(0), 0)
}

/// Largest store key of `key` with a window starting at or before `time_to`.
pub fn upper_range(key: &[u8], time_to: i64) -> Bytes {
    to_store_key_binary(key, time_to.max(0), u32::MAX)
}

fn check_len(binary: &[u8]) -> Result<(), StoreError> {
    if binary.len() < SUFFIX_SIZE {
        return Err(StoreError::usage(format!(
            "store key of {} bytes is shorter than the {SUFFIX_SIZE}-byte window suffix",
            binary.len()
        )));
    }
    Ok(())
}
