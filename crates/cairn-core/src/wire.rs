//! Cairn bundle wire format — on-wire layout shared with relays and indexers.
//!
//! This layout IS the interchange contract. Every width here is part of the
//! format and must not change: external relays parse these exact offsets.
//!
//! A bundle is:
//!
//!   [item count: 32-byte unsigned LE]
//!   [count × header record: (size: 32-byte unsigned LE, id: 32 bytes)]
//!   [item bytes, concatenated in header order]
//!
//! The header record is #[repr(C, packed)] with zerocopy derives for safe,
//! allocation-free serialization. There is no unsafe code in this module.

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ── Widths ────────────────────────────────────────────────────────────────────

/// Width of the bundle's item-count prefix in bytes.
pub const COUNT_WIDTH: usize = 32;

/// Width of one item identifier in bytes.
pub const ID_WIDTH: usize = 32;

/// Width of one header record in bytes: 32-byte size + 32-byte id.
pub const HEADER_WIDTH: usize = 64;

// ── Header record ─────────────────────────────────────────────────────────────

/// One fixed-width bundle header record.
///
/// Stored contiguously immediately after the count prefix, one per item,
/// in item order. Header order defines access order for the whole bundle.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct HeaderRecord {
    /// Item byte length as a 32-byte unsigned little-endian integer.
    pub size: [u8; COUNT_WIDTH],

    /// Content identifier of the item — BLAKE3 of its signature.
    /// All-zero is invalid: every item has an id once signed.
    pub id: [u8; ID_WIDTH],
}

// Compile-time size guard. If this fails, the wire format has silently changed.
assert_eq_size!(HeaderRecord, [u8; HEADER_WIDTH]);

impl HeaderRecord {
    /// Build a record from an in-memory size and id.
    pub fn new(size: u64, id: [u8; ID_WIDTH]) -> Self {
        Self {
            size: uint_to_le_array(size),
            id,
        }
    }

    /// Decode the size field. Faults if the stored value exceeds u64.
    pub fn size_value(&self) -> Result<u64, WireError> {
        uint_from_le_bytes(&self.size)
    }
}

// ── Unsigned little-endian integers ───────────────────────────────────────────

/// Encode `value` as an N-byte unsigned little-endian integer.
///
/// Faults when `width < 8` and the value exceeds `2^(8·width) - 1`.
/// (Negative values cannot arise: the input type is unsigned.)
pub fn uint_to_le_bytes(value: u64, width: usize) -> Result<Vec<u8>, WireError> {
    if width < 8 && value >> (8 * width as u32) != 0 {
        return Err(WireError::ValueTooLarge { value, width });
    }
    let le = value.to_le_bytes();
    let mut out = vec![0u8; width];
    let copy = width.min(8);
    out[..copy].copy_from_slice(&le[..copy]);
    Ok(out)
}

/// Encode `value` into a 32-byte LE array — the bundle's native width.
pub fn uint_to_le_array(value: u64) -> [u8; COUNT_WIDTH] {
    let mut out = [0u8; COUNT_WIDTH];
    out[..8].copy_from_slice(&value.to_le_bytes());
    out
}

/// Decode an N-byte unsigned little-endian integer.
///
/// Exact inverse of [`uint_to_le_bytes`]: little-endian accumulation.
/// A stored value that does not fit in u64 is a format fault — the caller
/// must never see a silently truncated number.
pub fn uint_from_le_bytes(bytes: &[u8]) -> Result<u64, WireError> {
    if bytes.len() > 8 && bytes[8..].iter().any(|&b| b != 0) {
        return Err(WireError::Oversize { width: bytes.len() });
    }
    let mut value = 0u64;
    for (i, &b) in bytes.iter().take(8).enumerate() {
        value |= (b as u64) << (8 * i as u32);
    }
    Ok(value)
}

// ── Bounds-checked reader ─────────────────────────────────────────────────────

/// Sequential byte reader that never reads past the end of its buffer.
///
/// Every slice a caller obtains has been validated against the buffer's
/// total length — malformed input produces a [`WireError::Truncated`]
/// fault, never an out-of-bounds read or panic.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Consume and return the next `len` bytes.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        if len > self.remaining() {
            return Err(WireError::Truncated {
                needed: len,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Consume the next `N` bytes into a fixed array.
    pub fn take_array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let slice = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    /// Consume a u16 little-endian length field.
    pub fn take_u16_le(&mut self) -> Result<u16, WireError> {
        let bytes: [u8; 2] = self.take_array()?;
        Ok(u16::from_le_bytes(bytes))
    }

    /// Consume everything that remains.
    pub fn take_rest(&mut self) -> &'a [u8] {
        let slice = &self.buf[self.pos..];
        self.pos = self.buf.len();
        slice
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Faults that arise when interpreting wire-format bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("value {value} does not fit in a {width}-byte unsigned integer")]
    ValueTooLarge { value: u64, width: usize },

    #[error("stored {width}-byte integer exceeds the supported 64-bit range")]
    Oversize { width: usize },

    #[error("truncated input: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },
}

// ── Tests ─────────────────────────────────────────────────────────────────────
