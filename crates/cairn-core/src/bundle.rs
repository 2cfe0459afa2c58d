//! Bundle codec — deterministic, lossless packing of signed items.
//!
//! Encoding signs any not-yet-signed item (the only suspension point),
//! then writes the count prefix, the fixed-width header region, and the
//! item bytes, all in input order. Decoding builds a random-access view:
//! items are addressable by position or by content id without touching
//! the bytes of any other item.
//!
//! Decode never trusts the input: every offset is validated against the
//! buffer before use, and a corrupt bundle is a fault — it is never
//! silently treated as empty or partial.

use std::collections::HashSet;

use bytes::Bytes;
use zerocopy::{AsBytes, FromBytes};

use crate::crypto::{ItemSigner, SignError};
use crate::item::{DataItem, ItemError, ItemId};
use crate::wire::{self, HeaderRecord, WireError, COUNT_WIDTH, HEADER_WIDTH, ID_WIDTH};

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Encode items into a single bundle, signing unsigned ones first.
///
/// Deterministic given a fixed input order and deterministic signing.
/// Defined for the empty slice: a 32-byte zero count, nothing else.
pub async fn encode(items: &mut [DataItem], signer: &dyn ItemSigner) -> Result<Bytes, BundleError> {
    for item in items.iter_mut() {
        if !item.is_signed() {
            item.sign(signer).await?;
        }
    }

    let mut serialized = Vec::with_capacity(items.len());
    for item in items.iter() {
        let bytes = item.to_bytes()?;
        // to_bytes succeeded, so the item is signed and has an id.
        let id = item.id().ok_or(ItemError::Unsigned)?;
        serialized.push((id, bytes));
    }

    let body_len: usize = serialized.iter().map(|(_, b)| b.len()).sum();
    let mut out = Vec::with_capacity(COUNT_WIDTH + items.len() * HEADER_WIDTH + body_len);

    out.extend_from_slice(&wire::uint_to_le_array(serialized.len() as u64));
    for (id, bytes) in &serialized {
        let record = HeaderRecord::new(bytes.len() as u64, *id.as_bytes());
        out.extend_from_slice(record.as_bytes());
    }
    for (_, bytes) in &serialized {
        out.extend_from_slice(bytes);
    }

    Ok(Bytes::from(out))
}

// ── Decoded view ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Entry {
    id: ItemId,
    size: u64,
    /// Absolute offset of the item's first byte within the bundle.
    offset: usize,
}

/// A decoded bundle: parsed header region over the original bytes.
///
/// Accessors slice out of the shared buffer — no item bytes are copied
/// until a caller asks for a specific item.
#[derive(Debug, Clone)]
pub struct Bundle {
    data: Bytes,
    entries: Vec<Entry>,
}

/// One item's slice of a decoded bundle.
#[derive(Debug, Clone)]
pub struct BundleItem {
    pub id: ItemId,
    pub bytes: Bytes,
}

impl BundleItem {
    /// Parse the slice into a full item (owner, signature, tags, data).
    pub fn parse(&self) -> Result<DataItem, ItemError> {
        DataItem::from_bytes(&self.bytes)
    }
}

impl Bundle {
    /// Decode a bundle, validating the complete header region.
    pub fn decode(data: Bytes) -> Result<Self, BundleError> {
        let mut reader = wire::ByteReader::new(&data);
        let count_bytes = reader.take(COUNT_WIDTH)?;
        let count = wire::uint_from_le_bytes(count_bytes)?;
        let count: usize =
            usize::try_from(count).map_err(|_| WireError::Oversize { width: COUNT_WIDTH })?;

        let header_end = count
            .checked_mul(HEADER_WIDTH)
            .and_then(|h| h.checked_add(COUNT_WIDTH))
            .ok_or(WireError::Oversize { width: COUNT_WIDTH })?;

        let mut entries = Vec::with_capacity(count);
        let mut seen = HashSet::with_capacity(count);
        let mut offset = header_end;
        let mut declared: u64 = 0;
        for index in 0..count {
            let record_bytes = reader.take(HEADER_WIDTH)?;
            // Infallible: the slice is exactly HEADER_WIDTH bytes.
            let record =
                HeaderRecord::read_from(record_bytes).ok_or(WireError::Truncated {
                    needed: HEADER_WIDTH,
                    available: record_bytes.len(),
                })?;
            if record.id == [0u8; ID_WIDTH] {
                return Err(BundleError::ZeroId { index });
            }
            // Ids are content-derived and must be distinct; a repeat would
            // make get_by_id ambiguous.
            if !seen.insert(record.id) {
                return Err(BundleError::DuplicateId { index });
            }
            let size = record.size_value()?;
            entries.push(Entry {
                id: ItemId::from_bytes(record.id),
                size,
                offset,
            });
            let size_usize =
                usize::try_from(size).map_err(|_| WireError::Oversize { width: COUNT_WIDTH })?;
            offset = offset
                .checked_add(size_usize)
                .ok_or(WireError::Oversize { width: COUNT_WIDTH })?;
            declared = declared.saturating_add(size);
        }

        let actual = (data.len() - header_end) as u64;
        if declared != actual {
            return Err(BundleError::SizeMismatch { declared, actual });
        }

        Ok(Self { data, entries })
    }

    /// Number of items in the bundle.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Item ids, in header order.
    pub fn ids(&self) -> Vec<ItemId> {
        self.entries.iter().map(|e| e.id).collect()
    }

    /// Item sizes in bytes, in header order.
    pub fn sizes(&self) -> Vec<u64> {
        self.entries.iter().map(|e| e.size).collect()
    }

    /// Item at `index`. Range fault if `index >= count`.
    pub fn get(&self, index: usize) -> Result<BundleItem, BundleError> {
        let entry = self.entries.get(index).ok_or(BundleError::IndexOutOfRange {
            index,
            count: self.entries.len(),
        })?;
        Ok(self.slice_entry(entry))
    }

    /// Item with the given id. Not-found fault if absent — a distinct
    /// error from the range fault, so callers can tell them apart.
    pub fn get_by_id(&self, id: &ItemId) -> Result<BundleItem, BundleError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.id == *id)
            .ok_or(BundleError::IdNotFound { id: *id })?;
        Ok(self.slice_entry(entry))
    }

    fn slice_entry(&self, entry: &Entry) -> BundleItem {
        // Offsets were validated against the buffer during decode.
        let end = entry.offset + entry.size as usize;
        BundleItem {
            id: entry.id,
            bytes: self.data.slice(entry.offset..end),
        }
    }

    /// Establish trust in a bundle from an untrusted source: for every
    /// item, recompute the content id from the signature material and
    /// compare to the header id, then validate the signature against the
    /// declared owner. False on any mismatch or unparsable item.
    pub fn verify(&self) -> bool {
        for index in 0..self.entries.len() {
            let Ok(slot) = self.get(index) else {
                return false;
            };
            let Ok(item) = slot.parse() else {
                return false;
            };
            if item.id() != Some(slot.id) {
                return false;
            }
            if !item.verify() {
                return false;
            }
        }
        true
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// Malformed bytes: truncation, oversize integers, bad layout.
    #[error("malformed bundle: {0}")]
    Format(#[from] WireError),

    /// Header record with a zeroed id — corrupt input, since every item
    /// has an identifier once signed.
    #[error("header record {index} carries a zeroed item id")]
    ZeroId { index: usize },

    /// Header record repeating an earlier record's id — corrupt input,
    /// since ids are content-derived and distinct.
    #[error("header record {index} repeats an earlier item id")]
    DuplicateId { index: usize },

    /// Header sizes do not account for the bytes actually present.
    #[error("header declares {declared} item bytes but {actual} are present")]
    SizeMismatch { declared: u64, actual: u64 },

    /// Range fault: index past the end of the bundle.
    #[error("item index {index} out of range for bundle of {count} items")]
    IndexOutOfRange { index: usize, count: usize },

    /// Not-found fault: no header record carries this id.
    #[error("no item with id {id} in bundle")]
    IdNotFound { id: ItemId },

    #[error(transparent)]
    Item(#[from] ItemError),

    #[error("signing failed while encoding: {0}")]
    Sign(#[from] SignError),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
