//! Signed items — the unit of data packed into bundles.
//!
//! An item is raw bytes plus an ordered list of name/value tags. Signing
//! binds both under an Ed25519 signature and gives the item its content
//! identifier: id = BLAKE3(signature bytes). The identifier therefore
//! changes whenever the content or the signer changes.
//!
//! On-wire layout inside a bundle:
//!
//!   [owner: 32] [signature: 64] [tag count: u16 LE]
//!   [per tag: name len u16 LE, name, value len u16 LE, value]
//!   [data: remainder]

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::crypto::{self, ItemSignature, ItemSigner, SignError};
use crate::wire::{ByteReader, WireError};

/// Domain separation prefix for the item signing digest.
const SIGNING_DOMAIN: &[u8] = b"cairn.item.v1";

// ── Identifier ────────────────────────────────────────────────────────────────

/// Content-derived item identifier: BLAKE3 of the item's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId([u8; 32]);

impl ItemId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ── Tags ──────────────────────────────────────────────────────────────────────

/// A name/value string pair attached to an item or ledger record.
/// Indexers filter records by tag, so names are part of the platform protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Canonical tag bytes: u16 LE count, then per tag a u16 LE length-prefixed
/// name and value. This encoding feeds both the wire layout and the signing
/// digest, so it must stay byte-stable.
fn encode_tags(tags: &[Tag]) -> Result<Vec<u8>, ItemError> {
    if tags.len() > u16::MAX as usize {
        return Err(ItemError::TooManyTags(tags.len()));
    }
    let mut out = Vec::new();
    out.extend_from_slice(&(tags.len() as u16).to_le_bytes());
    for tag in tags {
        for field in [tag.name.as_bytes(), tag.value.as_bytes()] {
            if field.len() > u16::MAX as usize {
                return Err(ItemError::TagTooLong(field.len()));
            }
            out.extend_from_slice(&(field.len() as u16).to_le_bytes());
            out.extend_from_slice(field);
        }
    }
    Ok(out)
}

fn decode_tags(reader: &mut ByteReader<'_>) -> Result<Vec<Tag>, ItemError> {
    let count = reader.take_u16_le()?;
    let mut tags = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_len = reader.take_u16_le()? as usize;
        let name = std::str::from_utf8(reader.take(name_len)?)
            .map_err(|_| ItemError::TagNotUtf8)?
            .to_owned();
        let value_len = reader.take_u16_le()? as usize;
        let value = std::str::from_utf8(reader.take(value_len)?)
            .map_err(|_| ItemError::TagNotUtf8)?
            .to_owned();
        tags.push(Tag { name, value });
    }
    Ok(tags)
}

// ── Item ──────────────────────────────────────────────────────────────────────

/// A unit of data and tags, optionally signed.
///
/// Created unsigned by producers, signed exactly once at the capability
/// boundary, immutable in spirit afterwards: mutating data or tags after
/// signing makes [`DataItem::verify`] fail, which is the point.
#[derive(Debug, Clone)]
pub struct DataItem {
    pub data: Bytes,
    pub tags: Vec<Tag>,
    signature: Option<ItemSignature>,
}

impl DataItem {
    /// Create an unsigned item.
    pub fn new(data: impl Into<Bytes>, tags: Vec<Tag>) -> Self {
        Self {
            data: data.into(),
            tags,
            signature: None,
        }
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    pub fn signature(&self) -> Option<&ItemSignature> {
        self.signature.as_ref()
    }

    /// Content identifier, available once signed.
    pub fn id(&self) -> Option<ItemId> {
        self.signature
            .as_ref()
            .map(|s| ItemId(crypto::hash(&s.signature)))
    }

    /// The digest the signer signs: BLAKE3 over the domain prefix, the
    /// canonical tag bytes, and the data.
    pub fn signing_digest(&self) -> Result<[u8; 32], ItemError> {
        let mut hasher = crypto::Hasher::new();
        hasher.update(SIGNING_DOMAIN);
        hasher.update(&encode_tags(&self.tags)?);
        hasher.update(&self.data);
        Ok(hasher.finalize())
    }

    /// Sign the item via the injected capability. Suspends once, at the
    /// signer boundary. Signing an already-signed item re-signs it.
    pub async fn sign(&mut self, signer: &dyn ItemSigner) -> Result<ItemId, ItemError> {
        let digest = self.signing_digest()?;
        let signature = signer.sign(&digest).await?;
        self.signature = Some(signature);
        // Just stored — the id is always derivable here.
        self.id().ok_or(ItemError::Unsigned)
    }

    /// Validate the signature against the declared owner key.
    /// Unsigned or undigestable items verify false.
    pub fn verify(&self) -> bool {
        let Some(sig) = &self.signature else {
            return false;
        };
        let Ok(digest) = self.signing_digest() else {
            return false;
        };
        crypto::verify_signature(&sig.owner, &digest, &sig.signature)
    }

    /// Serialize to the bundle item layout. Faults if unsigned: only signed
    /// items travel in bundles.
    pub fn to_bytes(&self) -> Result<Bytes, ItemError> {
        let sig = self.signature.as_ref().ok_or(ItemError::Unsigned)?;
        let tag_bytes = encode_tags(&self.tags)?;
        let mut out = Vec::with_capacity(32 + 64 + tag_bytes.len() + self.data.len());
        out.extend_from_slice(&sig.owner);
        out.extend_from_slice(&sig.signature);
        out.extend_from_slice(&tag_bytes);
        out.extend_from_slice(&self.data);
        Ok(Bytes::from(out))
    }

    /// Parse an item from its bundle layout.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ItemError> {
        let mut reader = ByteReader::new(bytes);
        let owner: [u8; 32] = reader.take_array()?;
        let signature: [u8; 64] = reader.take_array()?;
        let tags = decode_tags(&mut reader)?;
        let data = Bytes::copy_from_slice(reader.take_rest());
        Ok(Self {
            data,
            tags,
            signature: Some(ItemSignature { owner, signature }),
        })
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    #[error("item is not signed")]
    Unsigned,

    #[error("item has {0} tags, the wire format allows at most 65535")]
    TooManyTags(usize),

    #[error("tag name or value is {0} bytes, the wire format allows at most 65535")]
    TagTooLong(usize),

    #[error("tag name or value is not valid UTF-8")]
    TagNotUtf8,

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Sign(#[from] SignError),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
