//! Signed payload factory — turns raw outbound operations into signed,
//! content-addressed items ready for bundling.
//!
//! Raw operations arrive with base64url-encoded tag pairs (the encoding
//! their original transport uses). The factory decodes those into plain
//! strings, builds a fresh item with the same data, and signs it through
//! the injected capability — the one suspension point per call. The new
//! item's id is derived from its own signature and is independent of any
//! identifier the raw operation carried.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use bytes::Bytes;
use std::sync::Arc;

use cairn_core::crypto::ItemSigner;
use cairn_core::item::{DataItem, ItemError, Tag};

/// A tag pair as carried by a raw operation: base64url-encoded name and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedTag {
    pub name: String,
    pub value: String,
}

impl EncodedTag {
    /// Encode a plain tag pair. Used by tests and by callers that build
    /// raw operations locally.
    pub fn encode(name: &str, value: &str) -> Self {
        Self {
            name: URL_SAFE_NO_PAD.encode(name),
            value: URL_SAFE_NO_PAD.encode(value),
        }
    }

    fn decode(&self) -> Result<Tag, FactoryError> {
        let decode = |field: &str| -> Result<String, FactoryError> {
            let raw = URL_SAFE_NO_PAD
                .decode(field)
                .map_err(|e| FactoryError::TagEncoding(e.to_string()))?;
            String::from_utf8(raw).map_err(|e| FactoryError::TagEncoding(e.to_string()))
        };
        Ok(Tag::new(decode(&self.name)?, decode(&self.value)?))
    }
}

/// A raw outbound operation: payload bytes, encoded tags, and whatever
/// identifier its source transport assigned it.
#[derive(Debug, Clone)]
pub struct RawOperation {
    pub data: Bytes,
    pub tags: Vec<EncodedTag>,
    /// Identifier from the source transport, if any. Ignored by the
    /// factory: the signed item gets its own content-derived id.
    pub source_id: Option<String>,
}

/// Builds signed items from raw operations using an injected signer.
pub struct SignedPayloadFactory {
    signer: Arc<dyn ItemSigner>,
}

impl SignedPayloadFactory {
    pub fn new(signer: Arc<dyn ItemSigner>) -> Self {
        Self { signer }
    }

    /// Convert one raw operation into a signed item.
    ///
    /// Decodes the operation's tags into plain strings, constructs a new
    /// item carrying the same data and tags, and signs it. Suspends once,
    /// at the signing step.
    pub async fn create_signed_payload(&self, raw: &RawOperation) -> Result<DataItem, FactoryError> {
        let tags = raw
            .tags
            .iter()
            .map(EncodedTag::decode)
            .collect::<Result<Vec<_>, _>>()?;

        let mut item = DataItem::new(raw.data.clone(), tags);
        let id = item.sign(self.signer.as_ref()).await?;
        tracing::trace!(id = %id, "signed payload created");
        Ok(item)
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error("undecodable tag encoding: {0}")]
    TagEncoding(String),

    #[error(transparent)]
    Item(#[from] ItemError),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
