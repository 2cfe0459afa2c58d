//! Cryptographic primitives for Cairn.
//!
//! Provides two things:
//!   1. BLAKE3 hashing — content identifiers and signing digests
//!   2. Ed25519 signing — item signatures and their verification
//!
//! Signing is exposed through the [`ItemSigner`] capability trait so the
//! key never has to live inside the components that produce payloads:
//! callers inject a signer per call. [`LocalSigner`] is the in-process
//! implementation; wallet bridges and remote signers implement the same
//! trait at the application's composition root.

use async_trait::async_trait;
use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey};
use thiserror::Error;

// ── BLAKE3 ────────────────────────────────────────────────────────────────────

/// Hash a byte slice, returning a 32-byte BLAKE3 digest.
///
/// Used for content identifiers (id = hash of the signature bytes) and
/// for the item signing digest.
pub fn hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Incremental BLAKE3 hasher for payloads assembled in pieces.
pub struct Hasher(blake3::Hasher);

impl Hasher {
    pub fn new() -> Self {
        Self(blake3::Hasher::new())
    }

    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    pub fn finalize(self) -> [u8; 32] {
        *self.0.finalize().as_bytes()
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

// ── Keypair ───────────────────────────────────────────────────────────────────

/// An Ed25519 keypair used to sign items.
///
/// The public key is the item's on-wire owner field. The private key never
/// leaves this struct except via [`Keypair::private_bytes`] for storage.
pub struct Keypair {
    signing: SigningKey,
    /// Public key — becomes the `owner` field of every item signed with this key.
    pub public: [u8; 32],
}

impl Keypair {
    /// Generate a new random Ed25519 keypair.
    pub fn generate() -> Self {
        let signing = SigningKey::generate(&mut rand::thread_rng());
        let public = signing.verifying_key().to_bytes();
        Self { signing, public }
    }

    /// Reconstruct a keypair from stored private key bytes.
    /// The public key is derived deterministically from the private key.
    pub fn from_private(private_bytes: [u8; 32]) -> Self {
        let signing = SigningKey::from_bytes(&private_bytes);
        let public = signing.verifying_key().to_bytes();
        Self { signing, public }
    }

    /// Serialize the private key for persistent storage.
    /// Store these bytes securely (mode 0600, ideally encrypted at rest).
    pub fn private_bytes(&self) -> [u8; 32] {
        self.signing.to_bytes()
    }

    /// Sign a message, returning the 64-byte Ed25519 signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }
}

/// Verify an Ed25519 signature over `message` against the `owner` key.
///
/// Returns false for malformed keys or signatures — a corrupt owner field
/// is a verification failure, not a fault.
pub fn verify_signature(owner: &[u8; 32], message: &[u8], signature: &[u8; 64]) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(owner) else {
        return false;
    };
    let sig = ed25519_dalek::Signature::from_bytes(signature);
    key.verify_strict(message, &sig).is_ok()
}

// ── Signer capability ─────────────────────────────────────────────────────────

/// The result of signing: the signature and the key that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSignature {
    /// Public key of the signer — the item's owner.
    pub owner: [u8; 32],
    /// 64-byte Ed25519 signature over the item's signing digest.
    pub signature: [u8; 64],
}

/// External signing capability: sign these bytes, return signature and
/// signer address. Injected per call, never held as internal state by the
/// components that use it.
#[async_trait]
pub trait ItemSigner: Send + Sync {
    async fn sign(&self, message: &[u8]) -> Result<ItemSignature, SignError>;
}

/// In-process signer backed by a local [`Keypair`].
pub struct LocalSigner {
    keypair: Keypair,
}

impl LocalSigner {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// The signer's public key.
    pub fn public(&self) -> [u8; 32] {
        self.keypair.public
    }
}

#[async_trait]
impl ItemSigner for LocalSigner {
    async fn sign(&self, message: &[u8]) -> Result<ItemSignature, SignError> {
        Ok(ItemSignature {
            owner: self.keypair.public,
            signature: self.keypair.sign(message),
        })
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SignError {
    /// The external signing capability refused or could not be reached.
    #[error("signer unavailable: {0}")]
    Unavailable(String),

    /// The signer returned something other than a signature for our request.
    #[error("signer returned an invalid response: {0}")]
    InvalidResponse(String),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
