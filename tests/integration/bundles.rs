//! Bundle codec behavior over realistic batches.

use crate::*;

use cairn_core::bundle::{self, Bundle, BundleError};
use cairn_core::wire::{COUNT_WIDTH, HEADER_WIDTH};

#[tokio::test]
async fn encoding_is_deterministic_for_identical_input() {
    // Same payloads, same key: ed25519 signing is deterministic, so the
    // two bundles must be byte-identical.
    let keypair = Keypair::generate();
    let signer_a = LocalSigner::new(Keypair::from_private(keypair.private_bytes()));
    let signer_b = LocalSigner::new(Keypair::from_private(keypair.private_bytes()));

    let mut batch_a = vec![item("alpha"), item("beta"), item("gamma")];
    let mut batch_b = vec![item("alpha"), item("beta"), item("gamma")];

    let bytes_a = bundle::encode(&mut batch_a, &signer_a).await.unwrap();
    let bytes_b = bundle::encode(&mut batch_b, &signer_b).await.unwrap();
    assert_eq!(bytes_a, bytes_b);
}

#[tokio::test]
async fn random_access_across_a_large_batch() {
    let signer = signer();
    let mut batch: Vec<DataItem> = (0..20).map(|n| item(&format!("payload {n}"))).collect();
    let encoded = bundle::encode(&mut batch, signer.as_ref()).await.unwrap();

    let decoded = Bundle::decode(encoded).unwrap();
    assert_eq!(decoded.count(), 20);
    assert!(decoded.verify());

    // Every item is reachable both by position and by id, and parses
    // back to the payload that went in.
    for (index, original) in batch.iter().enumerate() {
        let id = original.id().unwrap();
        let by_index = decoded.get(index).unwrap();
        let by_id = decoded.get_by_id(&id).unwrap();
        assert_eq!(by_index.bytes, by_id.bytes);

        let parsed = by_id.parse().unwrap();
        assert_eq!(parsed.data, original.data);
        assert_eq!(parsed.tags, original.tags);
    }
}

#[tokio::test]
async fn header_region_is_count_times_sixty_four() {
    let signer = signer();
    let mut batch = vec![item("a"), item("b"), item("c"), item("d")];
    let encoded = bundle::encode(&mut batch, signer.as_ref()).await.unwrap();

    let body: u64 = Bundle::decode(encoded.clone()).unwrap().sizes().iter().sum();
    assert_eq!(
        encoded.len(),
        COUNT_WIDTH + 4 * HEADER_WIDTH + body as usize
    );
}

#[tokio::test]
async fn truncated_body_is_a_decode_fault_not_an_empty_bundle() {
    let signer = signer();
    let mut batch = vec![item("will lose its tail")];
    let encoded = bundle::encode(&mut batch, signer.as_ref()).await.unwrap();

    let mut cut = encoded.to_vec();
    cut.truncate(cut.len() - 5);
    assert!(matches!(
        Bundle::decode(Bytes::from(cut)),
        Err(BundleError::SizeMismatch { .. })
    ));
}

#[tokio::test]
async fn flipped_payload_byte_fails_verification_only() {
    let signer = signer();
    let mut batch = vec![item("intact"), item("tampered")];
    let encoded = bundle::encode(&mut batch, signer.as_ref()).await.unwrap();

    let mut corrupted = encoded.to_vec();
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0x80;

    // Structure still decodes; trust does not.
    let decoded = Bundle::decode(Bytes::from(corrupted)).unwrap();
    assert_eq!(decoded.count(), 2);
    assert!(!decoded.verify());
}
