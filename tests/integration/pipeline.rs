//! Factory → queue → relay, end to end against in-memory doubles.

use crate::*;

use anyhow::Result;
use cairn_core::bundle::Bundle;
use cairn_services::factory::{EncodedTag, RawOperation, SignedPayloadFactory};
use cairn_services::queue::ExecuteOutcome;

fn raw_operation(payload: &str, action: &str) -> RawOperation {
    RawOperation {
        data: Bytes::copy_from_slice(payload.as_bytes()),
        tags: vec![
            EncodedTag::encode("App-Name", "cairn"),
            EncodedTag::encode("Action", action),
        ],
        source_id: None,
    }
}

#[tokio::test]
async fn raw_operations_reach_the_relay_as_one_verified_bundle() -> Result<()> {
    let signer = signer();
    let factory = SignedPayloadFactory::new(signer.clone());
    let queue = SubmissionQueue::new(signer);

    for (token, payload) in [("op-1", "create repo"), ("op-2", "push"), ("op-3", "fork")] {
        let signed = factory
            .create_signed_payload(&raw_operation(payload, token))
            .await?;
        assert!(queue.enqueue(token, signed));
    }

    let relay = CapturingRelay::default();
    let outcome = queue.execute(&relay, &context()).await;
    let ExecuteOutcome::Submitted(ids) = outcome else {
        panic!("expected Submitted, got {outcome:?}");
    };
    assert_eq!(ids.len(), 3);
    assert!(queue.is_empty());

    // The relay received the caller context and one decodable,
    // verifiable bundle listing the same ids in enqueue order.
    let submission = relay.only_submission();
    assert_eq!(submission.platform, "cairn");
    assert_eq!(submission.owner, "owner-address");
    assert_eq!(submission.group_id.as_deref(), Some("repo-7"));

    let decoded = Bundle::decode(submission.bundle)?;
    assert_eq!(decoded.ids(), ids);
    assert!(decoded.verify());

    // Tags survived the base64url decode into plain strings.
    let first = decoded.get(0)?.parse()?;
    assert_eq!(first.tags[0], Tag::new("App-Name", "cairn"));
    assert_eq!(first.tags[1], Tag::new("Action", "op-1"));
    assert_eq!(first.data, &b"create repo"[..]);
    Ok(())
}

#[tokio::test]
async fn duplicate_tokens_collapse_before_submission() -> Result<()> {
    let signer = signer();
    let factory = SignedPayloadFactory::new(signer.clone());
    let queue = SubmissionQueue::new(signer);

    let first = factory
        .create_signed_payload(&raw_operation("original", "save"))
        .await?;
    let retry = factory
        .create_signed_payload(&raw_operation("retry of the same action", "save"))
        .await?;
    assert!(queue.enqueue("save-token", first));
    assert!(!queue.enqueue("save-token", retry));

    let relay = CapturingRelay::default();
    let ExecuteOutcome::Submitted(ids) = queue.execute(&relay, &context()).await else {
        panic!("expected Submitted");
    };
    assert_eq!(ids.len(), 1);

    let decoded = Bundle::decode(relay.only_submission().bundle)?;
    assert_eq!(decoded.get(0)?.parse()?.data, &b"original"[..]);
    Ok(())
}

#[tokio::test]
async fn relay_rejection_surfaces_as_failure_and_leaves_the_queue_idle() {
    let queue = queue();
    queue.enqueue("doomed", item("payload"));

    let outcome = queue.execute(&FailingRelay, &context()).await;
    assert!(matches!(outcome, ExecuteOutcome::Failed(_)));
    assert!(queue.is_empty());

    // The busy flag was released: a fresh execute runs normally.
    queue.enqueue("next", item("next payload"));
    let relay = CapturingRelay::default();
    assert!(matches!(
        queue.execute(&relay, &context()).await,
        ExecuteOutcome::Submitted(ids) if ids.len() == 1
    ));
}

#[tokio::test]
async fn subscribers_observe_the_whole_enqueue_stream() -> Result<()> {
    let signer = signer();
    let factory = SignedPayloadFactory::new(signer.clone());
    let queue = SubmissionQueue::new(signer);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    queue.subscribe(move |entry| sink.lock().unwrap().push(entry.token.clone()));

    for token in ["a", "b", "c"] {
        let signed = factory
            .create_signed_payload(&raw_operation("data", token))
            .await?;
        queue.enqueue(token, signed);
    }

    assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c"]);
    Ok(())
}
