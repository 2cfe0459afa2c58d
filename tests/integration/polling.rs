//! Submission followed by confirmation, with a scripted ledger.

use crate::*;

use cairn_core::config::ConfirmationConfig;
use cairn_services::poller::{ConfirmationPoller, PollError, PollOutcome, PollSpec};
use cairn_services::queue::ExecuteOutcome;

fn confirmation(max_attempts: u32) -> ConfirmationConfig {
    ConfirmationConfig {
        max_attempts,
        polling_interval_ms: 3_000,
        initial_backoff_ms: 5_000,
    }
}

/// Run a batch through the queue and return the submitted ids.
async fn submit_one(payload: &str) -> ItemId {
    let queue = queue();
    queue.enqueue("tok", item(payload));
    let relay = CapturingRelay::default();
    let ExecuteOutcome::Submitted(ids) = queue.execute(&relay, &context()).await else {
        panic!("expected Submitted");
    };
    ids[0]
}

#[tokio::test(start_paused = true)]
async fn submitted_item_confirms_once_the_ledger_catches_up() {
    let id = submit_one("buy tokens").await;
    let spec = PollSpec::token_purchase();

    // The ledger stays quiet for two polls, then the confirmation lands.
    let indexer = ScriptedIndexer::new(vec![
        Script::Records(vec![]),
        Script::Records(vec![]),
        Script::Records(vec![ledger_record(
            &id,
            vec![
                Tag::new(&spec.success_tag, "yes"),
                Tag::new(&spec.success_data_tag, "order filled"),
            ],
        )]),
    ]);

    let poller = ConfirmationPoller::new(indexer.clone(), confirmation(10), spec);
    let outcome = poller.poll(&id).await.unwrap();
    assert_eq!(outcome, PollOutcome::Success("order filled".to_owned()));
    assert_eq!(indexer.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn failed_operation_reports_the_ledger_detail() {
    let id = submit_one("sell tokens").await;
    let spec = PollSpec::token_sale();

    let indexer = ScriptedIndexer::new(vec![Script::Records(vec![ledger_record(
        &id,
        vec![
            Tag::new(&spec.error_tag, "yes"),
            Tag::new(&spec.error_detail_tag, "order book closed"),
        ],
    )])]);

    let poller = ConfirmationPoller::new(indexer, confirmation(10), spec);
    let outcome = poller.poll(&id).await.unwrap();
    assert_eq!(outcome, PollOutcome::Failure("order book closed".to_owned()));
}

#[tokio::test(start_paused = true)]
async fn unindexed_item_times_out_carrying_its_id() {
    let id = submit_one("never indexed").await;

    let indexer = ScriptedIndexer::new(vec![]);
    let poller = ConfirmationPoller::new(indexer.clone(), confirmation(4), PollSpec::transaction());

    let PollError::TimedOut { id: reported, attempts } = poller.poll(&id).await.unwrap_err();
    assert_eq!(reported, id);
    assert_eq!(attempts, 4);
    assert_eq!(indexer.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn transient_ledger_faults_do_not_end_the_session() {
    let id = submit_one("flaky ledger").await;
    let spec = PollSpec::liquidity_deposit();

    let indexer = ScriptedIndexer::new(vec![
        Script::Fault,
        Script::Records(vec![ledger_record(
            &id,
            vec![
                Tag::new(&spec.success_tag, "yes"),
                Tag::new(&spec.success_data_tag, "deposited"),
            ],
        )]),
    ]);

    let poller = ConfirmationPoller::new(indexer, confirmation(5), spec);
    let outcome = poller.poll(&id).await.unwrap();
    assert_eq!(outcome, PollOutcome::Success("deposited".to_owned()));
}
