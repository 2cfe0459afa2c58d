//! Cairn integration test harness.
//!
//! These tests exercise the full pipeline in one process: raw operations
//! through the signing factory, the submission queue, the bundle codec,
//! and the confirmation poller, with the relay and indexer replaced by
//! in-memory doubles. No network access is required.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use cairn_core::crypto::{ItemSigner, Keypair, LocalSigner};
use cairn_core::item::{DataItem, ItemId, Tag};
use cairn_services::indexer::{Indexer, IndexerError, LedgerRecord};
use cairn_services::queue::{SubmissionQueue, SubmitContext};
use cairn_services::relay::{BundleSubmission, Relay, RelayError};

mod bundles;
mod pipeline;
mod polling;

// ── Harness ───────────────────────────────────────────────────────────────────

pub fn signer() -> Arc<dyn ItemSigner> {
    Arc::new(LocalSigner::new(Keypair::generate()))
}

pub fn queue() -> SubmissionQueue {
    SubmissionQueue::new(signer())
}

pub fn item(data: &str) -> DataItem {
    DataItem::new(
        Bytes::copy_from_slice(data.as_bytes()),
        vec![Tag::new("App-Name", "cairn")],
    )
}

pub fn context() -> SubmitContext {
    SubmitContext {
        platform: "cairn".to_owned(),
        owner: "owner-address".to_owned(),
        group_id: Some("repo-7".to_owned()),
    }
}

/// Relay double that records every submission it accepts.
#[derive(Default)]
pub struct CapturingRelay {
    pub submissions: Mutex<Vec<BundleSubmission>>,
}

impl CapturingRelay {
    pub fn only_submission(&self) -> BundleSubmission {
        let submissions = self.submissions.lock().unwrap();
        assert_eq!(submissions.len(), 1, "expected exactly one submission");
        submissions[0].clone()
    }
}

#[async_trait]
impl Relay for CapturingRelay {
    async fn submit(&self, submission: &BundleSubmission) -> Result<(), RelayError> {
        self.submissions.lock().unwrap().push(submission.clone());
        Ok(())
    }
}

/// Relay double that rejects everything.
pub struct FailingRelay;

#[async_trait]
impl Relay for FailingRelay {
    async fn submit(&self, _submission: &BundleSubmission) -> Result<(), RelayError> {
        Err(RelayError::Rejected)
    }
}

/// One scripted indexer response.
pub enum Script {
    Records(Vec<LedgerRecord>),
    Fault,
}

/// Indexer double that replays a script, then answers empty.
pub struct ScriptedIndexer {
    script: Mutex<VecDeque<Script>>,
    calls: AtomicU32,
}

impl ScriptedIndexer {
    pub fn new(script: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Indexer for ScriptedIndexer {
    async fn records_pushed_for(&self, _id: &ItemId) -> Result<Vec<LedgerRecord>, IndexerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(Script::Records(records)) => Ok(records),
            Some(Script::Fault) => Err(IndexerError::Transport("scripted fault".to_owned())),
            None => Ok(Vec::new()),
        }
    }
}

/// Ledger record answering a poll for `id` with the given tags.
pub fn ledger_record(id: &ItemId, tags: Vec<Tag>) -> LedgerRecord {
    let mut all = vec![Tag::new("Pushed-For", id.to_hex())];
    all.extend(tags);
    LedgerRecord {
        id: format!("ledger-{}", id.to_hex()),
        tags: all,
    }
}
