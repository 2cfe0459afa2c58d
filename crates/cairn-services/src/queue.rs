//! Submission queue — a single-flight batcher for signed items.
//!
//! Arbitrary producers enqueue items under caller-chosen correlation
//! tokens; on demand the queue drains everything pending, encodes one
//! bundle, and hands it to a relay. At most one drain-and-submit runs at
//! a time per queue: `execute` claims the busy flag synchronously, before
//! its first await, so two near-simultaneous calls cannot both proceed.
//!
//! The application's composition root owns the single queue instance and
//! injects it where needed — there is no process-global state, which is
//! also what lets tests construct independent queues.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use cairn_core::bundle;
use cairn_core::crypto::ItemSigner;
use cairn_core::item::{DataItem, ItemId};

use crate::relay::{BundleSubmission, Relay};

/// One pending submission: a caller-chosen token and the signed payload.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub token: String,
    pub item: DataItem,
}

/// Caller context forwarded to the relay with every batch.
#[derive(Debug, Clone)]
pub struct SubmitContext {
    pub platform: String,
    pub owner: String,
    pub group_id: Option<String>,
}

/// Outcome of one `execute` call. The variants keep "batch in flight",
/// "nothing was pending", and "something failed" distinguishable —
/// callers must never have to guess what an empty result meant.
#[derive(Debug, PartialEq)]
pub enum ExecuteOutcome {
    /// Another execution is in flight; the pending list was not touched.
    Busy,
    /// The pending list was empty.
    NothingToSubmit,
    /// The batch was accepted; item ids in submission order.
    Submitted(Vec<ItemId>),
    /// Draining, encoding, or submission failed; the batch was abandoned.
    Failed(String),
}

type Subscriber = Arc<dyn Fn(&QueueEntry) + Send + Sync>;

/// Resets the busy flag on every exit path, panics included.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Single-flight submission queue.
pub struct SubmissionQueue {
    pending: Mutex<VecDeque<QueueEntry>>,
    subscribers: Mutex<Vec<Subscriber>>,
    busy: AtomicBool,
    signer: Arc<dyn ItemSigner>,
}

impl SubmissionQueue {
    pub fn new(signer: Arc<dyn ItemSigner>) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            subscribers: Mutex::new(Vec::new()),
            busy: AtomicBool::new(false),
            signer,
        }
    }

    /// Append an entry unless its token is already pending (no-op then).
    /// Returns true when the entry was inserted. Subscribers are notified
    /// of every inserted entry, outside the queue lock.
    pub fn enqueue(&self, token: impl Into<String>, item: DataItem) -> bool {
        let entry = QueueEntry {
            token: token.into(),
            item,
        };
        {
            let mut pending = self.lock_pending();
            if pending.iter().any(|e| e.token == entry.token) {
                tracing::trace!(token = %entry.token, "duplicate token, enqueue ignored");
                return false;
            }
            pending.push_back(entry.clone());
        }
        self.notify(&entry);
        true
    }

    /// Remove and return the entry with this token, if still pending.
    /// The relative order of the remaining entries is unchanged.
    pub fn dequeue_by_token(&self, token: &str) -> Option<QueueEntry> {
        let mut pending = self.lock_pending();
        let index = pending.iter().position(|e| e.token == token)?;
        pending.remove(index)
    }

    /// Remove and return the earliest-enqueued entry.
    pub fn dequeue_oldest(&self) -> Option<QueueEntry> {
        self.lock_pending().pop_front()
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.lock_pending().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_pending().is_empty()
    }

    /// Register a callback invoked for every newly enqueued entry.
    /// A panicking subscriber is caught and logged; it cannot corrupt
    /// the queue or suppress other subscribers. Callbacks run without
    /// any queue lock held, so a subscriber may enqueue or subscribe.
    pub fn subscribe(&self, subscriber: impl Fn(&QueueEntry) + Send + Sync + 'static) {
        self.lock_subscribers().push(Arc::new(subscriber));
    }

    /// Drain everything pending into one bundle and submit it.
    ///
    /// Single-flight: when a batch is already in flight this returns
    /// [`ExecuteOutcome::Busy`] immediately without mutating the pending
    /// list. The busy claim happens before the first suspension point.
    /// Items are drained, bundled, and reported oldest-first, matching
    /// enqueue order. Any fault abandons the drained batch.
    pub async fn execute(&self, relay: &dyn Relay, context: &SubmitContext) -> ExecuteOutcome {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return ExecuteOutcome::Busy;
        }
        let _guard = BusyGuard(&self.busy);

        let mut drained = Vec::new();
        while let Some(entry) = self.dequeue_oldest() {
            drained.push(entry);
        }
        if drained.is_empty() {
            return ExecuteOutcome::NothingToSubmit;
        }

        let mut items: Vec<DataItem> = drained.into_iter().map(|e| e.item).collect();
        let bytes = match bundle::encode(&mut items, self.signer.as_ref()).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "batch abandoned: bundle encoding failed");
                return ExecuteOutcome::Failed(e.to_string());
            }
        };

        let ids: Option<Vec<ItemId>> = items.iter().map(|i| i.id()).collect();
        let Some(ids) = ids else {
            // encode signs every item; an unsigned one here is a bug.
            return ExecuteOutcome::Failed("item left unsigned after encoding".to_owned());
        };

        let submission = BundleSubmission {
            bundle: bytes,
            platform: context.platform.clone(),
            owner: context.owner.clone(),
            group_id: context.group_id.clone(),
        };
        match relay.submit(&submission).await {
            Ok(()) => {
                tracing::debug!(items = ids.len(), "batch submitted");
                ExecuteOutcome::Submitted(ids)
            }
            Err(e) => {
                tracing::warn!(error = %e, "batch abandoned: relay submission failed");
                ExecuteOutcome::Failed(e.to_string())
            }
        }
    }

    fn notify(&self, entry: &QueueEntry) {
        // Snapshot first: invoking under the lock would deadlock any
        // subscriber that re-enters the queue.
        let subscribers: Vec<Subscriber> = self.lock_subscribers().iter().cloned().collect();
        for subscriber in subscribers {
            if catch_unwind(AssertUnwindSafe(|| subscriber(entry))).is_err() {
                tracing::warn!(token = %entry.token, "queue subscriber panicked");
            }
        }
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, VecDeque<QueueEntry>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
