//! Confirmation poller — decides whether a submitted operation landed.
//!
//! The ledger only becomes queryable after an indexing delay, so a
//! submission id cannot be checked once; it has to be polled. This is
//! the one polling algorithm in the codebase: every operation kind
//! (token purchase, token sale, liquidity deposit, pool creation,
//! generic availability) instantiates it with its own [`PollSpec`]
//! instead of duplicating the loop.
//!
//! A transient indexer fault during a single attempt is logged and
//! swallowed — it consumes the attempt and the loop continues. Attempt
//! exhaustion is a hard timeout fault the caller must handle.

use std::sync::Arc;

use cairn_core::config::ConfirmationConfig;
use cairn_core::item::ItemId;

use crate::indexer::{Indexer, LedgerRecord};

/// Terminal-tag configuration for one operation kind.
///
/// `success_tag` / `error_tag` are tag names whose presence on a ledger
/// record is terminal. The companion data tags carry the detail; when a
/// companion is absent the matched tag's own value is used.
#[derive(Debug, Clone)]
pub struct PollSpec {
    pub success_tag: String,
    pub error_tag: String,
    pub success_data_tag: String,
    pub error_detail_tag: String,
}

impl PollSpec {
    fn pair(success_tag: &str, error_tag: &str) -> Self {
        Self {
            success_tag: success_tag.to_owned(),
            error_tag: error_tag.to_owned(),
            success_data_tag: "Result".to_owned(),
            error_detail_tag: "Message".to_owned(),
        }
    }

    pub fn token_purchase() -> Self {
        Self::pair("Purchase-Confirmation", "Purchase-Error")
    }

    pub fn token_sale() -> Self {
        Self::pair("Sale-Confirmation", "Sale-Error")
    }

    pub fn liquidity_deposit() -> Self {
        Self::pair("Deposit-Confirmation", "Deposit-Error")
    }

    pub fn pool_creation() -> Self {
        Self::pair("Pool-Confirmation", "Pool-Error")
    }

    /// Generic transaction availability.
    pub fn transaction() -> Self {
        Self::pair("Confirmation", "Error")
    }
}

/// Terminal result of a poll session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The operation succeeded; carries the result data.
    Success(String),
    /// The ledger recorded an explicit failure; carries the detail.
    Failure(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// No terminal record appeared within the attempt budget.
    #[error("no terminal record for {id} after {attempts} attempts")]
    TimedOut { id: ItemId, attempts: u32 },
}

/// Parametrized confirmation poll loop.
pub struct ConfirmationPoller {
    indexer: Arc<dyn Indexer>,
    config: ConfirmationConfig,
    spec: PollSpec,
}

impl ConfirmationPoller {
    pub fn new(indexer: Arc<dyn Indexer>, config: ConfirmationConfig, spec: PollSpec) -> Self {
        Self {
            indexer,
            config,
            spec,
        }
    }

    /// Poll until a terminal record appears or the budget is spent.
    ///
    /// Worst-case wall clock: `initial_backoff + max_attempts × polling_interval`.
    pub async fn poll(&self, id: &ItemId) -> Result<PollOutcome, PollError> {
        tokio::time::sleep(self.config.initial_backoff()).await;

        for attempt in 1..=self.config.max_attempts {
            match self.indexer.records_pushed_for(id).await {
                Ok(records) => {
                    if let Some(outcome) = self.scan(&records) {
                        tracing::debug!(id = %id, attempt, outcome = ?outcome, "poll terminal");
                        return Ok(outcome);
                    }
                }
                Err(e) => {
                    // Transient: costs the attempt, does not end the session.
                    tracing::warn!(id = %id, attempt, error = %e, "poll attempt failed");
                }
            }
            tokio::time::sleep(self.config.polling_interval()).await;
        }

        Err(PollError::TimedOut {
            id: *id,
            attempts: self.config.max_attempts,
        })
    }

    /// Inspect one response. Error records take precedence over success
    /// records — the indexer is untrusted and a response carrying both
    /// must not be read as a success.
    fn scan(&self, records: &[LedgerRecord]) -> Option<PollOutcome> {
        for record in records {
            if let Some(matched) = record.tag_value(&self.spec.error_tag) {
                let detail = record
                    .tag_value(&self.spec.error_detail_tag)
                    .unwrap_or(matched);
                return Some(PollOutcome::Failure(detail.to_owned()));
            }
        }
        for record in records {
            if let Some(matched) = record.tag_value(&self.spec.success_tag) {
                let data = record
                    .tag_value(&self.spec.success_data_tag)
                    .unwrap_or(matched);
                return Some(PollOutcome::Success(data.to_owned()));
            }
        }
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
