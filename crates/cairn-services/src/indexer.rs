//! Indexer client — queries ledger records pushed for a submitted item.
//!
//! The indexer is an external query service over the ledger. Records
//! become visible only after an ingestion delay, which is why callers
//! poll (see `poller`) instead of expecting immediate answers. The query
//! contract: filter records by a `Pushed-For` tag equal to the tracked
//! identifier, sorted ascending by ingestion time, returning each
//! record's full tag list.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use cairn_core::item::{ItemId, Tag};

/// Tag name linking a ledger record back to the operation it answers.
pub const PUSHED_FOR_TAG: &str = "Pushed-For";

/// One ledger record: its own id plus its tag list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRecord {
    pub id: String,
    pub tags: Vec<Tag>,
}

impl LedgerRecord {
    /// Value of the first tag with the given name, if present.
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.value.as_str())
    }
}

/// Ledger record source, filterable by the `Pushed-For` tag.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// All records pushed for `id`, ascending by ingestion time.
    async fn records_pushed_for(&self, id: &ItemId) -> Result<Vec<LedgerRecord>, IndexerError>;
}

// ── HTTP implementation ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct QueryResponse {
    data: Option<QueryData>,
}

#[derive(Deserialize)]
struct QueryData {
    transactions: Edges,
}

#[derive(Deserialize)]
struct Edges {
    edges: Vec<Edge>,
}

#[derive(Deserialize)]
struct Edge {
    node: Node,
}

#[derive(Deserialize)]
struct Node {
    id: String,
    tags: Vec<Tag>,
}

/// Indexer client speaking the GraphQL query contract.
pub struct HttpIndexer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpIndexer {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, IndexerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| IndexerError::Config(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    fn query_for(id: &ItemId) -> serde_json::Value {
        serde_json::json!({
            "query": "query($pushedFor: [String!]!) { \
                transactions( \
                    tags: [{ name: \"Pushed-For\", values: $pushedFor }], \
                    sort: INGESTED_AT_ASC \
                ) { edges { node { id tags { name value } } } } }",
            "variables": { "pushedFor": [id.to_hex()] },
        })
    }
}

#[async_trait]
impl Indexer for HttpIndexer {
    async fn records_pushed_for(&self, id: &ItemId) -> Result<Vec<LedgerRecord>, IndexerError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&Self::query_for(id))
            .send()
            .await
            .map_err(|e| IndexerError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| IndexerError::Transport(e.to_string()))?;

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| IndexerError::Transport(e.to_string()))?;

        let data = parsed
            .data
            .ok_or_else(|| IndexerError::Malformed("response carries no data field".to_owned()))?;

        Ok(data
            .transactions
            .edges
            .into_iter()
            .map(|edge| LedgerRecord {
                id: edge.node.id,
                tags: edge.node.tags,
            })
            .collect())
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    #[error("indexer client configuration invalid: {0}")]
    Config(String),

    #[error("indexer transport failure: {0}")]
    Transport(String),

    #[error("indexer returned a malformed response: {0}")]
    Malformed(String),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
