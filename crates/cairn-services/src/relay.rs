//! Relay client — hands an encoded bundle to the external submission relay.
//!
//! The relay forwards (and subsidizes) bundle submission to the ledger.
//! The wire contract is a JSON POST carrying the bundle bytes plus caller
//! context; the relay answers with a body whose `success` field must be
//! truthy — absence or falsy is a submission fault.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One bundle plus the caller context the relay requires.
#[derive(Debug, Clone)]
pub struct BundleSubmission {
    /// Encoded bundle bytes.
    pub bundle: Bytes,
    /// Platform label identifying the submitting application.
    pub platform: String,
    /// Ledger address of the submitting owner.
    pub owner: String,
    /// Optional grouping id (e.g. a repository) the relay may use for
    /// accounting. Omitted from the request when absent.
    pub group_id: Option<String>,
}

/// Destination for drained submission batches.
#[async_trait]
pub trait Relay: Send + Sync {
    async fn submit(&self, submission: &BundleSubmission) -> Result<(), RelayError>;
}

// ── HTTP implementation ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct SubmitRequest<'a> {
    /// Base64 of the bundle bytes.
    bundle: String,
    platform: &'a str,
    owner: &'a str,
    #[serde(rename = "groupId", skip_serializing_if = "Option::is_none")]
    group_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct SubmitResponse {
    /// Absent field deserializes false — treated as rejection.
    #[serde(default)]
    success: bool,
}

/// Relay client over HTTP.
pub struct HttpRelay {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRelay {
    /// Create a relay client for the given endpoint.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RelayError::Config(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Relay for HttpRelay {
    async fn submit(&self, submission: &BundleSubmission) -> Result<(), RelayError> {
        let body = SubmitRequest {
            bundle: BASE64.encode(&submission.bundle),
            platform: &submission.platform,
            owner: &submission.owner,
            group_id: submission.group_id.as_deref(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let parsed: SubmitResponse = response
            .json()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        if !parsed.success {
            return Err(RelayError::Rejected);
        }

        tracing::trace!(bytes = submission.bundle.len(), "bundle accepted by relay");
        Ok(())
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("relay client configuration invalid: {0}")]
    Config(String),

    #[error("relay transport failure: {0}")]
    Transport(String),

    #[error("relay did not report success for the submitted bundle")]
    Rejected,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let submission = BundleSubmission {
            bundle: Bytes::from_static(&[1, 2, 3]),
            platform: "cairn".to_owned(),
            owner: "owner-address".to_owned(),
            group_id: Some("repo-42".to_owned()),
        };
        let body = SubmitRequest {
            bundle: BASE64.encode(&submission.bundle),
            platform: &submission.platform,
            owner: &submission.owner,
            group_id: submission.group_id.as_deref(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["bundle"], "AQID");
        assert_eq!(json["platform"], "cairn");
        assert_eq!(json["owner"], "owner-address");
        assert_eq!(json["groupId"], "repo-42");
    }

    #[test]
    fn group_id_is_omitted_when_absent() {
        let body = SubmitRequest {
            bundle: String::new(),
            platform: "cairn",
            owner: "o",
            group_id: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("groupId").is_none());
    }

    #[test]
    fn missing_success_field_means_rejection() {
        let parsed: SubmitResponse = serde_json::from_str("{}").unwrap();
        assert!(!parsed.success);

        let parsed: SubmitResponse = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert!(!parsed.success);

        let parsed: SubmitResponse = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(parsed.success);
    }
}
