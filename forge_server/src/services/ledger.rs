//! Verification ledger client — external append-only log of build proofs.
//!
//! Every call is best-effort from the orchestrator's point of view: the
//! result must be inspected and failures skipped, never propagated into a
//! build failure.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::ForgeConfig;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger endpoint not configured")]
    Disabled,
    #[error("ledger request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("ledger endpoint returned {status}")]
    Api { status: u16 },
    #[error("ledger response missing reference id")]
    MalformedResponse,
}

/// One record appended to a build's ledger account.
#[derive(Debug, Clone, Serialize)]
pub struct RecordPayload {
    pub action: String,
    pub description: String,
    pub content_hash: String,
}

impl RecordPayload {
    pub fn new(action: &str, description: &str, content_hash: &str) -> Self {
        Self {
            action: action.to_string(),
            description: description.to_string(),
            content_hash: content_hash.to_string(),
        }
    }
}

/// External append-only verification log. `submit_record` returns a durable
/// reference id for the appended record.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn submit_record(
        &self,
        account: &str,
        payload: RecordPayload,
    ) -> Result<String, LedgerError>;

    async fn read_record(&self, account: &str) -> Result<serde_json::Value, LedgerError>;
}

/// Deterministic per-build ledger account, derived from the build id.
pub fn derive_build_account(build_id: &str) -> String {
    let digest = Sha256::digest(format!("build:{build_id}").as_bytes());
    hex::encode(&digest[..20])
}

/// JSON-over-HTTP ledger client. Protocol internals (signing, consensus) are
/// the endpoint's concern; this client only appends and reads records.
pub struct HttpLedgerClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLedgerClient {
    pub fn new(config: &ForgeConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.ledger_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.ledger_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn submit_record(
        &self,
        account: &str,
        payload: RecordPayload,
    ) -> Result<String, LedgerError> {
        if self.base_url.is_empty() {
            return Err(LedgerError::Disabled);
        }

        let url = format!("{}/records", self.base_url);
        let body = serde_json::json!({
            "account": account,
            "action": payload.action,
            "description": payload.description,
            "content_hash": payload.content_hash,
        });

        let resp = self.client.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(LedgerError::Api {
                status: resp.status().as_u16(),
            });
        }

        let reply: serde_json::Value = resp.json().await?;
        reply["reference_id"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or(LedgerError::MalformedResponse)
    }

    async fn read_record(&self, account: &str) -> Result<serde_json::Value, LedgerError> {
        if self.base_url.is_empty() {
            return Err(LedgerError::Disabled);
        }

        let url = format!("{}/records/{}", self.base_url, account);
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(LedgerError::Api {
                status: resp.status().as_u16(),
            });
        }

        Ok(resp.json().await?)
    }
}
