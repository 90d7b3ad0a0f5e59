//! Build record — one per orchestrated build, retained for the process lifetime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a build. Transitions once from `InProgress` to a
/// terminal state and never reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    InProgress,
    Success,
    Failed,
}

impl BuildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::InProgress => "in_progress",
            BuildStatus::Success => "success",
            BuildStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BuildStatus::InProgress)
    }
}

/// One ledger anchor: the fingerprint of a phase artifact plus the durable
/// reference returned by the ledger. Appended in phase order, never removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainProof {
    pub step: u32,
    pub tx_ref: String,
    pub hash: String,
}

/// A generated artifact retained on the build record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub id: String,
    pub prompt: String,
    pub status: BuildStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Human-readable elapsed time ("4m 28s"), set at the terminal transition.
    pub duration: Option<String>,
    /// Deployed artifact address, set only on success.
    pub program_id: Option<String>,
    pub chain_proofs: Vec<ChainProof>,
    pub files: Vec<GeneratedFile>,
}

impl BuildRecord {
    pub fn new(id: String, prompt: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            prompt: prompt.to_string(),
            status: BuildStatus::InProgress,
            started_at,
            completed_at: None,
            duration: None,
            program_id: None,
            chain_proofs: Vec::new(),
            files: Vec::new(),
        }
    }
}

/// Format elapsed seconds the way build durations are displayed ("3m 42s").
pub fn format_duration(total_secs: i64) -> String {
    let secs = total_secs.max(0);
    format!("{}m {}s", secs / 60, secs % 60)
}
