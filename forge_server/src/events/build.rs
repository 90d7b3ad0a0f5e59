//! Build event definitions for the live stream.

use serde::{Deserialize, Serialize};

/// Events emitted while a build runs. One JSON object per stream frame,
/// tagged by `type`, exhaustively matched at the serialization boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuildEvent {
    /// Phase transition within the fixed build sequence.
    Progress {
        step: u32,
        total: u32,
        description: String,
    },
    /// Reasoning emitted while the generator works.
    Thinking { message: String },
    /// A generated artifact, streamed in full.
    Code { file: String, content: String },
    /// One line of simulated compiler/deploy transcript.
    Terminal { output: String },
    /// A verification record was anchored in the ledger.
    ChainLog { tx_ref: String, step: u32 },
    /// Terminal event: the build finished successfully.
    Complete { result: BuildResult },
    /// Terminal event: the build aborted.
    Error { error: String },
}

impl BuildEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            BuildEvent::Progress { .. } => "progress",
            BuildEvent::Thinking { .. } => "thinking",
            BuildEvent::Code { .. } => "code",
            BuildEvent::Terminal { .. } => "terminal",
            BuildEvent::ChainLog { .. } => "chain_log",
            BuildEvent::Complete { .. } => "complete",
            BuildEvent::Error { .. } => "error",
        }
    }
}

/// Payload of the `complete` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildResult {
    pub agent_name: String,
    pub program_id: String,
    pub build_id: String,
    pub chain_proof: Vec<String>,
}
