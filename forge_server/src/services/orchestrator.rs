//! Build orchestrator — drives one build end-to-end as a fixed phase sequence.
//!
//! Phases run strictly one after another; each phase emits its events, calls
//! its collaborators, and mutates the build record before the next phase
//! starts. Generator failures degrade to template output and ledger failures
//! are skipped; only unexpected internal errors abort a build.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::events::build::{BuildEvent, BuildResult};
use crate::models::build::{format_duration, BuildRecord, BuildStatus, ChainProof, GeneratedFile};
use crate::services::fingerprint;
use crate::services::generator::{CodeBundle, ContentGenerator};
use crate::services::ledger::{derive_build_account, LedgerClient, RecordPayload};
use crate::store::{BuildPatch, BuildStore};

const TOTAL_STEPS: u32 = 6;

/// Base-58 alphabet used for synthesized deployment addresses.
const PROGRAM_ID_ALPHABET: &[u8] =
    b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz123456789";

pub struct BuildOrchestrator {
    store: BuildStore,
    generator: Arc<dyn ContentGenerator>,
    ledger: Arc<dyn LedgerClient>,
    pacing: Duration,
}

impl BuildOrchestrator {
    pub fn new(
        store: BuildStore,
        generator: Arc<dyn ContentGenerator>,
        ledger: Arc<dyn LedgerClient>,
        pacing_ms: u64,
    ) -> Self {
        Self {
            store,
            generator,
            ledger,
            pacing: Duration::from_millis(pacing_ms),
        }
    }

    /// Run one build to completion. The record is created before any event is
    /// emitted; exactly one terminal event (`complete` or `error`) is emitted
    /// and the record ends in a terminal status. Errors never cross this
    /// boundary.
    pub async fn run(&self, prompt: &str, events: &UnboundedSender<BuildEvent>) -> String {
        let build_id = format!("build_{}", Uuid::new_v4().simple());
        let started_at = Utc::now();

        let record = BuildRecord::new(build_id.clone(), prompt, started_at);
        if let Err(e) = self.store.insert(record).await {
            tracing::error!(build_id = %build_id, "failed to create build record: {e}");
            emit(
                events,
                BuildEvent::Error {
                    error: "failed to create build record".to_string(),
                },
            );
            return build_id;
        }

        crate::metrics::build_status_changed(BuildStatus::InProgress.as_str());
        tracing::info!(build_id = %build_id, "build started");

        if let Err(e) = self.execute(&build_id, prompt, started_at, events).await {
            let elapsed = (Utc::now() - started_at).num_seconds();
            self.store
                .patch(
                    &build_id,
                    BuildPatch {
                        status: Some(BuildStatus::Failed),
                        completed_at: Some(Utc::now()),
                        duration: Some(format_duration(elapsed)),
                        ..Default::default()
                    },
                )
                .await;
            crate::metrics::build_status_changed(BuildStatus::Failed.as_str());
            crate::metrics::build_duration(elapsed.max(0) as u64 * 1000);
            tracing::error!(build_id = %build_id, "build failed: {e}");
            emit(events, BuildEvent::Error { error: e.to_string() });
        }

        build_id
    }

    async fn execute(
        &self,
        build_id: &str,
        prompt: &str,
        started_at: DateTime<Utc>,
        events: &UnboundedSender<BuildEvent>,
    ) -> anyhow::Result<()> {
        let account = derive_build_account(build_id);

        // ── Phase 1: register the build on the ledger ──
        progress(events, 1, "Registering build on the verification ledger...");
        let init_hash = fingerprint::sha256_hex(prompt.as_bytes());
        let mut ledger_active = true;
        match self
            .ledger
            .submit_record(
                &account,
                RecordPayload::new("initialize_build", &truncate_chars(prompt, 50), &init_hash),
            )
            .await
        {
            Ok(tx_ref) => {
                crate::metrics::ledger_submission("ok");
                self.store
                    .push_proof(
                        build_id,
                        ChainProof {
                            step: 0,
                            tx_ref: tx_ref.clone(),
                            hash: fingerprint::short(&init_hash),
                        },
                    )
                    .await;
                emit(events, BuildEvent::ChainLog { tx_ref, step: 0 });
            }
            Err(e) => {
                crate::metrics::ledger_submission("error");
                tracing::warn!(build_id, "ledger init failed, continuing unanchored: {e}");
                emit(
                    events,
                    BuildEvent::Terminal {
                        output: format!("⚠ ledger anchoring unavailable: {e}\n"),
                    },
                );
                ledger_active = false;
            }
        }
        self.pace().await;

        // ── Phase 2: analyze the prompt ──
        progress(events, 2, "Analyzing prompt...");
        let summary = match self.generator.generate(&analyze_prompt(prompt)).await {
            Ok(text) => first_paragraph(&text).unwrap_or_else(|| default_summary(prompt)),
            Err(e) => {
                tracing::debug!(build_id, "analyze call failed, using default summary: {e}");
                default_summary(prompt)
            }
        };
        emit(events, BuildEvent::Thinking { message: summary });
        self.pace().await;

        // ── Phase 3: generate program, SDK, and tests ──
        progress(events, 3, "Generating program source...");
        let bundle = match self.generator.generate(&codegen_prompt(prompt)).await {
            Ok(text) => CodeBundle::extract(&text, prompt),
            Err(e) => {
                crate::metrics::generator_fallback();
                tracing::warn!(build_id, "generation failed, using templates: {e}");
                emit(
                    events,
                    BuildEvent::Thinking {
                        message: format!(
                            "Generator unavailable ({e}), continuing with template output."
                        ),
                    },
                );
                CodeBundle::fallback(prompt)
            }
        };

        self.store
            .push_file(
                build_id,
                GeneratedFile {
                    name: "lib.rs".to_string(),
                    content: bundle.program.clone(),
                },
            )
            .await;
        let code_hash = fingerprint::sha256_hex(bundle.program.as_bytes());
        emit(
            events,
            BuildEvent::Code {
                file: "programs/lib.rs".to_string(),
                content: bundle.program.clone(),
            },
        );
        self.anchor_step(
            build_id,
            &account,
            ledger_active,
            2,
            "generate_code",
            "Program source generated",
            &code_hash,
            events,
        )
        .await;
        self.pace().await;

        // ── Phase 4: simulated compile ──
        progress(events, 4, "Compiling program...");
        for line in compile_transcript(prompt) {
            emit(events, BuildEvent::Terminal { output: line });
            self.pace().await;
        }
        let build_hash = fingerprint::sha256_hex(b"build_success");
        self.anchor_step(
            build_id,
            &account,
            ledger_active,
            3,
            "compile_program",
            "Program compiled",
            &build_hash,
            events,
        )
        .await;

        // ── Phase 5: client SDK and tests ──
        progress(events, 5, "Generating client SDK...");
        self.store
            .push_file(
                build_id,
                GeneratedFile {
                    name: "client.ts".to_string(),
                    content: bundle.sdk.clone(),
                },
            )
            .await;
        self.store
            .push_file(
                build_id,
                GeneratedFile {
                    name: "tests.ts".to_string(),
                    content: bundle.tests.clone(),
                },
            )
            .await;
        let sdk_hash = fingerprint::sha256_hex(bundle.sdk.as_bytes());
        emit(
            events,
            BuildEvent::Code {
                file: "client/sdk.ts".to_string(),
                content: bundle.sdk.clone(),
            },
        );
        self.anchor_step(
            build_id,
            &account,
            ledger_active,
            4,
            "generate_sdk",
            "Client SDK generated",
            &sdk_hash,
            events,
        )
        .await;
        self.pace().await;

        // ── Phase 6: finalize ──
        progress(events, 6, "Finalizing build...");
        let program_id = synth_program_id();
        let elapsed = (Utc::now() - started_at).num_seconds();
        let duration = format_duration(elapsed);
        self.store
            .patch(
                build_id,
                BuildPatch {
                    status: Some(BuildStatus::Success),
                    completed_at: Some(Utc::now()),
                    duration: Some(duration.clone()),
                    program_id: Some(program_id.clone()),
                },
            )
            .await;
        crate::metrics::build_status_changed(BuildStatus::Success.as_str());
        crate::metrics::build_duration(elapsed.max(0) as u64 * 1000);

        let chain_proof: Vec<String> = self
            .store
            .get(build_id)
            .await
            .map(|r| r.chain_proofs.iter().map(|p| p.tx_ref.clone()).collect())
            .unwrap_or_default();

        tracing::info!(
            build_id,
            status = "success",
            duration = %duration,
            proofs = chain_proof.len(),
            "build finished"
        );
        emit(
            events,
            BuildEvent::Complete {
                result: BuildResult {
                    agent_name: truncate_chars(prompt, 50),
                    program_id,
                    build_id: build_id.to_string(),
                    chain_proof,
                },
            },
        );

        Ok(())
    }

    /// Anchor one phase fingerprint in the ledger. Failures are skipped; a
    /// missing proof entry is an expected state, not an error.
    #[allow(clippy::too_many_arguments)]
    async fn anchor_step(
        &self,
        build_id: &str,
        account: &str,
        ledger_active: bool,
        step: u32,
        action: &str,
        description: &str,
        content_hash: &str,
        events: &UnboundedSender<BuildEvent>,
    ) {
        if !ledger_active {
            tracing::debug!(build_id, step, "ledger inactive, skipping anchor");
            return;
        }
        match self
            .ledger
            .submit_record(account, RecordPayload::new(action, description, content_hash))
            .await
        {
            Ok(tx_ref) => {
                crate::metrics::ledger_submission("ok");
                self.store
                    .push_proof(
                        build_id,
                        ChainProof {
                            step,
                            tx_ref: tx_ref.clone(),
                            hash: fingerprint::short(content_hash),
                        },
                    )
                    .await;
                emit(events, BuildEvent::ChainLog { tx_ref, step });
            }
            Err(e) => {
                crate::metrics::ledger_submission("error");
                tracing::warn!(build_id, step, "ledger anchor skipped: {e}");
            }
        }
    }

    async fn pace(&self) {
        if !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }
    }
}

fn emit(events: &UnboundedSender<BuildEvent>, event: BuildEvent) {
    crate::metrics::event_emitted(event.kind());
    if events.send(event).is_err() {
        // Subscriber gone; frames are discarded while the build runs on.
        tracing::debug!("stream event dropped: subscriber disconnected");
    }
}

fn progress(events: &UnboundedSender<BuildEvent>, step: u32, description: &str) {
    emit(
        events,
        BuildEvent::Progress {
            step,
            total: TOTAL_STEPS,
            description: description.to_string(),
        },
    );
}

fn analyze_prompt(prompt: &str) -> String {
    format!(
        "In one short paragraph, summarize the intent of this agent request and \
         the on-chain state and instructions it needs: \"{prompt}\""
    )
}

fn codegen_prompt(prompt: &str) -> String {
    format!(
        "You are an expert Solana/Anchor developer. Generate a complete Anchor \
         program for the request below.\n\
         - Provide the Rust program in a ```rust fenced block.\n\
         - Provide a TypeScript client SDK in a ```typescript fenced block.\n\
         - Provide TypeScript tests in a second ```typescript fenced block.\n\
         \nRequest: {prompt}"
    )
}

/// First prose paragraph of a generator response, before any code fence.
fn first_paragraph(text: &str) -> Option<String> {
    let prose = text.split("```").next().unwrap_or_default();
    let paragraph = prose
        .split("\n\n")
        .map(str::trim)
        .find(|p| !p.is_empty())?
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    Some(truncate_chars(&paragraph, 280))
}

fn default_summary(prompt: &str) -> String {
    format!(
        "Planned a minimal program for \"{}\": one state account, initialize and \
         execute instructions, and a typed client.",
        truncate_chars(prompt, 60)
    )
}

fn compile_transcript(prompt: &str) -> Vec<String> {
    vec![
        "$ anchor build\n".to_string(),
        "Compiling solana-program v1.18.0\n".to_string(),
        format!("Compiling {} v0.1.0\n", truncate_chars(prompt, 30)),
        "   Finished release [optimized] target(s)\n".to_string(),
        "✓ Build successful\n".to_string(),
    ]
}

/// 44-character address drawn from the base-58 alphabet.
fn synth_program_id() -> String {
    let mut rng = rand::thread_rng();
    (0..44)
        .map(|_| {
            let idx = rng.gen_range(0..PROGRAM_ID_ALPHABET.len());
            PROGRAM_ID_ALPHABET[idx] as char
        })
        .collect()
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::generator::GeneratorError;
    use crate::services::ledger::LedgerError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const GENERATOR_RESPONSE: &str = "I will build a counter with one state account.\n\n\
```rust\nuse anchor_lang::prelude::*;\n// counter program\n```\n\n\
```typescript\nexport class CounterClient {}\n```\n\n\
```typescript\ndescribe('counter', () => {});\n```\n";

    struct ScriptedGenerator;

    #[async_trait]
    impl ContentGenerator for ScriptedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GeneratorError> {
            Ok(GENERATOR_RESPONSE.to_string())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl ContentGenerator for FailingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GeneratorError> {
            Err(GeneratorError::Disabled)
        }
    }

    struct CountingLedger {
        submitted: AtomicUsize,
    }

    impl CountingLedger {
        fn new() -> Self {
            Self {
                submitted: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LedgerClient for CountingLedger {
        async fn submit_record(
            &self,
            _account: &str,
            _payload: RecordPayload,
        ) -> Result<String, LedgerError> {
            let n = self.submitted.fetch_add(1, Ordering::SeqCst);
            Ok(format!("ref_{n}"))
        }

        async fn read_record(&self, _account: &str) -> Result<serde_json::Value, LedgerError> {
            Ok(serde_json::json!({}))
        }
    }

    struct FailingLedger;

    #[async_trait]
    impl LedgerClient for FailingLedger {
        async fn submit_record(
            &self,
            _account: &str,
            _payload: RecordPayload,
        ) -> Result<String, LedgerError> {
            Err(LedgerError::Disabled)
        }

        async fn read_record(&self, _account: &str) -> Result<serde_json::Value, LedgerError> {
            Err(LedgerError::Disabled)
        }
    }

    async fn run_build(
        generator: Arc<dyn ContentGenerator>,
        ledger: Arc<dyn LedgerClient>,
    ) -> (BuildRecord, Vec<BuildEvent>) {
        let store = BuildStore::new();
        let orchestrator = BuildOrchestrator::new(store.clone(), generator, ledger, 0);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let build_id = orchestrator
            .run("Build a minimal counter program", &tx)
            .await;
        drop(tx);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        (store.get(&build_id).await.unwrap(), events)
    }

    #[tokio::test]
    async fn events_follow_the_phase_order() {
        let (_, events) =
            run_build(Arc::new(ScriptedGenerator), Arc::new(CountingLedger::new())).await;

        let kinds: Vec<&str> = events.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                "progress", "chain_log", // ledger init
                "progress", "thinking", // analyze
                "progress", "code", "chain_log", // program source
                "progress", "terminal", "terminal", "terminal", "terminal", "terminal",
                "chain_log", // compile
                "progress", "code", "chain_log", // sdk
                "progress", "complete", // finalize
            ]
        );

        let chain_steps: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                BuildEvent::ChainLog { step, .. } => Some(*step),
                _ => None,
            })
            .collect();
        assert_eq!(chain_steps, vec![0, 2, 3, 4]);

        let code_files: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                BuildEvent::Code { file, .. } => Some(file.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(code_files, vec!["programs/lib.rs", "client/sdk.ts"]);
    }

    #[tokio::test]
    async fn successful_build_reaches_terminal_state() {
        let (record, events) =
            run_build(Arc::new(ScriptedGenerator), Arc::new(CountingLedger::new())).await;

        assert_eq!(record.status, BuildStatus::Success);
        assert!(record.completed_at.is_some());
        assert!(record.duration.is_some());

        let program_id = record.program_id.unwrap();
        assert_eq!(program_id.chars().count(), 44);
        assert!(program_id
            .bytes()
            .all(|b| PROGRAM_ID_ALPHABET.contains(&b)));

        let steps: Vec<u32> = record.chain_proofs.iter().map(|p| p.step).collect();
        assert_eq!(steps, vec![0, 2, 3, 4]);
        assert!(steps.windows(2).all(|w| w[0] < w[1]));

        match events.last().unwrap() {
            BuildEvent::Complete { result } => {
                assert_eq!(result.build_id, record.id);
                assert_eq!(result.chain_proof.len(), 4);
            }
            other => panic!("expected complete, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn generated_artifacts_come_from_the_response() {
        let (record, _) =
            run_build(Arc::new(ScriptedGenerator), Arc::new(CountingLedger::new())).await;

        let names: Vec<&str> = record.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["lib.rs", "client.ts", "tests.ts"]);
        assert!(record.files[0].content.contains("counter program"));
        assert!(record.files[1].content.contains("CounterClient"));
        assert!(record.files[2].content.contains("describe"));
    }

    #[tokio::test]
    async fn generator_failure_degrades_to_templates_not_a_failed_build() {
        let (record, events) =
            run_build(Arc::new(FailingGenerator), Arc::new(CountingLedger::new())).await;

        assert_eq!(record.status, BuildStatus::Success);
        assert_eq!(record.files.len(), 3);
        assert!(record.files.iter().all(|f| !f.content.is_empty()));
        assert!(!events.iter().any(|e| e.kind() == "error"));
        // Degraded mode is surfaced as an extra thinking event.
        assert_eq!(events.iter().filter(|e| e.kind() == "thinking").count(), 2);
    }

    #[tokio::test]
    async fn ledger_failure_never_fails_the_build() {
        let (record, events) =
            run_build(Arc::new(ScriptedGenerator), Arc::new(FailingLedger)).await;

        assert_eq!(record.status, BuildStatus::Success);
        assert!(record.chain_proofs.is_empty());
        assert!(!events.iter().any(|e| e.kind() == "chain_log"));
        assert!(!events.iter().any(|e| e.kind() == "error"));

        // The init failure is reported once as a transcript warning.
        let first_terminal = events
            .iter()
            .find_map(|e| match e {
                BuildEvent::Terminal { output } => Some(output.clone()),
                _ => None,
            })
            .unwrap();
        assert!(first_terminal.contains("ledger"));
    }

    #[test]
    fn first_paragraph_stops_at_code_fences() {
        let text = "A short plan.\n\n```rust\nfn main() {}\n```";
        assert_eq!(first_paragraph(text).unwrap(), "A short plan.");
        assert!(first_paragraph("```rust\nfn main() {}\n```").is_none());
    }

    #[test]
    fn synthesized_ids_use_the_restricted_alphabet() {
        for _ in 0..16 {
            let id = synth_program_id();
            assert_eq!(id.len(), 44);
            assert!(!id.contains('0') && !id.contains('O') && !id.contains('I') && !id.contains('l'));
        }
    }
}
