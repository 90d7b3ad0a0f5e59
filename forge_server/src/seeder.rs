//! Demo seeding — completed builds so history and stats render on a fresh
//! process. Enabled with `--seed-demo`; idempotent.

use chrono::{DateTime, Duration, Utc};

use crate::models::build::{BuildRecord, BuildStatus, ChainProof, GeneratedFile};
use crate::services::fingerprint;
use crate::store::BuildStore;

pub async fn seed_demo_builds(store: &BuildStore) -> anyhow::Result<usize> {
    let mut seeded = 0;
    for record in demo_records() {
        if store.get(&record.id).await.is_some() {
            continue;
        }
        store.insert(record).await?;
        seeded += 1;
    }
    Ok(seeded)
}

fn demo_proof(build: &str, step: u32) -> ChainProof {
    let content_hash = fingerprint::sha256_hex(format!("{build}-step-{step}").as_bytes());
    ChainProof {
        step,
        tx_ref: fingerprint::sha256_hex(format!("{build}-ref-{step}").as_bytes()),
        hash: fingerprint::short(&content_hash),
    }
}

fn demo_records() -> Vec<BuildRecord> {
    let now = Utc::now();

    vec![
        completed_record(
            "build_demo_escrow",
            "Build an escrow agent with time-locked release",
            now - Duration::hours(3),
            252,
            Some("3sKqT9mVb2XwPzR7NcJ4HgD8fLtYaUe6WiBnQ5ZxA1Mk"),
            vec![
                GeneratedFile {
                    name: "lib.rs".to_string(),
                    content: "use anchor_lang::prelude::*;\n\n#[program]\npub mod escrow_agent {\n    use super::*;\n\n    pub fn lock(ctx: Context<Lock>, amount: u64, release_at: i64) -> Result<()> {\n        let vault = &mut ctx.accounts.vault;\n        vault.amount = amount;\n        vault.release_at = release_at;\n        Ok(())\n    }\n}\n".to_string(),
                },
                GeneratedFile {
                    name: "client.ts".to_string(),
                    content: "export class EscrowClient {\n  async lock(amount: number, releaseAt: number): Promise<string> {\n    return this.program.methods.lock(amount, releaseAt).rpc();\n  }\n}\n".to_string(),
                },
            ],
        ),
        completed_record(
            "build_demo_registry",
            "Build an on-chain agent registry with staked listings",
            now - Duration::hours(1),
            184,
            Some("7rWnH4cTgX2LkVdQ9BzM5pFsJ3aYe8NuKbD6RqZtPw1C"),
            vec![GeneratedFile {
                name: "lib.rs".to_string(),
                content: "use anchor_lang::prelude::*;\n\n#[program]\npub mod agent_registry {\n    use super::*;\n\n    pub fn list_agent(ctx: Context<ListAgent>, stake: u64) -> Result<()> {\n        ctx.accounts.listing.stake = stake;\n        Ok(())\n    }\n}\n".to_string(),
            }],
        ),
        failed_record(
            "build_demo_rejected",
            "Build a lending pool with adaptive interest curves",
            now - Duration::minutes(20),
            41,
        ),
    ]
}

fn completed_record(
    id: &str,
    prompt: &str,
    started_at: DateTime<Utc>,
    duration_secs: i64,
    program_id: Option<&str>,
    files: Vec<GeneratedFile>,
) -> BuildRecord {
    BuildRecord {
        id: id.to_string(),
        prompt: prompt.to_string(),
        status: BuildStatus::Success,
        started_at,
        completed_at: Some(started_at + Duration::seconds(duration_secs)),
        duration: Some(crate::models::build::format_duration(duration_secs)),
        program_id: program_id.map(str::to_string),
        chain_proofs: [0u32, 2, 3, 4].iter().map(|s| demo_proof(id, *s)).collect(),
        files,
    }
}

fn failed_record(id: &str, prompt: &str, started_at: DateTime<Utc>, duration_secs: i64) -> BuildRecord {
    BuildRecord {
        id: id.to_string(),
        prompt: prompt.to_string(),
        status: BuildStatus::Failed,
        started_at,
        completed_at: Some(started_at + Duration::seconds(duration_secs)),
        duration: Some(crate::models::build::format_duration(duration_secs)),
        program_id: None,
        chain_proofs: vec![demo_proof(id, 0)],
        files: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let store = BuildStore::new();
        assert_eq!(seed_demo_builds(&store).await.unwrap(), 3);
        assert_eq!(seed_demo_builds(&store).await.unwrap(), 0);
        assert_eq!(store.count().await, 3);
    }

    #[tokio::test]
    async fn demo_records_hold_the_terminal_invariants() {
        let store = BuildStore::new();
        seed_demo_builds(&store).await.unwrap();
        for record in store.list_all().await {
            assert!(record.status.is_terminal());
            assert!(record.completed_at.is_some());
            assert!(record.duration.is_some());
            let steps: Vec<u32> = record.chain_proofs.iter().map(|p| p.step).collect();
            assert!(steps.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
