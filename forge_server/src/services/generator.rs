//! Content generator — prompt-to-text client plus artifact extraction.
//!
//! The generator returns free-form text; nothing about it can be assumed
//! well-formed. Extraction treats the response as a fallible parse with a
//! deterministic template fallback per artifact, so a build always ends up
//! with non-empty program, SDK, and test sources.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;

use crate::config::ForgeConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("generator API key not configured")]
    Disabled,
    #[error("generator request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("generator endpoint returned {status}")]
    Api { status: u16 },
    #[error("generator response missing text content")]
    MalformedResponse,
}

/// Produces unstructured text from a prompt. Calls are single-attempt with a
/// bounded timeout; callers degrade on failure rather than retry.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError>;
}

/// HTTP client for the Anthropic Messages API.
pub struct AnthropicGenerator {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl AnthropicGenerator {
    pub fn new(config: &ForgeConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.generator_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.generator_url.clone(),
            api_key: config.generator_api_key.clone(),
            model: config.generator_model.clone(),
        })
    }
}

#[async_trait]
impl ContentGenerator for AnthropicGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError> {
        if self.api_key.is_empty() {
            return Err(GeneratorError::Disabled);
        }

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let resp = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            tracing::warn!(status, "generator request rejected: {}", text);
            return Err(GeneratorError::Api { status });
        }

        let payload: serde_json::Value = resp.json().await?;
        payload["content"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or(GeneratorError::MalformedResponse)
    }
}

// ── Artifact extraction ──

static RUST_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```rust\n(.*?)```").unwrap());
static TS_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:typescript|ts)\n(.*?)```").unwrap());

/// The three artifacts every build produces: program source, client SDK
/// source, and test source. Never empty.
#[derive(Debug, Clone)]
pub struct CodeBundle {
    pub program: String,
    pub sdk: String,
    pub tests: String,
}

impl CodeBundle {
    /// Extract artifacts from a generator response. The program is the first
    /// rust-tagged fenced block; the SDK is the first typescript-tagged block
    /// and the tests the second, when present. Each missing artifact falls
    /// back to a template derived from the prompt.
    pub fn extract(response: &str, prompt: &str) -> Self {
        let program = match RUST_BLOCK.captures(response) {
            Some(caps) => caps[1].to_string(),
            None => {
                tracing::debug!("no rust block in generator response, using template");
                fallback_program(prompt)
            }
        };

        let ts_blocks: Vec<String> = TS_BLOCK
            .captures_iter(response)
            .map(|caps| caps[1].to_string())
            .collect();

        let sdk = ts_blocks
            .first()
            .cloned()
            .unwrap_or_else(|| fallback_sdk(prompt));
        let tests = ts_blocks
            .get(1)
            .cloned()
            .unwrap_or_else(|| fallback_tests(prompt));

        Self { program, sdk, tests }
    }

    /// All-template bundle, used when the generator call itself fails.
    pub fn fallback(prompt: &str) -> Self {
        Self {
            program: fallback_program(prompt),
            sdk: fallback_sdk(prompt),
            tests: fallback_tests(prompt),
        }
    }
}

/// Derive a valid module identifier from free-form prompt text.
fn module_name(prompt: &str) -> String {
    let name: String = prompt
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(30)
        .collect();
    if name.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        name
    } else {
        format!("agent_{name}")
    }
}

fn fallback_program(prompt: &str) -> String {
    let name = module_name(prompt);
    format!(
        r#"use anchor_lang::prelude::*;

declare_id!("11111111111111111111111111111111");

#[program]
pub mod {name} {{
    use super::*;

    pub fn initialize(ctx: Context<Initialize>) -> Result<()> {{
        let state = &mut ctx.accounts.state;
        state.authority = ctx.accounts.authority.key();
        state.initialized = true;
        Ok(())
    }}

    pub fn execute(ctx: Context<Execute>, data: String) -> Result<()> {{
        let state = &ctx.accounts.state;
        require!(state.initialized, ForgeError::NotInitialized);
        require_keys_eq!(
            state.authority,
            ctx.accounts.authority.key(),
            ForgeError::Unauthorized
        );
        msg!("execute: {{}}", data);
        Ok(())
    }}
}}

#[derive(Accounts)]
pub struct Initialize<'info> {{
    #[account(init, payer = authority, space = 8 + 32 + 1, seeds = [b"state"], bump)]
    pub state: Account<'info, ProgramState>,
    #[account(mut)]
    pub authority: Signer<'info>,
    pub system_program: Program<'info, System>,
}}

#[derive(Accounts)]
pub struct Execute<'info> {{
    #[account(seeds = [b"state"], bump)]
    pub state: Account<'info, ProgramState>,
    pub authority: Signer<'info>,
}}

#[account]
pub struct ProgramState {{
    pub authority: Pubkey,
    pub initialized: bool,
}}

#[error_code]
pub enum ForgeError {{
    #[msg("program not initialized")]
    NotInitialized,
    #[msg("unauthorized")]
    Unauthorized,
}}
"#
    )
}

fn fallback_sdk(prompt: &str) -> String {
    let name = module_name(prompt);
    format!(
        r#"import {{ Program, AnchorProvider, web3 }} from '@coral-xyz/anchor';
import {{ Connection, PublicKey }} from '@solana/web3.js';

// Client for the {name} program.
export class AgentClient {{
  private program: Program;
  private provider: AnchorProvider;

  constructor(connection: Connection, wallet: any, programId: PublicKey) {{
    this.provider = new AnchorProvider(connection, wallet, {{ commitment: 'confirmed' }});
    this.program = new Program(IDL, programId, this.provider);
  }}

  statePda(): PublicKey {{
    const [pda] = PublicKey.findProgramAddressSync(
      [Buffer.from('state')],
      this.program.programId,
    );
    return pda;
  }}

  async initialize(): Promise<string> {{
    return this.program.methods
      .initialize()
      .accounts({{
        state: this.statePda(),
        authority: this.provider.wallet.publicKey,
        systemProgram: web3.SystemProgram.programId,
      }})
      .rpc();
  }}

  async execute(data: string): Promise<string> {{
    return this.program.methods
      .execute(data)
      .accounts({{
        state: this.statePda(),
        authority: this.provider.wallet.publicKey,
      }})
      .rpc();
  }}
}}
"#
    )
}

fn fallback_tests(prompt: &str) -> String {
    let name = module_name(prompt);
    format!(
        r#"import * as anchor from '@coral-xyz/anchor';
import {{ expect }} from 'chai';

describe('{name}', () => {{
  const provider = anchor.AnchorProvider.env();
  anchor.setProvider(provider);
  const program = anchor.workspace.{name} as anchor.Program;

  it('initializes state', async () => {{
    const [statePda] = anchor.web3.PublicKey.findProgramAddressSync(
      [Buffer.from('state')],
      program.programId,
    );
    await program.methods.initialize().accounts({{
      state: statePda,
      authority: provider.wallet.publicKey,
      systemProgram: anchor.web3.SystemProgram.programId,
    }}).rpc();

    const state = await program.account.programState.fetch(statePda);
    expect(state.initialized).to.be.true;
  }});
}});
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_program_and_both_client_blocks() {
        let response = "Plan first.\n\n```rust\nfn main() {}\n```\n\nSDK:\n```typescript\nexport const sdk = 1;\n```\n\nTests:\n```typescript\nexport const tests = 2;\n```\n";
        let bundle = CodeBundle::extract(response, "counter");
        assert_eq!(bundle.program, "fn main() {}\n");
        assert_eq!(bundle.sdk, "export const sdk = 1;\n");
        assert_eq!(bundle.tests, "export const tests = 2;\n");
    }

    #[test]
    fn single_client_block_leaves_tests_to_template() {
        let response = "```rust\nfn main() {}\n```\n```ts\nexport const sdk = 1;\n```\n";
        let bundle = CodeBundle::extract(response, "counter");
        assert_eq!(bundle.sdk, "export const sdk = 1;\n");
        assert!(bundle.tests.contains("describe("));
    }

    #[test]
    fn missing_blocks_fall_back_per_artifact() {
        let bundle = CodeBundle::extract("no code here, only prose", "Build a token vault");
        assert!(bundle.program.contains("#[program]"));
        assert!(bundle.sdk.contains("AgentClient"));
        assert!(bundle.tests.contains("describe("));
    }

    #[test]
    fn fallback_bundle_is_never_empty() {
        let bundle = CodeBundle::fallback("anything at all");
        assert!(!bundle.program.is_empty());
        assert!(!bundle.sdk.is_empty());
        assert!(!bundle.tests.is_empty());
    }

    #[test]
    fn module_name_is_a_valid_identifier() {
        assert_eq!(module_name("Build a Token Vault!"), "build_a_token_vault_");
        assert!(module_name("42 counters").starts_with("agent_"));
        assert!(module_name("").starts_with("agent_"));
    }
}
