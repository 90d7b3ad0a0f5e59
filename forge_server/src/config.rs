//! Server configuration — loaded from environment variables.

#[derive(Clone, Debug)]
pub struct ForgeConfig {
    /// API key for the content generator.
    pub generator_api_key: String,
    /// Generator model identifier.
    pub generator_model: String,
    /// Generator endpoint URL.
    pub generator_url: String,
    /// Per-call generator timeout in seconds.
    pub generator_timeout_secs: u64,
    /// Verification ledger endpoint URL. Empty disables ledger anchoring.
    pub ledger_url: String,
    /// Per-call ledger timeout in seconds.
    pub ledger_timeout_secs: u64,
    /// Delay between streamed transcript lines in milliseconds.
    pub stream_pacing_ms: u64,
}

impl ForgeConfig {
    pub fn from_env() -> Self {
        let generator_api_key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_default();
        let generator_model = std::env::var("FORGE_GENERATOR_MODEL")
            .unwrap_or_else(|_| "claude-sonnet-4-5".to_string());
        let generator_url = std::env::var("FORGE_GENERATOR_URL")
            .unwrap_or_else(|_| "https://api.anthropic.com/v1/messages".to_string());
        let generator_timeout_secs = std::env::var("FORGE_GENERATOR_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        let ledger_url = std::env::var("FORGE_LEDGER_URL").unwrap_or_default();
        let ledger_timeout_secs = std::env::var("FORGE_LEDGER_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);
        let stream_pacing_ms = std::env::var("FORGE_STREAM_PACING_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(400);

        if generator_api_key.is_empty() {
            tracing::warn!("ANTHROPIC_API_KEY not set -- code generation falls back to templates");
        }
        if ledger_url.is_empty() {
            tracing::warn!("FORGE_LEDGER_URL not set -- ledger anchoring disabled");
        }

        Self {
            generator_api_key,
            generator_model,
            generator_url,
            generator_timeout_secs,
            ledger_url,
            ledger_timeout_secs,
            stream_pacing_ms,
        }
    }
}
