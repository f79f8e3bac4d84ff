use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Which rubric evaluator backend to use. Chosen once at startup; every
/// scoring call in the process goes through the selected provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Claude,
    Perplexity,
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub llm_backend: LlmBackend,
    pub anthropic_api_key: String,
    pub perplexity_api_key: String,
    /// Minimum delay each adapter enforces between requests to its own host.
    pub scrape_delay: Duration,
    /// How many source adapters may fetch at the same time within one run.
    pub max_source_concurrency: usize,
    /// Worker-pool bound for concurrent scoring calls.
    pub scoring_concurrency: usize,
    /// Evaluator attempts per job before the job is flagged score-failed.
    pub score_max_attempts: u32,
    /// Normalized-Levenshtein threshold for the advisory fuzzy dedup pass.
    pub fuzzy_title_threshold: f64,
    /// Whether runs embed newly created jobs as they are ingested.
    pub auto_embed: bool,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let llm_backend = match std::env::var("LLM_PROVIDER")
            .unwrap_or_else(|_| "perplexity".to_string())
            .as_str()
        {
            "claude" => LlmBackend::Claude,
            "perplexity" => LlmBackend::Perplexity,
            other => bail!("Unsupported LLM provider: {other}"),
        };

        let anthropic_api_key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_default();
        let perplexity_api_key = std::env::var("PERPLEXITY_API_KEY").unwrap_or_default();

        match llm_backend {
            LlmBackend::Claude if anthropic_api_key.is_empty() => {
                bail!("ANTHROPIC_API_KEY is required for the Claude provider")
            }
            LlmBackend::Perplexity if perplexity_api_key.is_empty() => {
                bail!("PERPLEXITY_API_KEY is required for the Perplexity provider")
            }
            _ => {}
        }

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            llm_backend,
            anthropic_api_key,
            perplexity_api_key,
            scrape_delay: Duration::from_secs_f64(parse_env("SCRAPE_DELAY_SECONDS", 2.0)?),
            max_source_concurrency: parse_env("MAX_SOURCE_CONCURRENCY", 2)?,
            scoring_concurrency: parse_env("SCORING_CONCURRENCY", 2)?,
            score_max_attempts: parse_env("SCORE_MAX_ATTEMPTS", 3)?,
            fuzzy_title_threshold: parse_env("FUZZY_TITLE_THRESHOLD", 0.85)?,
            auto_embed: parse_env("AUTO_EMBED", true)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid value")),
        Err(_) => Ok(default),
    }
}
