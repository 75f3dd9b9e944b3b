use std::str::FromStr;
use std::time::Duration;

use anyhow::{ensure, Context, Result};

use crate::screening::models::DEFAULT_THRESHOLD;

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    /// Enables the PostgreSQL result sink when set.
    pub database_url: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub score_threshold: u8,
    pub llm_timeout: Duration,
    pub llm_max_retries: u32,
    pub max_concurrent_runs: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let config = Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            score_threshold: env_or("SCORE_THRESHOLD", DEFAULT_THRESHOLD)?,
            llm_timeout: Duration::from_secs(env_or("LLM_TIMEOUT_SECS", 60)?),
            llm_max_retries: env_or("LLM_MAX_RETRIES", 2)?,
            max_concurrent_runs: env_or("MAX_CONCURRENT_RUNS", 4)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.score_threshold <= 100,
            "SCORE_THRESHOLD must be between 0 and 100, got {}",
            self.score_threshold
        );
        ensure!(
            !self.llm_timeout.is_zero(),
            "LLM_TIMEOUT_SECS must be greater than 0"
        );
        ensure!(
            self.max_concurrent_runs > 0,
            "MAX_CONCURRENT_RUNS must be greater than 0"
        );
        Ok(())
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}
