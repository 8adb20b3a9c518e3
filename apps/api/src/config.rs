use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::extraction::orchestrator::{RetryPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};
use crate::generation::service::DEFAULT_IDLE_TIMEOUT;

/// Application configuration loaded from environment variables.
/// Fails at startup if a variable is set but cannot be parsed.
#[derive(Debug, Clone)]
pub struct Config {
    /// May be empty: the server still starts and every generation falls back.
    pub google_api_key: String,
    /// Overrides the upstream API root (proxies, local stand-ins).
    pub gemini_api_base: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub extract_max_attempts: u32,
    pub extract_retry_delay_ms: u64,
    pub generation_idle_timeout_secs: u64,
    pub settings_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            google_api_key: std::env::var("GOOGLE_API_KEY").unwrap_or_default(),
            gemini_api_base: std::env::var("GEMINI_API_BASE")
                .ok()
                .filter(|base| !base.trim().is_empty()),
            port: parse_env("PORT", 4000)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            extract_max_attempts: parse_env("EXTRACT_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
            extract_retry_delay_ms: parse_env(
                "EXTRACT_RETRY_DELAY_MS",
                default_retry_delay_ms(),
            )?,
            generation_idle_timeout_secs: parse_env(
                "GENERATION_IDLE_TIMEOUT_SECS",
                DEFAULT_IDLE_TIMEOUT.as_secs(),
            )?,
            settings_path: std::env::var("SETTINGS_PATH")
                .unwrap_or_else(|_| "outreacher-settings.json".to_string())
                .into(),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.extract_max_attempts,
            delay: Duration::from_millis(self.extract_retry_delay_ms),
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_idle_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            google_api_key: String::new(),
            gemini_api_base: None,
            port: 4000,
            rust_log: "info".to_string(),
            extract_max_attempts: DEFAULT_MAX_ATTEMPTS,
            extract_retry_delay_ms: default_retry_delay_ms(),
            generation_idle_timeout_secs: DEFAULT_IDLE_TIMEOUT.as_secs(),
            settings_path: PathBuf::from("outreacher-settings.json"),
        }
    }
}

fn default_retry_delay_ms() -> u64 {
    u64::try_from(DEFAULT_RETRY_DELAY.as_millis()).unwrap_or(u64::MAX)
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_matches_documented_values() {
        let config = Config::default();
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.idle_timeout(), DEFAULT_IDLE_TIMEOUT);
        assert_eq!(config.extract_retry_delay_ms, 800);
        assert_eq!(config.generation_idle_timeout_secs, 10);
    }

    #[test]
    fn test_parse_env_uses_default_when_unset() {
        let value: u32 = parse_env("OUTREACHER_TEST_SURELY_UNSET_VAR", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        std::env::set_var("OUTREACHER_TEST_BAD_PORT", "eighty");
        let result: Result<u16> = parse_env("OUTREACHER_TEST_BAD_PORT", 4000);
        assert!(result.is_err());
        std::env::remove_var("OUTREACHER_TEST_BAD_PORT");
    }
}
