use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::recognition::PollPolicy;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub vision_endpoint: String,
    pub vision_key: String,
    pub layout_endpoint: String,
    pub layout_key: String,
    /// Both must be set for semantic enrichment to run.
    pub language_endpoint: Option<String>,
    pub language_key: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub poll_policy: PollPolicy,
    pub http_max_retries: u32,
    pub analysis_timeout: Duration,
    pub enrichment_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_source<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let poll_policy = PollPolicy {
            interval: Duration::from_millis(parse_or(&get, "POLL_INTERVAL_MS", 1000)?),
            max_attempts: parse_or(&get, "POLL_MAX_ATTEMPTS", 60)?,
            max_elapsed: Duration::from_secs(parse_or(&get, "POLL_TIMEOUT_SECS", 120)?),
            transport_retries: parse_or(&get, "POLL_TRANSPORT_RETRIES", 3)?,
        };
        anyhow::ensure!(
            poll_policy.max_attempts > 0,
            "POLL_MAX_ATTEMPTS must be at least 1"
        );

        Ok(Config {
            vision_endpoint: require(&get, "VISION_ENDPOINT")?,
            vision_key: require(&get, "VISION_KEY")?,
            layout_endpoint: require(&get, "LAYOUT_ENDPOINT")?,
            layout_key: require(&get, "LAYOUT_KEY")?,
            language_endpoint: optional(&get, "LANGUAGE_ENDPOINT"),
            language_key: optional(&get, "LANGUAGE_KEY"),
            port: parse_or(&get, "PORT", 8080)?,
            rust_log: optional(&get, "RUST_LOG").unwrap_or_else(|| "info".to_string()),
            poll_policy,
            http_max_retries: parse_or(&get, "HTTP_MAX_RETRIES", 3)?,
            analysis_timeout: Duration::from_secs(parse_or(&get, "ANALYSIS_TIMEOUT_SECS", 300)?),
            enrichment_timeout: Duration::from_secs(parse_or(
                &get,
                "ENRICHMENT_TIMEOUT_SECS",
                30,
            )?),
            max_upload_bytes: parse_or(&get, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
        })
    }

    /// Endpoint and key of the language service, when enrichment is configured.
    pub fn language_service(&self) -> Option<(&str, &str)> {
        match (&self.language_endpoint, &self.language_key) {
            (Some(endpoint), Some(key)) => Some((endpoint.as_str(), key.as_str())),
            _ => None,
        }
    }
}

fn require<F: Fn(&str) -> Option<String>>(get: &F, key: &str) -> Result<String> {
    optional(get, key)
        .with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Blank values count as unset.
fn optional<F: Fn(&str) -> Option<String>>(get: &F, key: &str) -> Option<String> {
    get(key).filter(|v| !v.trim().is_empty())
}

fn parse_or<T, F>(get: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match optional(get, key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid {}", std::any::type_name::<T>())),
        None => Ok(default),
    }
}
