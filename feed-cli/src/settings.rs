use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use feed_client::{DEFAULT_API_URL, DEFAULT_ORIGIN, DEFAULT_PER_PAGE, FeedConfig};

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub origin: String,
    pub per_page: u32,
    pub search_debounce_ms: u64,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub log_level: String,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_url = lookup("FEED_API_URL")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let origin = lookup("FEED_ORIGIN")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_ORIGIN.to_string());
        let per_page = parse_positive(&lookup, "FEED_PER_PAGE", DEFAULT_PER_PAGE)?;
        if per_page > 100 {
            return Err(anyhow!("FEED_PER_PAGE must be <= 100"));
        }
        let search_debounce_ms = parse_positive(&lookup, "FEED_SEARCH_DEBOUNCE_MS", 500)?;
        let connect_timeout_secs = parse_positive(&lookup, "FEED_CONNECT_TIMEOUT_SECS", 5)?;
        let request_timeout_secs = parse_positive(&lookup, "FEED_REQUEST_TIMEOUT_SECS", 15)?;
        let max_retries: u32 = lookup("FEED_MAX_RETRIES")
            .unwrap_or_else(|| "1".to_string())
            .trim()
            .parse()
            .context("Failed to parse FEED_MAX_RETRIES, expecting integer")?;
        let retry_backoff_ms = parse_positive(&lookup, "FEED_RETRY_BACKOFF_MS", 300)?;
        let log_level = lookup("LOG_LEVEL")
            .or_else(|| lookup("RUST_LOG"))
            .unwrap_or_else(|| "warn".to_string());

        Ok(Self {
            api_url,
            origin,
            per_page,
            search_debounce_ms,
            connect_timeout_secs,
            request_timeout_secs,
            max_retries,
            retry_backoff_ms,
            log_level,
        })
    }

    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            base_url: self.api_url.clone(),
            origin: self.origin.clone(),
            per_page: self.per_page,
            search_debounce: Duration::from_millis(self.search_debounce_ms),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_retries: self.max_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

fn parse_positive<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr + PartialEq + Default + ToString,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = lookup(key)
        .unwrap_or_else(|| default.to_string())
        .trim()
        .parse::<T>()
        .with_context(|| format!("Failed to parse {key}, expecting positive integer"))?;

    if value == T::default() {
        return Err(anyhow!("{key} must be > 0"));
    }
    Ok(value)
}
