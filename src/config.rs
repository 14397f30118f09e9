use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use storefront_kit::events::DEFAULT_BROKER_CAPACITY;
use storefront_kit::DEFAULT_CACHE_TTL;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// TTL for every read-through cache entry (`CACHE_TTL_SECS`).
    pub cache_ttl: Duration,
    /// Request channel capacity of each store actor (`STORE_BUFFER`).
    pub store_buffer: usize,
    /// Per-topic buffer of the event broker (`BROKER_CAPACITY`).
    pub broker_capacity: usize,
    /// Re-validations after a lost status guard (`TRANSITION_RETRIES`).
    pub transition_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            store_buffer: 32,
            broker_capacity: DEFAULT_BROKER_CAPACITY,
            transition_retries: 3,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let cache_ttl_secs = parse_or(&lookup, "CACHE_TTL_SECS", defaults.cache_ttl.as_secs())?;

        let config = Self {
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            store_buffer: parse_or(&lookup, "STORE_BUFFER", defaults.store_buffer)?,
            broker_capacity: parse_or(&lookup, "BROKER_CAPACITY", defaults.broker_capacity)?,
            transition_retries: parse_or(&lookup, "TRANSITION_RETRIES", defaults.transition_retries)?,
        };

        anyhow::ensure!(config.store_buffer > 0, "STORE_BUFFER must be at least 1");
        anyhow::ensure!(config.broker_capacity > 0, "BROKER_CAPACITY must be at least 1");
        Ok(config)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a valid number, got {raw:?}")),
        None => Ok(default),
    }
}
