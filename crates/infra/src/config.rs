//! Engine configuration loading.

use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_SEED_MESSAGE: &str = "It's a match! Say hello.";

/// Runtime knobs for the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Extra attempts after a lost conditional write (`KINDRED_CONFLICT_RETRIES`).
    pub conflict_retries: u32,
    /// Seed content for matches and groups that carry no message of their own.
    pub default_seed_message: String,
    /// Per-call deadline applied to every store round-trip.
    pub store_timeout: Duration,
    /// Postgres connection string; `None` selects the in-memory store.
    pub database_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            conflict_retries: 1,
            default_seed_message: DEFAULT_SEED_MESSAGE.to_string(),
            store_timeout: Duration::from_millis(2000),
            database_url: None,
        }
    }
}

impl EngineConfig {
    /// Load from process environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (used by `from_env` and tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let conflict_retries = match value("KINDRED_CONFLICT_RETRIES") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("KINDRED_CONFLICT_RETRIES must be a non-negative integer (got '{raw}')"))?,
            None => defaults.conflict_retries,
        };

        let store_timeout = match value("KINDRED_STORE_TIMEOUT_MS") {
            Some(raw) => {
                let ms = raw
                    .trim()
                    .parse::<u64>()
                    .with_context(|| format!("KINDRED_STORE_TIMEOUT_MS must be milliseconds (got '{raw}')"))?;
                anyhow::ensure!(ms > 0, "KINDRED_STORE_TIMEOUT_MS must be greater than zero");
                Duration::from_millis(ms)
            }
            None => defaults.store_timeout,
        };

        Ok(Self {
            conflict_retries,
            default_seed_message: value("KINDRED_SEED_MESSAGE")
                .unwrap_or(defaults.default_seed_message),
            store_timeout,
            database_url: value("DATABASE_URL"),
        })
    }
}
