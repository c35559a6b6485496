// src/config.rs
//
// Runtime configuration for the fetch layer, with environment overrides.

use anyhow::{bail, Context, Result};
use std::env;
use std::time::Duration;

use crate::constants::{DEFAULT_MIN_CHUNK_SIZE, DEFAULT_SIZE_CACHE_TTL_SECS};
use crate::range_engine::RangeEngineConfig;

pub const ENV_MAX_CONCURRENT: &str = "OBJFETCH_MAX_CONCURRENT";
pub const ENV_COALESCE_GAP: &str = "OBJFETCH_COALESCE_GAP";
pub const ENV_MIN_CHUNK_SIZE: &str = "OBJFETCH_MIN_CHUNK_SIZE";
pub const ENV_FETCH_TIMEOUT: &str = "OBJFETCH_FETCH_TIMEOUT";
pub const ENV_SIZE_CACHE_TTL: &str = "OBJFETCH_SIZE_CACHE_TTL";

/// Everything a [`Fetcher`](crate::fetcher::Fetcher) needs to know.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Coalescing and concurrency for batch range reads
    pub range_engine: RangeEngineConfig,
    /// Default minimum chunk size for streamed bodies (10 MiB)
    pub min_chunk_size: usize,
    /// How long an object size stays valid for range normalization (60s)
    pub size_cache_ttl: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            range_engine: RangeEngineConfig::default(),
            min_chunk_size: DEFAULT_MIN_CHUNK_SIZE,
            size_cache_ttl: Duration::from_secs(DEFAULT_SIZE_CACHE_TTL_SECS),
        }
    }
}

impl FetchConfig {
    /// Defaults overridden by `OBJFETCH_*` variables (a `.env` file is loaded first).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup(ENV_MAX_CONCURRENT) {
            cfg.range_engine.max_concurrent_fetches = v.trim().parse()
                .with_context(|| format!("{ENV_MAX_CONCURRENT}={v} is not a count"))?;
        }
        if let Some(v) = lookup(ENV_COALESCE_GAP) {
            cfg.range_engine.coalesce_gap = v.trim().parse()
                .with_context(|| format!("{ENV_COALESCE_GAP}={v} is not a byte count"))?;
        }
        if let Some(v) = lookup(ENV_MIN_CHUNK_SIZE) {
            cfg.min_chunk_size = v.trim().parse()
                .with_context(|| format!("{ENV_MIN_CHUNK_SIZE}={v} is not a byte count"))?;
        }
        if let Some(v) = lookup(ENV_FETCH_TIMEOUT) {
            cfg.range_engine.fetch_timeout = humantime::parse_duration(v.trim())
                .with_context(|| format!("{ENV_FETCH_TIMEOUT}={v} is not a duration"))?;
        }
        if let Some(v) = lookup(ENV_SIZE_CACHE_TTL) {
            cfg.size_cache_ttl = humantime::parse_duration(v.trim())
                .with_context(|| format!("{ENV_SIZE_CACHE_TTL}={v} is not a duration"))?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.range_engine.max_concurrent_fetches == 0 {
            bail!("max_concurrent_fetches must be at least 1");
        }
        if self.range_engine.fetch_timeout.is_zero() {
            bail!("fetch_timeout must be greater than zero");
        }
        Ok(())
    }
}
