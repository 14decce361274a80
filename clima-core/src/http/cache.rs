use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_EXPIRE_AFTER_SECS: u64 = 3600;
pub const CACHE_FILE_NAME: &str = "http_cache.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub expire_after_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            expire_after_secs: DEFAULT_EXPIRE_AFTER_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    fetched_at: DateTime<Utc>,
    body: String,
}

/// Successful response bodies keyed by full request URL, kept in one JSON
/// file so they survive restarts.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    path: PathBuf,
    expire_after: TimeDelta,
}

impl ResponseCache {
    pub fn new(dir: &Path, expire_after_secs: u64) -> Self {
        let secs = i64::try_from(expire_after_secs).unwrap_or(i64::MAX);
        Self {
            path: dir.join(CACHE_FILE_NAME),
            expire_after: TimeDelta::try_seconds(secs).unwrap_or(TimeDelta::MAX),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached body for `key` if it was stored less than `expire_after` ago.
    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        let entries = self.load()?;
        Ok(entries
            .get(key)
            .filter(|entry| self.is_fresh(entry, now))
            .map(|entry| entry.body.clone()))
    }

    /// Store `body` under `key`, dropping every expired entry on the way.
    pub fn put(&self, key: &str, body: &str, now: DateTime<Utc>) -> Result<()> {
        let mut entries = self.load()?;
        entries.retain(|_, entry| self.is_fresh(entry, now));
        entries.insert(
            key.to_string(),
            CacheEntry {
                fetched_at: now,
                body: body.to_string(),
            },
        );

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create cache directory: {}", parent.display())
            })?;
        }

        let json = serde_json::to_string(&entries).context("Failed to serialize HTTP cache")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write HTTP cache: {}", self.path.display()))?;

        Ok(())
    }

    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.fetched_at) < self.expire_after
    }

    fn load(&self) -> Result<HashMap<String, CacheEntry>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read HTTP cache: {}", self.path.display()))?;

        match serde_json::from_str(&contents) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                // A cache that cannot be parsed is only a lost optimization.
                tracing::warn!(path = %self.path.display(), error = %e, "discarding unreadable HTTP cache");
                Ok(HashMap::new())
            }
        }
    }
}
