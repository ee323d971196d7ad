//! File-backed HTTP response cache.
//!
//! Layout: `{cache_dir}/{blake3("GET " + url)}.json`, one entry per request.
//!
//! - Atomic writes (write to .tmp, rename into place)
//! - Corrupt entries are quarantined (`{key}.json.quarantined`) and read as a miss
//! - Optional freshness window; without one, entries never expire
//! - Only successful (2xx) responses are stored

use super::http::HttpResponse;
use super::provider::DataError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A stored response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub url: String,
    pub status: u16,
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_fresh(&self, expire_after: Option<Duration>, now: DateTime<Utc>) -> bool {
        let Some(ttl) = expire_after else {
            return true;
        };
        let age = now.signed_duration_since(self.fetched_at);
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => age < ttl,
            Err(_) => true,
        }
    }
}

pub struct ResponseCache {
    cache_dir: PathBuf,
    expire_after: Option<Duration>,
}

impl ResponseCache {
    /// Open (creating if needed) a cache rooted at `cache_dir`.
    pub fn open(
        cache_dir: impl Into<PathBuf>,
        expire_after: Option<Duration>,
    ) -> Result<Self, DataError> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir).map_err(|e| {
            DataError::CacheError(format!(
                "failed to create cache dir {}: {e}",
                cache_dir.display()
            ))
        })?;
        Ok(Self {
            cache_dir,
            expire_after,
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Fingerprint of a GET request.
    pub fn key(url: &str) -> String {
        blake3::hash(format!("GET {url}").as_bytes())
            .to_hex()
            .to_string()
    }

    fn entry_path(&self, url: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", Self::key(url)))
    }

    /// Look up a fresh entry for `url`.
    pub fn get(&self, url: &str) -> Option<CacheEntry> {
        let path = self.entry_path(url);
        let content = fs::read_to_string(&path).ok()?;

        let entry: CacheEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                let quarantine = path.with_extension("json.quarantined");
                tracing::warn!(
                    path = %path.display(),
                    "quarantining corrupt cache entry: {e}"
                );
                let _ = fs::rename(&path, &quarantine);
                return None;
            }
        };

        if entry.url != url || !entry.is_fresh(self.expire_after, Utc::now()) {
            return None;
        }
        Some(entry)
    }

    /// Store a successful response. Non-2xx responses are ignored.
    pub fn put(&self, url: &str, response: &HttpResponse) -> Result<(), DataError> {
        if !response.is_success() {
            return Ok(());
        }

        let entry = CacheEntry {
            url: url.to_string(),
            status: response.status,
            body: response.body.clone(),
            fetched_at: Utc::now(),
        };
        let json = serde_json::to_vec(&entry)
            .map_err(|e| DataError::CacheError(format!("entry serialization: {e}")))?;

        let path = self.entry_path(url);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .map_err(|e| DataError::CacheError(format!("entry write: {e}")))?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::CacheError(format!("atomic rename failed: {e}"))
        })
    }

    /// Number of stored entries (fresh or not).
    pub fn len(&self) -> usize {
        fs::read_dir(&self.cache_dir)
            .map(|entries| {
                entries
                    .flatten()
                    .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("json"))
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
