//! Persisted cache records: the per-entry payload files and the metadata
//! index that tracks them.

use std::collections::HashMap;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::types::{CacheContext, ResponseBody};

/// Longest query prefix kept in the metadata index for diagnostics.
pub const QUERY_PREVIEW_MAX: usize = 100;

/// Index record for one cached response. Lives in `metadata.json`; the
/// response body itself lives in its own payload file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub size_bytes: u64,
    pub created: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u64,
    pub query_preview: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_similarity: Option<f64>,
}

impl CacheEntry {
    /// Builds a fresh record. Fails if the expiry does not lie strictly
    /// after the creation instant.
    pub fn new(
        size_bytes: u64,
        created: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        query: &str,
    ) -> Result<Self, CacheError> {
        if expires_at <= created {
            return Err(CacheError::configuration_field(
                format!("entry expiry {} is not after creation {}", expires_at, created),
                "ttl",
            ));
        }
        Ok(Self {
            size_bytes,
            created,
            expires_at,
            last_accessed: created,
            access_count: 0,
            query_preview: preview_of(query),
            last_similarity: None,
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Bumps the access bookkeeping for a direct or similarity hit.
    pub fn record_access(&mut self, now: DateTime<Utc>, similarity: Option<f64>) {
        self.last_accessed = now;
        self.access_count += 1;
        if similarity.is_some() {
            self.last_similarity = similarity;
        }
    }
}

/// Truncates a query to its indexable preview.
pub fn preview_of(query: &str) -> String {
    if query.chars().count() <= QUERY_PREVIEW_MAX {
        query.to_string()
    } else {
        query.chars().take(QUERY_PREVIEW_MAX).collect()
    }
}

/// Expiry instant for an entry created at `now` with the given ttl.
/// Saturates at the far future rather than overflowing.
pub fn expiry_for(now: DateTime<Utc>, ttl: std::time::Duration) -> DateTime<Utc> {
    ChronoDuration::from_std(ttl)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// The whole metadata index, persisted as one JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub entries: HashMap<String, CacheEntry>,
    pub total_size: u64,
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_cleanup: Option<DateTime<Utc>>,
    #[serde(default)]
    pub hit_count: u64,
    #[serde(default)]
    pub miss_count: u64,
    #[serde(default)]
    pub similarity_hit_count: u64,
}

impl CacheMetadata {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            entries: HashMap::new(),
            total_size: 0,
            created: now,
            last_cleanup: None,
            hit_count: 0,
            miss_count: 0,
            similarity_hit_count: 0,
        }
    }

    /// Inserts or replaces an entry, keeping `total_size` in step.
    pub fn upsert(&mut self, key: String, entry: CacheEntry) {
        if let Some(previous) = self.entries.remove(&key) {
            self.total_size = self.total_size.saturating_sub(previous.size_bytes);
        }
        self.total_size += entry.size_bytes;
        self.entries.insert(key, entry);
    }

    /// Removes an entry, keeping `total_size` in step. Returns the freed
    /// byte count, or `None` when the key was absent.
    pub fn remove(&mut self, key: &str) -> Option<u64> {
        self.entries.remove(key).map(|entry| {
            self.total_size = self.total_size.saturating_sub(entry.size_bytes);
            entry.size_bytes
        })
    }

    pub fn live_count(&self, now: DateTime<Utc>) -> usize {
        self.entries.values().filter(|e| !e.is_expired_at(now)).count()
    }

    pub fn live_size(&self, now: DateTime<Utc>) -> u64 {
        self.entries
            .values()
            .filter(|e| !e.is_expired_at(now))
            .map(|e| e.size_bytes)
            .sum()
    }

    pub fn expired_keys(&self, now: DateTime<Utc>) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, e)| e.is_expired_at(now))
            .map(|(k, _)| k.clone())
            .collect()
    }
}

/// One cached response on disk: the query it answered, the context it was
/// answered under, and the body itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachePayload {
    pub query: String,
    #[serde(default)]
    pub context: CacheContext,
    pub response: ResponseBody,
    pub timestamp: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
}
