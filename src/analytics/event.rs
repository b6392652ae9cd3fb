//! Analytics event records and time-series samples.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a recorded event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Exact-key lookup succeeded.
    Hit,
    /// Lookup found nothing, not even a fuzzy match.
    Miss,
    /// Lookup was answered by the similarity pass.
    SimilarityHit,
    Set,
    Remove,
    Cleanup,
    Warmup,
    /// An internal failure the cache absorbed.
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Hit => "hit",
            EventKind::Miss => "miss",
            EventKind::SimilarityHit => "similarity_hit",
            EventKind::Set => "set",
            EventKind::Remove => "remove",
            EventKind::Cleanup => "cleanup",
            EventKind::Warmup => "warmup",
            EventKind::Error => "error",
        }
    }

    /// Hits, misses, and similarity hits together form the lookup stream
    /// that rates are computed over.
    pub fn is_lookup(&self) -> bool {
        matches!(self, EventKind::Hit | EventKind::Miss | EventKind::SimilarityHit)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cache operation as recorded for analytics. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AnalyticsEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
            cache_key: None,
            duration_ms: None,
            similarity: None,
            size_bytes: None,
            message: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    pub fn with_similarity(mut self, similarity: f64) -> Self {
        self.similarity = Some(similarity);
        self
    }

    pub fn with_size_bytes(mut self, bytes: u64) -> Self {
        self.size_bytes = Some(bytes);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// One aggregation-window sample. Rates are fractions of the window's
/// lookups; `throughput` is events per second across all kinds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    /// Start of the window this sample covers.
    pub timestamp: DateTime<Utc>,
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub similarity_hit_rate: f64,
    pub total_size_bytes: u64,
    pub avg_response_time_ms: f64,
    pub throughput: f64,
}
