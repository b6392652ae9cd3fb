//! Cache configuration.
//!
//! Durations are carried as milliseconds on the wire so YAML configs stay
//! plain numbers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analytics::AlertThresholds;
use crate::error::CacheError;
use crate::similarity::SimilarityConfig;

pub const DEFAULT_MAX_CACHE_SIZE: u64 = 100 * 1024 * 1024;
pub const DEFAULT_MAX_ENTRIES: usize = 1000;
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Top-level cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Directory holding `metadata.json` and the `entries/` payload files.
    pub cache_dir: PathBuf,
    /// Byte ceiling across all live entries.
    pub max_cache_size: u64,
    /// Entry-count ceiling.
    pub max_entries: usize,
    /// Lifetime applied to entries stored without an explicit ttl.
    #[serde(with = "duration_ms")]
    pub default_ttl: Duration,
    /// Convenience knob that overrides `similarity.threshold` when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_threshold: Option<f64>,
    /// Gzip entry payloads on disk.
    pub compression_enabled: bool,
    /// Run the periodic cleanup task.
    pub background_cleanup: bool,
    #[serde(with = "duration_ms")]
    pub cleanup_interval: Duration,
    pub enable_analytics: bool,
    /// Queries whose keys are precomputed at startup and by `warm_cache`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warmup_queries: Vec<String>,
    pub similarity: SimilarityConfig,
    pub alert_thresholds: AlertThresholds,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".ai-cache"),
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            max_entries: DEFAULT_MAX_ENTRIES,
            default_ttl: DEFAULT_TTL,
            similarity_threshold: None,
            compression_enabled: false,
            background_cleanup: true,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            enable_analytics: true,
            warmup_queries: Vec::new(),
            similarity: SimilarityConfig::default(),
            alert_thresholds: AlertThresholds::default(),
        }
    }
}

impl CacheConfig {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_max_cache_size(mut self, bytes: u64) -> Self {
        self.max_cache_size = bytes;
        self
    }

    pub fn with_max_entries(mut self, count: usize) -> Self {
        self.max_entries = count;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = Some(threshold);
        self
    }

    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compression_enabled = enabled;
        self
    }

    pub fn with_background_cleanup(mut self, enabled: bool) -> Self {
        self.background_cleanup = enabled;
        self
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    pub fn with_analytics(mut self, enabled: bool) -> Self {
        self.enable_analytics = enabled;
        self
    }

    pub fn with_warmup_queries(mut self, queries: Vec<String>) -> Self {
        self.warmup_queries = queries;
        self
    }

    pub fn with_similarity(mut self, similarity: SimilarityConfig) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn with_alert_thresholds(mut self, thresholds: AlertThresholds) -> Self {
        self.alert_thresholds = thresholds;
        self
    }

    /// Similarity config with the top-level threshold knob folded in.
    pub fn effective_similarity(&self) -> SimilarityConfig {
        let mut similarity = self.similarity.clone();
        if let Some(threshold) = self.similarity_threshold {
            similarity.threshold = threshold;
        }
        similarity
    }

    /// Checks every field the constructor relies on. The only raise the
    /// public surface permits happens here.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(CacheError::configuration_field(
                "cache_dir must not be empty",
                "cache_dir",
            ));
        }
        if self.max_cache_size == 0 {
            return Err(CacheError::configuration_field(
                "max_cache_size must be positive",
                "max_cache_size",
            ));
        }
        if self.max_entries == 0 {
            return Err(CacheError::configuration_field(
                "max_entries must be positive",
                "max_entries",
            ));
        }
        if self.default_ttl.is_zero() {
            return Err(CacheError::configuration_field(
                "default_ttl must be positive",
                "default_ttl",
            ));
        }
        if self.cleanup_interval.is_zero() {
            return Err(CacheError::configuration_field(
                "cleanup_interval must be positive",
                "cleanup_interval",
            ));
        }
        if let Some(threshold) = self.similarity_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(CacheError::configuration_field(
                    format!("similarity_threshold {} outside [0, 1]", threshold),
                    "similarity_threshold",
                ));
            }
        }
        self.effective_similarity().validate()?;
        self.alert_thresholds.validate()?;
        Ok(())
    }

    /// Parses a YAML config document.
    pub fn from_yaml_str(content: &str) -> Result<Self, CacheError> {
        serde_yaml::from_str::<Self>(content).map_err(|e| {
            let msg = e.to_string();
            // Structural mismatches surface as configuration errors; syntax
            // and encoding problems stay file errors.
            let looks_structural = msg.contains("unknown field")
                || msg.contains("missing field")
                || msg.contains("invalid type")
                || msg.contains("invalid value");
            if looks_structural {
                CacheError::configuration(format!("invalid cache config: {}", msg))
            } else {
                CacheError::ConfigFile {
                    path: PathBuf::from("<inline>"),
                    detail: msg,
                }
            }
        })
    }

    /// Reads and parses a YAML config file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| CacheError::ConfigFile {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        Self::from_yaml_str(&content).map_err(|e| match e {
            CacheError::ConfigFile { detail, .. } => CacheError::ConfigFile {
                path: path.to_path_buf(),
                detail,
            },
            other => other,
        })
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
