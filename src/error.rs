use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for the cache engine.
///
/// Persistence problems are almost always handled inside the crate (a failed
/// read degrades to a miss, a failed cleanup step is skipped), so most callers
/// only ever see [`CacheError::Configuration`] from construction. The full
/// taxonomy exists so internal layers can report precisely what went wrong
/// before the facade degrades it.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O failure while reading or writing a metadata or payload file.
    #[error("persistence failure at {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Metadata or payload content could not be serialized/deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A payload file exists but cannot be decoded. Treated as a synthetic
    /// miss: the entry is evicted and the lookup reports no hit.
    #[error("corrupt cache entry {key}: {detail}")]
    CorruptEntry { key: String, detail: String },

    /// No entry under the given key. `ResponseCache::remove` maps this to
    /// `false` instead of surfacing it.
    #[error("cache entry not found: {key}")]
    NotFound { key: String },

    /// Invalid construction options. The only error the public constructor
    /// raises to the caller.
    #[error("configuration error: {message}{}", format_field(.field))]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// A YAML configuration file could not be read or parsed.
    #[error("config file {}: {detail}", .path.display())]
    ConfigFile { path: PathBuf, detail: String },
}

fn format_field(field: &Option<String>) -> String {
    match field {
        Some(f) => format!(" (field: {})", f),
        None => String::new(),
    }
}

impl CacheError {
    /// Create a persistence error carrying the offending path.
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Create a corrupt-entry error for the given cache key.
    pub fn corrupt(key: impl Into<String>, detail: impl Into<String>) -> Self {
        CacheError::CorruptEntry {
            key: key.into(),
            detail: detail.into(),
        }
    }

    /// Create a configuration error without field attribution.
    pub fn configuration(message: impl Into<String>) -> Self {
        CacheError::Configuration {
            message: message.into(),
            field: None,
        }
    }

    /// Create a configuration error naming the offending field.
    pub fn configuration_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        CacheError::Configuration {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        CacheError::NotFound { key: key.into() }
    }

    /// True when the error is the synthetic-miss case (unreadable payload).
    pub fn is_corrupt_entry(&self) -> bool {
        matches!(self, CacheError::CorruptEntry { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CacheError::Configuration { .. } | CacheError::ConfigFile { .. }
        )
    }
}
