//! # ai-cache-rust
//!
//! 这是一个本地优先的 AI 响应缓存引擎：精确键命中、相似度模糊匹配、TTL 过期与容量驱逐。
//!
//! A local-first caching engine for AI-generated responses, with exact-key
//! hits, similarity-based fuzzy matching, TTL expiry, and capacity-bounded
//! eviction.
//!
//! ## Overview
//!
//! Generating an AI response is slow and costs money; most developer-tool
//! queries repeat, often with tiny wording differences. This library stores
//! responses on disk under deterministic context-scoped keys and answers
//! repeated queries locally. When the exact key misses, a configurable
//! similarity pass can still serve a close-enough stored answer.
//!
//! ## Core Behavior
//!
//! - **Deterministic keys**: SHA-256 over the normalized query plus a
//!   canonical rendition of the context attributes that scope an answer
//! - **Similarity fallback**: Levenshtein, Jaccard, cosine, or a weighted
//!   hybrid, blended with context agreement and gated by a threshold
//! - **Bounded storage**: per-entry TTLs, an expiry sweep, and a score-ranked
//!   eviction pass with an 80%/70% hysteresis band
//! - **Never the cause of failure**: persistence errors degrade to misses or
//!   skipped writes and are logged and recorded as error events
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_cache_rust::cache::{CacheConfig, ResponseCache};
//! use ai_cache_rust::types::{CacheContext, ResponseBody};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = ResponseCache::new(CacheConfig::new(".ai-cache")).await?;
//!     let ctx = CacheContext::new()
//!         .with_language("typescript")
//!         .with_framework("react");
//!
//!     let response = cache
//!         .get_or_compute("how do I memoize a component?", &ctx, || async {
//!             // Call the actual generator here.
//!             Ok::<_, std::io::Error>(ResponseBody::text("wrap it in React.memo"))
//!         })
//!         .await?;
//!     println!("{:?}", response);
//!
//!     cache.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | The cache engine: facade, store, keys, eviction, config |
//! | [`similarity`] | Fuzzy query matching: algorithms, matcher, normalization |
//! | [`analytics`] | Event recording, time series, alerts, trend reports |
//! | [`types`] | Core shared types (`CacheContext`, `ResponseBody`) |
//! | [`error`] | The crate-wide [`CacheError`] taxonomy |

pub mod analytics;
pub mod cache;
pub mod error;
pub mod similarity;
pub mod types;

// Re-export main types for convenience
pub use analytics::{AlertThresholds, AnalyticsEvent, CacheReport, EventKind, EventSink};
pub use cache::{
    CacheConfig, CacheHit, CacheStats, CleanupResult, GetOptions, HitKind, ResponseCache,
    SetOptions, WarmupResult,
};
pub use error::CacheError;
pub use similarity::{SimilarityAlgorithm, SimilarityConfig, SimilarityMatcher};
pub use types::{CacheContext, ResponseBody};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, CacheError>;
