//! 响应缓存模块：带相似度匹配的持久化 AI 响应缓存核心。
//!
//! # Response Caching Module
//!
//! This module is the core of the crate: a disk-backed cache for AI-generated
//! responses with deterministic key derivation, similarity-based fuzzy
//! lookup, TTL expiry, and capacity-bounded eviction.
//!
//! ## Overview
//!
//! Caching is valuable for:
//! - Skipping expensive generation for repeated or near-repeated queries
//! - Keeping answers scoped to the project, language, and framework they
//!   were written for
//! - Surviving restarts: entries and counters persist on disk
//! - Bounding disk usage through TTLs and two-phase eviction
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ResponseCache`] | The public facade: get/set, cleanup, warmup, stats |
//! | [`CacheConfig`] | Limits, TTLs, toggles, YAML loading |
//! | [`CacheKeyGenerator`] | SHA-256 keys over normalized query + canonical context |
//! | [`CacheEntry`] / [`CacheMetadata`] | The persisted index records |
//! | [`CleanupResult`] | What a cleanup pass (manual, scheduled, capacity) did |
//! | [`CacheStats`] | Point-in-time totals for hosts and CLIs |
//!
//! ## Example
//!
//! ```rust,no_run
//! use ai_cache_rust::cache::{CacheConfig, ResponseCache};
//! use ai_cache_rust::types::{CacheContext, ResponseBody};
//!
//! # async fn demo() -> ai_cache_rust::Result<()> {
//! let cache = ResponseCache::new(CacheConfig::new("/tmp/ai-cache")).await?;
//! let ctx = CacheContext::new().with_language("typescript").with_framework("react");
//!
//! cache.set("how do I memoize a component?", &ctx, ResponseBody::text("React.memo")).await;
//! if let Some(hit) = cache.get("How do I memoize a component?", &ctx).await {
//!     println!("cached: {:?}", hit.response);
//! }
//! cache.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Cache Key Derivation
//!
//! Keys are derived from:
//! - The normalized query (trimmed, lowercased; punctuation preserved)
//! - The canonical context: `project_type`, `language`, `framework`,
//!   `task_type`, `skill_level`, and the resolved file type
//!
//! Identical (query, context) pairs always collide; changing any tracked
//! attribute changes the key. Telemetry fields never affect it.

pub mod config;
pub mod entry;
pub mod eviction;
pub mod key;
pub mod manager;
mod scheduler;
mod store;

pub use config::{
    CacheConfig, DEFAULT_CLEANUP_INTERVAL, DEFAULT_MAX_CACHE_SIZE, DEFAULT_MAX_ENTRIES,
    DEFAULT_TTL,
};
pub use entry::{CacheEntry, CacheMetadata, CachePayload};
pub use eviction::{
    evictability, CapacityLimits, CleanupResult, CleanupTrigger, LRU_TARGET_RATIO,
    LRU_TRIGGER_RATIO,
};
pub use key::{file_type_category, normalize_query, CacheKeyGenerator};
pub use manager::{
    CacheHit, CacheStats, GetOptions, HitKind, ResponseCache, SetOptions, WarmupResult,
};
