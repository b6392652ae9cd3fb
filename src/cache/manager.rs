//! The public cache facade.
//!
//! `ResponseCache` wires the key generator, disk store, similarity matcher,
//! eviction policy, background scheduler, and analytics engine together.
//! Lookup and mutation surfaces return plain values: persistence failures
//! degrade to misses or skipped writes, get logged, and are recorded as error
//! events. Construction and configuration updates are the only operations
//! that raise.

use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::analytics::{
    AnalyticsConfig, AnalyticsEngine, AnalyticsEvent, CacheGauge, CacheReport, EventKind,
    EventSink, ReportFormat,
};
use crate::cache::config::CacheConfig;
use crate::cache::entry::{expiry_for, CachePayload};
use crate::cache::eviction::{CapacityLimits, CleanupResult, CleanupTrigger, EvictionManager};
use crate::cache::key::CacheKeyGenerator;
use crate::cache::scheduler::CleanupScheduler;
use crate::cache::store::CacheStore;
use crate::similarity::{SimilarityConfig, SimilarityMatcher};
use crate::types::{CacheContext, ResponseBody};
use crate::Result;

/// Shortest lifetime an entry can be stored with. Anything lower would
/// expire before the write lands.
const MIN_TTL: Duration = Duration::from_millis(1);

/// Per-lookup options.
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    /// Skip the fuzzy pass entirely; only an exact key match answers.
    pub bypass_similarity: bool,
    /// Overrides the configured similarity threshold for this lookup.
    pub min_similarity: Option<f64>,
}

impl GetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bypass_similarity(mut self, bypass: bool) -> Self {
        self.bypass_similarity = bypass;
        self
    }

    pub fn with_min_similarity(mut self, threshold: f64) -> Self {
        self.min_similarity = Some(threshold);
        self
    }
}

/// Per-store options.
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// Lifetime for this entry; the config default applies when unset.
    pub ttl: Option<Duration>,
    pub model: Option<String>,
    pub token_count: Option<u32>,
    /// How long the original generation took, kept for analytics.
    pub response_time_ms: Option<u64>,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_token_count(mut self, count: u32) -> Self {
        self.token_count = Some(count);
        self
    }

    pub fn with_response_time_ms(mut self, ms: u64) -> Self {
        self.response_time_ms = Some(ms);
        self
    }
}

/// How a lookup was answered.
#[derive(Debug, Clone, PartialEq)]
pub enum HitKind {
    /// The exact key was present.
    Direct,
    /// A stored entry for a different key matched closely enough.
    Similarity { similarity: f64, confidence: f64 },
}

impl HitKind {
    pub fn is_direct(&self) -> bool {
        matches!(self, HitKind::Direct)
    }

    pub fn is_similarity(&self) -> bool {
        matches!(self, HitKind::Similarity { .. })
    }
}

/// A successful lookup.
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub response: ResponseBody,
    /// Key of the entry that answered; for similarity hits this is the
    /// matched entry's key, not the queried one.
    pub cache_key: String,
    pub kind: HitKind,
    /// Time since the entry was stored.
    pub age: Duration,
}

/// Point-in-time cache totals for hosts and CLIs.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Live entries; expired-but-unswept entries are excluded.
    pub entry_count: usize,
    pub total_size_bytes: u64,
    pub max_size_bytes: u64,
    pub max_entries: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    pub similarity_hit_count: u64,
    /// Direct plus similarity hits over all lookups, 0 to 1.
    pub hit_rate: f64,
    /// Similarity hits alone over all lookups, 0 to 1.
    pub similarity_hit_rate: f64,
    pub utilization_pct: f64,
    pub created: DateTime<Utc>,
    pub last_cleanup: Option<DateTime<Utc>>,
}

/// What a `warm_cache` call did. Warmup derives and logs keys so they are
/// precomputed and visible in diagnostics; it never generates responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WarmupResult {
    pub keys_precomputed: usize,
    /// Of those, how many already had a live entry.
    pub already_cached: usize,
}

/// State shared between the facade and the background scheduler. The
/// scheduler holds it weakly, so dropping the last `ResponseCache` stops the
/// timer instead of leaking it.
pub(crate) struct CacheInner {
    config: CacheConfig,
    key_gen: CacheKeyGenerator,
    store: CacheStore,
    eviction: EvictionManager,
    similarity: ArcSwap<SimilarityConfig>,
    analytics: Option<AnalyticsEngine>,
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
    /// Single-flight guard: one cleanup pass system-wide, shared by the
    /// scheduler, manual cleanup, and capacity-triggered passes.
    cleanup_gate: tokio::sync::Mutex<()>,
}

impl CacheInner {
    /// Runs one cleanup pass. A pass already in flight makes this a no-op
    /// returning a zero-effect result.
    pub(crate) async fn run_cleanup(&self, trigger: CleanupTrigger) -> CleanupResult {
        let Ok(_guard) = self.cleanup_gate.try_lock() else {
            debug!(trigger = trigger.as_str(), "cleanup already running, skipping");
            return CleanupResult::default();
        };
        let started = Instant::now();
        let now = Utc::now();
        let snapshot = self.store.snapshot().await;
        let plan = self.eviction.plan(&snapshot, now);

        let mut result = CleanupResult::default();
        if !plan.is_empty() {
            let (expired_removed, expired_bytes) = self.store.evict_keys(&plan.expired).await;
            let (lru_removed, lru_bytes) = self.store.evict_keys(&plan.lru).await;
            result.expired_removed = expired_removed;
            result.lru_removed = lru_removed;
            result.bytes_freed = expired_bytes + lru_bytes;
        }
        self.store.mark_cleanup(now).await;
        result.duration_ms = started.elapsed().as_millis() as u64;

        debug!(
            trigger = trigger.as_str(),
            expired = result.expired_removed,
            lru = result.lru_removed,
            bytes_freed = result.bytes_freed,
            "cleanup pass finished"
        );
        self.emit(
            AnalyticsEvent::new(EventKind::Cleanup)
                .with_duration_ms(result.duration_ms)
                .with_size_bytes(result.bytes_freed)
                .with_message(format!(
                    "{}: removed {} entries",
                    trigger.as_str(),
                    result.removed_total()
                )),
        )
        .await;
        result
    }

    async fn lookup(
        &self,
        query: &str,
        context: &CacheContext,
        options: &GetOptions,
    ) -> Option<CacheHit> {
        let started = Instant::now();
        let now = Utc::now();
        let key = self.key_gen.generate(query, context);

        match self.store.get(&key, now).await {
            Ok(Some(payload)) => {
                self.store.note_direct_hit(&key, now).await;
                debug!(key = %key, "direct cache hit");
                self.emit(
                    AnalyticsEvent::new(EventKind::Hit)
                        .with_key(&key)
                        .with_duration_ms(started.elapsed().as_millis() as u64),
                )
                .await;
                return Some(CacheHit {
                    response: payload.response.clone(),
                    cache_key: key,
                    kind: HitKind::Direct,
                    age: (now - payload.timestamp).to_std().unwrap_or_default(),
                });
            }
            Ok(None) => {}
            Err(e) => {
                // The store already evicted the unreadable entry; from here
                // on this lookup behaves like any other miss.
                warn!(key = %key, error = %e, "cache read failed, treating as miss");
                self.emit(
                    AnalyticsEvent::new(EventKind::Error)
                        .with_key(&key)
                        .with_message(e.to_string()),
                )
                .await;
            }
        }

        if !options.bypass_similarity {
            if let Some(hit) = self.similarity_lookup(query, context, options, now).await {
                let similarity = match &hit.kind {
                    HitKind::Similarity { similarity, .. } => *similarity,
                    HitKind::Direct => 1.0,
                };
                self.emit(
                    AnalyticsEvent::new(EventKind::SimilarityHit)
                        .with_key(&hit.cache_key)
                        .with_duration_ms(started.elapsed().as_millis() as u64)
                        .with_similarity(similarity),
                )
                .await;
                return Some(hit);
            }
        }

        self.store.note_miss().await;
        self.emit(
            AnalyticsEvent::new(EventKind::Miss)
                .with_key(&key)
                .with_duration_ms(started.elapsed().as_millis() as u64),
        )
        .await;
        None
    }

    async fn similarity_lookup(
        &self,
        query: &str,
        context: &CacheContext,
        options: &GetOptions,
        now: DateTime<Utc>,
    ) -> Option<CacheHit> {
        let mut config = (*self.similarity.load_full()).clone();
        if let Some(threshold) = options.min_similarity {
            config.threshold = threshold;
        }
        let matcher = SimilarityMatcher::new(config);
        let candidates = self.store.candidates(now).await;
        let matches = matcher.find_matches(query, context, &candidates);
        let best = matches.first()?;

        let payload = match self.store.get(&best.cache_key, now).await {
            Ok(Some(payload)) => payload,
            // Raced with eviction or went unreadable between scoring and
            // read; fall back to a plain miss.
            Ok(None) | Err(_) => return None,
        };
        self.store
            .note_similarity_hit(&best.cache_key, best.similarity, now)
            .await;
        debug!(
            key = %best.cache_key,
            similarity = best.similarity,
            confidence = best.confidence,
            "similarity cache hit"
        );
        Some(CacheHit {
            response: payload.response.clone(),
            cache_key: best.cache_key.clone(),
            kind: HitKind::Similarity {
                similarity: best.similarity,
                confidence: best.confidence,
            },
            age: (now - payload.timestamp).to_std().unwrap_or_default(),
        })
    }

    async fn insert(
        &self,
        query: &str,
        context: &CacheContext,
        response: ResponseBody,
        options: &SetOptions,
    ) {
        let started = Instant::now();
        let now = Utc::now();
        let key = self.key_gen.generate(query, context);
        let ttl = options.ttl.unwrap_or(self.config.default_ttl).max(MIN_TTL);
        let payload = CachePayload {
            query: query.to_string(),
            context: context.clone(),
            response,
            timestamp: now,
            expires_at: expiry_for(now, ttl),
            model: options.model.clone(),
            token_count: options.token_count,
            response_time_ms: options.response_time_ms,
        };

        let encoded = match self.store.encode(&payload) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(key = %key, error = %e, "cache write skipped, payload unserializable");
                self.emit(
                    AnalyticsEvent::new(EventKind::Error)
                        .with_key(&key)
                        .with_message(e.to_string()),
                )
                .await;
                return;
            }
        };

        let incoming = encoded.len() as u64;
        if self
            .store
            .would_exceed(&key, incoming, self.eviction.limits())
            .await
        {
            let result = self.run_cleanup(CleanupTrigger::Capacity).await;
            debug!(
                key = %key,
                removed = result.removed_total(),
                bytes_freed = result.bytes_freed,
                "capacity cleanup before write"
            );
        }

        match self.store.put(&key, payload, encoded).await {
            Ok(size) => {
                debug!(key = %key, size_bytes = size, "cached response");
                self.emit(
                    AnalyticsEvent::new(EventKind::Set)
                        .with_key(&key)
                        .with_size_bytes(size)
                        .with_duration_ms(started.elapsed().as_millis() as u64),
                )
                .await;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "cache write failed");
                self.emit(
                    AnalyticsEvent::new(EventKind::Error)
                        .with_key(&key)
                        .with_message(e.to_string()),
                )
                .await;
            }
        }
    }

    async fn remove_key(&self, cache_key: &str) -> bool {
        match self.store.remove(cache_key).await {
            Ok(true) => {
                debug!(key = %cache_key, "entry removed");
                self.emit(AnalyticsEvent::new(EventKind::Remove).with_key(cache_key)).await;
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!(key = %cache_key, error = %e, "remove failed");
                self.emit(
                    AnalyticsEvent::new(EventKind::Error)
                        .with_key(cache_key)
                        .with_message(e.to_string()),
                )
                .await;
                false
            }
        }
    }

    async fn clear_all(&self) -> bool {
        match self.store.clear().await {
            Ok(removed) => {
                info!(removed, "cache cleared");
                self.emit(AnalyticsEvent::new(EventKind::Remove).with_message("cache cleared"))
                    .await;
                true
            }
            Err(e) => {
                warn!(error = %e, "cache clear failed");
                self.emit(AnalyticsEvent::new(EventKind::Error).with_message(e.to_string()))
                    .await;
                false
            }
        }
    }

    async fn warm(&self, queries: &[String]) -> WarmupResult {
        let now = Utc::now();
        let snapshot = self.store.snapshot().await;
        let mut result = WarmupResult::default();
        for query in queries {
            let key = self.key_gen.generate(query, &CacheContext::default());
            let cached = snapshot
                .entries
                .get(&key)
                .map(|entry| !entry.is_expired_at(now))
                .unwrap_or(false);
            if cached {
                result.already_cached += 1;
            }
            result.keys_precomputed += 1;
            debug!(key = %key, cached, "warmup key precomputed");
        }
        if result.keys_precomputed > 0 {
            self.emit(AnalyticsEvent::new(EventKind::Warmup).with_message(format!(
                "{} keys precomputed, {} already cached",
                result.keys_precomputed, result.already_cached
            )))
            .await;
        }
        result
    }

    async fn stats(&self) -> CacheStats {
        let now = Utc::now();
        let snapshot = self.store.snapshot().await;
        let entry_count = snapshot.live_count(now);
        let total_size_bytes = snapshot.live_size(now);
        let lookups = snapshot.hit_count + snapshot.miss_count + snapshot.similarity_hit_count;
        let rate = |n: u64| {
            if lookups == 0 {
                0.0
            } else {
                n as f64 / lookups as f64
            }
        };
        CacheStats {
            entry_count,
            total_size_bytes,
            max_size_bytes: self.config.max_cache_size,
            max_entries: self.config.max_entries,
            hit_count: snapshot.hit_count,
            miss_count: snapshot.miss_count,
            similarity_hit_count: snapshot.similarity_hit_count,
            hit_rate: rate(snapshot.hit_count + snapshot.similarity_hit_count),
            similarity_hit_rate: rate(snapshot.similarity_hit_count),
            utilization_pct: if self.config.max_cache_size == 0 {
                0.0
            } else {
                total_size_bytes as f64 / self.config.max_cache_size as f64 * 100.0
            },
            created: snapshot.created,
            last_cleanup: snapshot.last_cleanup,
        }
    }

    async fn gauge(&self) -> CacheGauge {
        let now = Utc::now();
        let snapshot = self.store.snapshot().await;
        CacheGauge {
            entry_count: snapshot.live_count(now),
            total_size_bytes: snapshot.live_size(now),
            max_size_bytes: self.config.max_cache_size,
        }
    }

    /// Feeds one event to the analytics engine and every registered sink.
    /// Alerts get logged; sink failures are ignored.
    async fn emit(&self, event: AnalyticsEvent) {
        if let Some(engine) = &self.analytics {
            let gauge = self.gauge().await;
            for alert in engine.record(event.clone(), &gauge) {
                warn!(
                    alert = alert.alert_type.as_str(),
                    severity = ?alert.severity,
                    value = alert.value,
                    threshold = alert.threshold,
                    "{}", alert.message
                );
            }
        }
        let registered: Vec<Arc<dyn EventSink>> = match self.sinks.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        for sink in registered {
            let _ = sink.record(&event).await;
        }
    }
}

/// Persistent, similarity-aware response cache.
///
/// # Example
///
/// ```rust,no_run
/// use ai_cache_rust::cache::{CacheConfig, ResponseCache};
/// use ai_cache_rust::types::{CacheContext, ResponseBody};
///
/// # async fn demo() -> ai_cache_rust::Result<()> {
/// let cache = ResponseCache::new(CacheConfig::new("/tmp/ai-cache")).await?;
/// let ctx = CacheContext::new().with_language("css");
///
/// cache.set("how do I center a div?", &ctx, ResponseBody::text("use flexbox")).await;
/// let hit = cache.get("How do I center a div?", &ctx).await;
/// assert!(hit.is_some());
/// cache.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct ResponseCache {
    inner: Arc<CacheInner>,
    scheduler: tokio::sync::Mutex<Option<CleanupScheduler>>,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache").finish_non_exhaustive()
    }
}

impl ResponseCache {
    /// Validates the config, opens the store, starts the background cleanup
    /// task when enabled, and precomputes warmup keys. The only fallible
    /// public entry point besides [`update_similarity_config`](Self::update_similarity_config).
    pub async fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let similarity = config.effective_similarity();
        let store = CacheStore::open(config.cache_dir.clone(), config.compression_enabled).await?;
        let eviction = EvictionManager::new(CapacityLimits {
            max_size_bytes: config.max_cache_size,
            max_entries: config.max_entries,
        });
        let analytics = config.enable_analytics.then(|| {
            AnalyticsEngine::new(AnalyticsConfig::new().with_thresholds(config.alert_thresholds))
        });

        let inner = Arc::new(CacheInner {
            key_gen: CacheKeyGenerator::new(),
            store,
            eviction,
            similarity: ArcSwap::from_pointee(similarity),
            analytics,
            sinks: RwLock::new(Vec::new()),
            cleanup_gate: tokio::sync::Mutex::new(()),
            config,
        });
        let scheduler = inner.config.background_cleanup.then(|| {
            CleanupScheduler::start(Arc::downgrade(&inner), inner.config.cleanup_interval)
        });

        if !inner.config.warmup_queries.is_empty() {
            let queries = inner.config.warmup_queries.clone();
            inner.warm(&queries).await;
        }
        let snapshot = inner.store.snapshot().await;
        info!(
            cache_dir = %inner.config.cache_dir.display(),
            entries = snapshot.entries.len(),
            "response cache ready"
        );
        Ok(Self {
            inner,
            scheduler: tokio::sync::Mutex::new(scheduler),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Looks up a cached response: exact key first, then the similarity pass.
    pub async fn get(&self, query: &str, context: &CacheContext) -> Option<CacheHit> {
        self.inner.lookup(query, context, &GetOptions::default()).await
    }

    pub async fn get_with_options(
        &self,
        query: &str,
        context: &CacheContext,
        options: &GetOptions,
    ) -> Option<CacheHit> {
        self.inner.lookup(query, context, options).await
    }

    /// Stores a response under the derived key with the config default ttl.
    /// Write failures degrade to a log line plus an error event.
    pub async fn set(&self, query: &str, context: &CacheContext, response: ResponseBody) {
        self.inner.insert(query, context, response, &SetOptions::default()).await
    }

    pub async fn set_with_options(
        &self,
        query: &str,
        context: &CacheContext,
        response: ResponseBody,
        options: &SetOptions,
    ) {
        self.inner.insert(query, context, response, options).await
    }

    /// Removes the entry stored under `cache_key` (see [`key_for`](Self::key_for)).
    pub async fn remove(&self, cache_key: &str) -> bool {
        self.inner.remove_key(cache_key).await
    }

    /// Runs a manual cleanup pass.
    pub async fn cleanup(&self) -> CleanupResult {
        self.inner.run_cleanup(CleanupTrigger::Manual).await
    }

    /// Precomputes and logs cache keys for the given queries. Warmup never
    /// generates or stores responses; it only makes the keys visible in
    /// diagnostics and reports how many already have live entries.
    pub async fn warm_cache(&self, queries: &[String]) -> WarmupResult {
        self.inner.warm(queries).await
    }

    /// Drops every entry and resets the aggregate counters. Returns whether
    /// the wipe fully persisted.
    pub async fn clear_cache(&self) -> bool {
        self.inner.clear_all().await
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.stats().await
    }

    /// Stops the background task and flushes metadata. Idempotent; dropping
    /// the cache without calling this also stops the task, only less
    /// promptly.
    pub async fn shutdown(&self) {
        if let Some(mut scheduler) = self.scheduler.lock().await.take() {
            scheduler.stop().await;
        }
        if let Err(e) = self.inner.store.flush().await {
            warn!(error = %e, "final metadata flush failed");
        }
    }

    /// The cache key `get`/`set` would use for this query and context.
    pub fn key_for(&self, query: &str, context: &CacheContext) -> String {
        self.inner.key_gen.generate(query, context)
    }

    /// Returns the cached response or computes, stores, and returns a fresh
    /// one. Compute errors pass through untouched; nothing is cached for
    /// them.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        query: &str,
        context: &CacheContext,
        compute: F,
    ) -> std::result::Result<ResponseBody, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<ResponseBody, E>>,
    {
        if let Some(hit) = self.get(query, context).await {
            return Ok(hit.response);
        }
        let response = compute().await?;
        self.set(query, context, response.clone()).await;
        Ok(response)
    }

    /// Registers a sink that receives every analytics event from now on.
    pub fn subscribe(&self, sink: Arc<dyn EventSink>) {
        match self.inner.sinks.write() {
            Ok(mut sinks) => sinks.push(sink),
            Err(poisoned) => poisoned.into_inner().push(sink),
        }
    }

    /// Swaps the similarity tuning on the running cache. In-flight lookups
    /// finish under the config they started with.
    pub fn update_similarity_config(&self, config: SimilarityConfig) -> Result<()> {
        config.validate()?;
        self.inner.similarity.store(Arc::new(config));
        Ok(())
    }

    /// The analytics engine, when `enable_analytics` is on.
    pub fn analytics(&self) -> Option<&AnalyticsEngine> {
        self.inner.analytics.as_ref()
    }

    /// Trend report over the trailing `window`. `None` with analytics off.
    pub fn report(&self, window: Duration) -> Option<CacheReport> {
        self.inner.analytics.as_ref().map(|engine| engine.report(window))
    }

    pub fn export_report(&self, window: Duration, format: ReportFormat) -> Option<serde_json::Value> {
        self.inner
            .analytics
            .as_ref()
            .map(|engine| engine.export_report(window, format))
    }
}
