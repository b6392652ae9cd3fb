//! Eviction policy.
//!
//! A cleanup pass runs in two phases over an index snapshot: expired entries
//! go first, then, if the survivors still sit above 80% of either capacity
//! ceiling, a score-ranked pass trims until both totals are at or below 70%.
//! The gap between trigger and target keeps back-to-back passes from
//! thrashing.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::entry::{CacheEntry, CacheMetadata};

/// Capacity pressure starts a score-ranked pass above this fraction of
/// either ceiling.
pub const LRU_TRIGGER_RATIO: f64 = 0.8;
/// A score-ranked pass trims until both totals sit at or below this
/// fraction.
pub const LRU_TARGET_RATIO: f64 = 0.7;

#[derive(Debug, Clone, Copy)]
pub struct CapacityLimits {
    pub max_size_bytes: u64,
    pub max_entries: usize,
}

/// What one cleanup pass accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupResult {
    pub expired_removed: usize,
    pub lru_removed: usize,
    pub bytes_freed: u64,
    pub duration_ms: u64,
}

impl CleanupResult {
    pub fn removed_total(&self) -> usize {
        self.expired_removed + self.lru_removed
    }
}

/// Why a cleanup pass ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupTrigger {
    /// Host called `cleanup` directly.
    Manual,
    /// The background interval fired.
    Scheduled,
    /// A `set` would have pushed totals past a ceiling.
    Capacity,
}

impl CleanupTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            CleanupTrigger::Manual => "manual",
            CleanupTrigger::Scheduled => "scheduled",
            CleanupTrigger::Capacity => "capacity",
        }
    }
}

/// Keys a cleanup pass will drop, phase by phase.
#[derive(Debug, Default)]
pub struct EvictionPlan {
    pub expired: Vec<String>,
    pub lru: Vec<String>,
}

impl EvictionPlan {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.lru.is_empty()
    }
}

/// Evictability score. Higher means the entry goes sooner: a day of idleness,
/// a single lifetime access, and ten megabytes of payload each contribute one
/// point. A never-accessed entry counts as accessed once.
pub fn evictability(entry: &CacheEntry, now: DateTime<Utc>) -> f64 {
    let idle_ms = (now - entry.last_accessed).num_milliseconds().max(0) as f64;
    let idle_days = idle_ms / 86_400_000.0;
    let rarity = 1.0 / entry.access_count.max(1) as f64;
    let size_mb = entry.size_bytes as f64 / (1024.0 * 1024.0);
    idle_days + rarity + 0.1 * size_mb
}

pub(crate) struct EvictionManager {
    limits: CapacityLimits,
}

impl EvictionManager {
    pub(crate) fn new(limits: CapacityLimits) -> Self {
        Self { limits }
    }

    pub(crate) fn limits(&self) -> &CapacityLimits {
        &self.limits
    }

    /// Computes both phases against an index snapshot. Pure; the caller
    /// applies the plan to the store.
    pub(crate) fn plan(&self, metadata: &CacheMetadata, now: DateTime<Utc>) -> EvictionPlan {
        let mut plan = EvictionPlan::default();
        let mut live: Vec<(&String, &CacheEntry)> = Vec::new();
        let mut live_size = 0u64;
        for (key, entry) in &metadata.entries {
            if entry.is_expired_at(now) {
                plan.expired.push(key.clone());
            } else {
                live_size += entry.size_bytes;
                live.push((key, entry));
            }
        }

        let over_size = live_size as f64 > self.limits.max_size_bytes as f64 * LRU_TRIGGER_RATIO;
        let over_count = live.len() as f64 > self.limits.max_entries as f64 * LRU_TRIGGER_RATIO;
        if !over_size && !over_count {
            return plan;
        }

        let mut scored: Vec<(f64, &String, u64)> = live
            .into_iter()
            .map(|(key, entry)| (evictability(entry, now), key, entry.size_bytes))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let size_target = self.limits.max_size_bytes as f64 * LRU_TARGET_RATIO;
        let count_target = self.limits.max_entries as f64 * LRU_TARGET_RATIO;
        let mut size = live_size as f64;
        let mut count = scored.len() as f64;
        for (_, key, bytes) in scored {
            if size <= size_target && count <= count_target {
                break;
            }
            plan.lru.push(key.clone());
            size -= bytes as f64;
            count -= 1.0;
        }
        plan
    }
}
