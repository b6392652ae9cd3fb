//! In-memory analytics engine.
//!
//! The engine is clocked by event timestamps rather than wall time: retention
//! pruning, window rollover, and alert dedup all key off the timestamp of the
//! event being recorded. That keeps behavior deterministic and testable.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::analytics::alerts::{AlertEvaluator, AlertEvent, AlertThresholds, HealthReading};
use crate::analytics::event::{AnalyticsEvent, EventKind, TimeSeriesPoint};

/// Hard cap on retained series points, independent of retention time.
const MAX_SERIES_POINTS: usize = 10_000;
/// Fired alerts kept for inspection.
const MAX_ALERTS: usize = 200;
/// Lookups a window needs before its rates feed the alert evaluator.
const MIN_RATE_SAMPLES: u64 = 10;

/// Retention and aggregation tuning.
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    pub retention_days: u32,
    pub max_events: usize,
    pub aggregation_interval: Duration,
    pub thresholds: AlertThresholds,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            retention_days: 7,
            max_events: 10_000,
            aggregation_interval: Duration::from_secs(60),
            thresholds: AlertThresholds::default(),
        }
    }
}

impl AnalyticsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    pub fn with_max_events(mut self, max: usize) -> Self {
        self.max_events = max;
        self
    }

    pub fn with_aggregation_interval(mut self, interval: Duration) -> Self {
        self.aggregation_interval = interval;
        self
    }

    pub fn with_thresholds(mut self, thresholds: AlertThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}

/// Capacity gauge the cache samples alongside each recorded event.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheGauge {
    pub entry_count: usize,
    pub total_size_bytes: u64,
    pub max_size_bytes: u64,
}

impl CacheGauge {
    pub fn utilization_pct(&self) -> f64 {
        if self.max_size_bytes == 0 {
            0.0
        } else {
            self.total_size_bytes as f64 / self.max_size_bytes as f64 * 100.0
        }
    }
}

/// Accumulator for the aggregation window currently being filled.
#[derive(Debug)]
struct Window {
    started: DateTime<Utc>,
    hits: u64,
    misses: u64,
    similarity_hits: u64,
    events: u64,
    duration_sum_ms: f64,
    duration_samples: u64,
    last_size_bytes: u64,
}

impl Window {
    fn new(started: DateTime<Utc>) -> Self {
        Self {
            started,
            hits: 0,
            misses: 0,
            similarity_hits: 0,
            events: 0,
            duration_sum_ms: 0.0,
            duration_samples: 0,
            last_size_bytes: 0,
        }
    }

    fn observe(&mut self, event: &AnalyticsEvent, gauge: &CacheGauge) {
        self.events += 1;
        self.last_size_bytes = gauge.total_size_bytes;
        match event.kind {
            EventKind::Hit => self.hits += 1,
            EventKind::Miss => self.misses += 1,
            EventKind::SimilarityHit => self.similarity_hits += 1,
            _ => {}
        }
        // Only request-path operations feed the response-time average;
        // cleanup and warmup durations would skew it.
        if matches!(event.kind, EventKind::Hit | EventKind::Miss | EventKind::SimilarityHit | EventKind::Set)
        {
            if let Some(ms) = event.duration_ms {
                self.duration_sum_ms += ms as f64;
                self.duration_samples += 1;
            }
        }
    }

    fn lookups(&self) -> u64 {
        self.hits + self.misses + self.similarity_hits
    }

    /// Direct-plus-similarity hit percentage, once the window has enough
    /// lookups to be meaningful.
    fn hit_rate_pct(&self) -> Option<f64> {
        let lookups = self.lookups();
        if lookups < MIN_RATE_SAMPLES {
            return None;
        }
        Some((self.hits + self.similarity_hits) as f64 / lookups as f64 * 100.0)
    }

    fn avg_duration_ms(&self) -> Option<f64> {
        if self.duration_samples == 0 {
            None
        } else {
            Some(self.duration_sum_ms / self.duration_samples as f64)
        }
    }

    fn to_point(&self, flushed_at: DateTime<Utc>) -> TimeSeriesPoint {
        let lookups = self.lookups();
        let rate = |n: u64| {
            if lookups == 0 {
                0.0
            } else {
                n as f64 / lookups as f64
            }
        };
        let elapsed_s = ((flushed_at - self.started).num_milliseconds().max(1) as f64) / 1_000.0;
        TimeSeriesPoint {
            timestamp: self.started,
            hit_rate: rate(self.hits),
            miss_rate: rate(self.misses),
            similarity_hit_rate: rate(self.similarity_hits),
            total_size_bytes: self.last_size_bytes,
            avg_response_time_ms: self.avg_duration_ms().unwrap_or(0.0),
            throughput: self.events as f64 / elapsed_s,
        }
    }
}

struct EngineState {
    events: VecDeque<AnalyticsEvent>,
    series: VecDeque<TimeSeriesPoint>,
    window: Window,
    alerts: VecDeque<AlertEvent>,
    evaluator: AlertEvaluator,
}

/// Records cache events, aggregates them into a time series, and raises
/// threshold alerts. Purely in-memory; observes but never mutates the cache.
pub struct AnalyticsEngine {
    config: AnalyticsConfig,
    state: Mutex<EngineState>,
}

impl AnalyticsEngine {
    pub fn new(config: AnalyticsConfig) -> Self {
        let evaluator = AlertEvaluator::new(config.thresholds);
        Self {
            config,
            state: Mutex::new(EngineState {
                events: VecDeque::new(),
                series: VecDeque::new(),
                window: Window::new(Utc::now()),
                alerts: VecDeque::new(),
                evaluator,
            }),
        }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Records one event and returns any alerts it tripped.
    pub fn record(&self, event: AnalyticsEvent, gauge: &CacheGauge) -> Vec<AlertEvent> {
        let now = event.timestamp;
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        self.roll_window_locked(&mut state, now);
        state.window.observe(&event, gauge);
        state.events.push_back(event);
        self.prune_locked(&mut state, now);

        let reading = HealthReading {
            hit_rate_pct: state.window.hit_rate_pct(),
            avg_response_time_ms: state.window.avg_duration_ms(),
            utilization_pct: gauge.utilization_pct(),
        };
        let fired = state.evaluator.evaluate(&reading, now);
        for alert in &fired {
            state.alerts.push_back(alert.clone());
            if state.alerts.len() > MAX_ALERTS {
                state.alerts.pop_front();
            }
        }
        fired
    }

    /// Rolls the in-progress window into the series, even mid-interval.
    /// Reports call this so the freshest activity is included.
    pub fn flush_window(&self) {
        self.flush_window_at(Utc::now());
    }

    pub(crate) fn flush_window_at(&self, now: DateTime<Utc>) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if state.window.events > 0 {
            let point = state.window.to_point(now);
            Self::push_point(&mut state, point);
        }
        state.window = Window::new(now);
    }

    fn roll_window_locked(&self, state: &mut EngineState, now: DateTime<Utc>) {
        let interval = ChronoDuration::from_std(self.config.aggregation_interval)
            .unwrap_or_else(|_| ChronoDuration::seconds(60));
        if now - state.window.started < interval {
            return;
        }
        if state.window.events > 0 {
            let point = state.window.to_point(now);
            Self::push_point(state, point);
        }
        state.window = Window::new(now);
    }

    fn push_point(state: &mut EngineState, point: TimeSeriesPoint) {
        state.series.push_back(point);
        if state.series.len() > MAX_SERIES_POINTS {
            state.series.pop_front();
        }
    }

    fn prune_locked(&self, state: &mut EngineState, now: DateTime<Utc>) {
        let horizon = now - ChronoDuration::days(i64::from(self.config.retention_days));
        while state
            .events
            .front()
            .map(|e| e.timestamp < horizon)
            .unwrap_or(false)
        {
            state.events.pop_front();
        }
        while state.events.len() > self.config.max_events {
            state.events.pop_front();
        }
        while state
            .series
            .front()
            .map(|p| p.timestamp < horizon)
            .unwrap_or(false)
        {
            state.series.pop_front();
        }
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, EngineState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn event_count(&self) -> usize {
        self.locked().events.len()
    }

    pub fn events_since(&self, cutoff: DateTime<Utc>) -> Vec<AnalyticsEvent> {
        self.locked()
            .events
            .iter()
            .filter(|e| e.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    pub fn series_since(&self, cutoff: DateTime<Utc>) -> Vec<TimeSeriesPoint> {
        self.locked()
            .series
            .iter()
            .filter(|p| p.timestamp >= cutoff)
            .copied()
            .collect()
    }

    pub fn alerts_since(&self, cutoff: DateTime<Utc>) -> Vec<AlertEvent> {
        self.locked()
            .alerts
            .iter()
            .filter(|a| a.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    pub fn recent_alerts(&self) -> Vec<AlertEvent> {
        self.locked().alerts.iter().cloned().collect()
    }
}

impl Default for AnalyticsEngine {
    fn default() -> Self {
        Self::new(AnalyticsConfig::default())
    }
}
