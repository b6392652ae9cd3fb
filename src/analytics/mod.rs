//! 分析模块：缓存事件流、时间序列聚合、告警与趋势报告。
//!
//! # Cache Analytics Module
//!
//! This module records the cache's operational events, aggregates them into
//! fixed-interval time series, evaluates health alerts, and renders trend
//! reports for export.
//!
//! ## Overview
//!
//! Analytics is valuable for:
//! - Understanding how often cached responses actually get reused
//! - Spotting hit-rate regressions before users notice slow answers
//! - Right-sizing cache limits from observed size and throughput
//! - Feeding external dashboards through pluggable event sinks
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`AnalyticsEngine`] | Event recorder with windowed aggregation and alerting |
//! | [`AnalyticsEvent`] | One timestamped cache operation |
//! | [`AlertEvaluator`] | Threshold checks with per-type dedup |
//! | [`CacheReport`] | Counter rollup plus first-half/second-half trends |
//! | [`EventSink`] | Trait for forwarding events to external destinations |
//!
//! Recording is clocked by event timestamps, so replaying a stream of events
//! produces the same series and alerts regardless of wall-clock time.

pub mod alerts;
pub mod engine;
pub mod event;
pub mod report;
pub mod sink;

pub use alerts::{
    AlertEvaluator, AlertEvent, AlertSeverity, AlertThresholds, AlertType, HealthReading,
    ALERT_DEDUP_WINDOW,
};
pub use engine::{AnalyticsConfig, AnalyticsEngine, CacheGauge};
pub use event::{AnalyticsEvent, EventKind, TimeSeriesPoint};
pub use report::{
    CacheReport, HitRateTrend, ReportFormat, ReportSummary, ResponseTimeTrend, SizeTrend,
    TrendAnalysis,
};
pub use sink::{noop_sink, EventSink, InMemoryEventSink, NoopEventSink, TracingEventSink};
