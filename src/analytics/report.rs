//! Trend reports over the recorded event stream.

use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analytics::engine::AnalyticsEngine;
use crate::analytics::event::{AnalyticsEvent, EventKind, TimeSeriesPoint};

/// Hit-rate movement below this many percentage points (on 0..1 rates)
/// counts as stable.
pub const HIT_RATE_BAND: f64 = 0.05;
/// Relative movement below this fraction counts as stable for response time
/// and size.
pub const RELATIVE_BAND: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitRateTrend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseTimeTrend {
    Improving,
    Degrading,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeTrend {
    Growing,
    Shrinking,
    Stable,
}

/// First-half versus second-half movement of the report window's series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub hit_rate: HitRateTrend,
    pub response_time: ResponseTimeTrend,
    pub size: SizeTrend,
}

impl Default for TrendAnalysis {
    fn default() -> Self {
        Self {
            hit_rate: HitRateTrend::Stable,
            response_time: ResponseTimeTrend::Stable,
            size: SizeTrend::Stable,
        }
    }
}

/// Counter rollup of the report window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_events: usize,
    pub lookups: u64,
    pub hits: u64,
    pub misses: u64,
    pub similarity_hits: u64,
    pub sets: u64,
    pub removes: u64,
    pub cleanups: u64,
    pub warmups: u64,
    pub errors: u64,
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub similarity_hit_rate: f64,
    pub avg_response_time_ms: f64,
    pub alerts_fired: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheReport {
    pub generated_at: DateTime<Utc>,
    pub window_ms: u64,
    pub summary: ReportSummary,
    /// `hit_rate + 0.8 * similarity_hit_rate`: similarity answers are almost
    /// as good as exact ones.
    pub efficiency: f64,
    pub trends: TrendAnalysis,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Nested JSON mirroring the report structure.
    Structured,
    /// One flat map with dotted keys, for tabular consumers.
    Flat,
}

fn halves(series: &[TimeSeriesPoint]) -> Option<(&[TimeSeriesPoint], &[TimeSeriesPoint])> {
    if series.len() < 2 {
        return None;
    }
    let mid = series.len() / 2;
    Some((&series[..mid], &series[mid..]))
}

fn avg_by(points: &[TimeSeriesPoint], f: impl Fn(&TimeSeriesPoint) -> f64) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    points.iter().map(f).sum::<f64>() / points.len() as f64
}

/// Relative change from `first` to `second`. A zero baseline maps to zero
/// change when both sides are zero and to a full step otherwise.
fn relative_change(first: f64, second: f64) -> f64 {
    if first <= 0.0 {
        if second <= 0.0 {
            0.0
        } else {
            1.0
        }
    } else {
        (second - first) / first
    }
}

pub fn hit_rate_trend(series: &[TimeSeriesPoint]) -> HitRateTrend {
    let Some((first, second)) = halves(series) else {
        return HitRateTrend::Stable;
    };
    let combined = |p: &TimeSeriesPoint| p.hit_rate + p.similarity_hit_rate;
    let delta = avg_by(second, combined) - avg_by(first, combined);
    if delta > HIT_RATE_BAND {
        HitRateTrend::Increasing
    } else if delta < -HIT_RATE_BAND {
        HitRateTrend::Decreasing
    } else {
        HitRateTrend::Stable
    }
}

pub fn response_time_trend(series: &[TimeSeriesPoint]) -> ResponseTimeTrend {
    let Some((first, second)) = halves(series) else {
        return ResponseTimeTrend::Stable;
    };
    let change = relative_change(
        avg_by(first, |p| p.avg_response_time_ms),
        avg_by(second, |p| p.avg_response_time_ms),
    );
    // Falling response time is the good direction.
    if change < -RELATIVE_BAND {
        ResponseTimeTrend::Improving
    } else if change > RELATIVE_BAND {
        ResponseTimeTrend::Degrading
    } else {
        ResponseTimeTrend::Stable
    }
}

pub fn size_trend(series: &[TimeSeriesPoint]) -> SizeTrend {
    let Some((first, second)) = halves(series) else {
        return SizeTrend::Stable;
    };
    let change = relative_change(
        avg_by(first, |p| p.total_size_bytes as f64),
        avg_by(second, |p| p.total_size_bytes as f64),
    );
    if change > RELATIVE_BAND {
        SizeTrend::Growing
    } else if change < -RELATIVE_BAND {
        SizeTrend::Shrinking
    } else {
        SizeTrend::Stable
    }
}

fn summarize(events: &[AnalyticsEvent], alerts_fired: usize) -> ReportSummary {
    let mut summary = ReportSummary {
        total_events: events.len(),
        alerts_fired,
        ..ReportSummary::default()
    };
    let mut duration_sum = 0.0;
    let mut duration_samples = 0u64;
    for event in events {
        match event.kind {
            EventKind::Hit => summary.hits += 1,
            EventKind::Miss => summary.misses += 1,
            EventKind::SimilarityHit => summary.similarity_hits += 1,
            EventKind::Set => summary.sets += 1,
            EventKind::Remove => summary.removes += 1,
            EventKind::Cleanup => summary.cleanups += 1,
            EventKind::Warmup => summary.warmups += 1,
            EventKind::Error => summary.errors += 1,
        }
        if matches!(
            event.kind,
            EventKind::Hit | EventKind::Miss | EventKind::SimilarityHit | EventKind::Set
        ) {
            if let Some(ms) = event.duration_ms {
                duration_sum += ms as f64;
                duration_samples += 1;
            }
        }
    }
    summary.lookups = summary.hits + summary.misses + summary.similarity_hits;
    if summary.lookups > 0 {
        let lookups = summary.lookups as f64;
        summary.hit_rate = summary.hits as f64 / lookups;
        summary.miss_rate = summary.misses as f64 / lookups;
        summary.similarity_hit_rate = summary.similarity_hits as f64 / lookups;
    }
    if duration_samples > 0 {
        summary.avg_response_time_ms = duration_sum / duration_samples as f64;
    }
    summary
}

fn insights_for(summary: &ReportSummary, trends: &TrendAnalysis) -> Vec<String> {
    let mut insights = Vec::new();
    if summary.total_events == 0 {
        insights.push("No cache activity in the report window.".to_string());
        return insights;
    }
    if summary.lookups > 0 {
        let combined = (summary.hit_rate + summary.similarity_hit_rate) * 100.0;
        if combined < 30.0 {
            insights.push(format!(
                "Combined hit rate is low ({:.1}%); most lookups produce fresh responses.",
                combined
            ));
        } else if combined > 80.0 {
            insights.push(format!(
                "Combined hit rate is strong ({:.1}%).",
                combined
            ));
        }
        if summary.similarity_hits > summary.hits {
            insights.push(
                "Similarity matches answer more lookups than exact keys; query phrasing varies."
                    .to_string(),
            );
        }
    }
    if summary.errors > 0 {
        insights.push(format!(
            "{} internal error(s) were absorbed during the window.",
            summary.errors
        ));
    }
    if trends.hit_rate == HitRateTrend::Decreasing {
        insights.push("Hit rate is trending down across the window.".to_string());
    }
    insights
}

fn recommendations_for(summary: &ReportSummary, trends: &TrendAnalysis) -> Vec<String> {
    let mut recommendations = Vec::new();
    if summary.lookups >= 10 {
        let combined = summary.hit_rate + summary.similarity_hit_rate;
        if combined < 0.3 {
            recommendations.push(
                "Consider lowering the similarity threshold or extending default_ttl to serve more lookups from cache."
                    .to_string(),
            );
        }
        if summary.misses > 0 && summary.sets as f64 >= summary.misses as f64 * 0.9 {
            recommendations.push(
                "Most misses are followed by sets; warming frequent queries at startup would help."
                    .to_string(),
            );
        }
    }
    if trends.response_time == ResponseTimeTrend::Degrading {
        recommendations.push(
            "Response times are degrading; check storage latency and entry sizes.".to_string(),
        );
    }
    if trends.size == SizeTrend::Growing {
        recommendations.push(
            "Cache size keeps growing; review max_cache_size and the cleanup interval.".to_string(),
        );
    }
    recommendations
}

fn build_report(
    generated_at: DateTime<Utc>,
    window: Duration,
    events: &[AnalyticsEvent],
    series: &[TimeSeriesPoint],
    alerts_fired: usize,
) -> CacheReport {
    let summary = summarize(events, alerts_fired);
    let trends = TrendAnalysis {
        hit_rate: hit_rate_trend(series),
        response_time: response_time_trend(series),
        size: size_trend(series),
    };
    let efficiency = summary.hit_rate + 0.8 * summary.similarity_hit_rate;
    let insights = insights_for(&summary, &trends);
    let recommendations = recommendations_for(&summary, &trends);
    CacheReport {
        generated_at,
        window_ms: window.as_millis() as u64,
        summary,
        efficiency,
        trends,
        insights,
        recommendations,
    }
}

/// Renders a report into the requested JSON shape.
pub fn export(report: &CacheReport, format: ReportFormat) -> Value {
    let value = serde_json::to_value(report).unwrap_or(Value::Null);
    match format {
        ReportFormat::Structured => value,
        ReportFormat::Flat => flatten(&value),
    }
}

fn flatten(value: &Value) -> Value {
    let mut out = serde_json::Map::new();
    flatten_into(&mut out, "", value);
    Value::Object(out)
}

fn flatten_into(out: &mut serde_json::Map<String, Value>, prefix: &str, value: &Value) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(out, &path, nested);
            }
        }
        Value::Array(items) => {
            for (index, nested) in items.iter().enumerate() {
                flatten_into(out, &format!("{}.{}", prefix, index), nested);
            }
        }
        other => {
            out.insert(prefix.to_string(), other.clone());
        }
    }
}

impl AnalyticsEngine {
    /// Builds a report over the trailing `window`, flushing the in-progress
    /// aggregation first so the freshest activity is included.
    pub fn report(&self, window: Duration) -> CacheReport {
        self.report_at(Utc::now(), window)
    }

    pub(crate) fn report_at(&self, now: DateTime<Utc>, window: Duration) -> CacheReport {
        self.flush_window_at(now);
        let span = ChronoDuration::from_std(window).unwrap_or_else(|_| ChronoDuration::days(1));
        let cutoff = now - span;
        let events = self.events_since(cutoff);
        let series = self.series_since(cutoff);
        let alerts = self.alerts_since(cutoff);
        build_report(now, window, &events, &series, alerts.len())
    }

    pub fn export_report(&self, window: Duration, format: ReportFormat) -> Value {
        export(&self.report(window), format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::engine::{AnalyticsConfig, CacheGauge};

    fn point(hit: f64, sim: f64, avg_ms: f64, size: u64, at: DateTime<Utc>) -> TimeSeriesPoint {
        TimeSeriesPoint {
            timestamp: at,
            hit_rate: hit,
            miss_rate: 1.0 - hit - sim,
            similarity_hit_rate: sim,
            total_size_bytes: size,
            avg_response_time_ms: avg_ms,
            throughput: 1.0,
        }
    }

    fn lookup_events(hits: usize, misses: usize, sims: usize, at: DateTime<Utc>) -> Vec<AnalyticsEvent> {
        let mut events = Vec::new();
        for _ in 0..hits {
            events.push(AnalyticsEvent::new(EventKind::Hit).with_timestamp(at).with_duration_ms(10));
        }
        for _ in 0..misses {
            events.push(AnalyticsEvent::new(EventKind::Miss).with_timestamp(at).with_duration_ms(20));
        }
        for _ in 0..sims {
            events.push(
                AnalyticsEvent::new(EventKind::SimilarityHit)
                    .with_timestamp(at)
                    .with_duration_ms(30),
            );
        }
        events
    }

    #[test]
    fn test_summary_counts_and_rates() {
        let now = Utc::now();
        let events = lookup_events(2, 1, 1, now);
        let summary = summarize(&events, 0);
        assert_eq!(summary.total_events, 4);
        assert_eq!(summary.lookups, 4);
        assert!((summary.hit_rate - 0.5).abs() < 1e-9);
        assert!((summary.miss_rate - 0.25).abs() < 1e-9);
        assert!((summary.similarity_hit_rate - 0.25).abs() < 1e-9);
        // (2*10 + 20 + 30) / 4
        assert!((summary.avg_response_time_ms - 17.5).abs() < 1e-9);
    }

    #[test]
    fn test_efficiency_weights_similarity_hits() {
        let now = Utc::now();
        let events = lookup_events(2, 1, 1, now);
        let report = build_report(now, Duration::from_secs(60), &events, &[], 0);
        // 0.5 + 0.8 * 0.25
        assert!((report.efficiency - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_hit_rate_trend_bands() {
        let now = Utc::now();
        let mk = |first: f64, second: f64| {
            vec![
                point(first, 0.0, 10.0, 100, now),
                point(first, 0.0, 10.0, 100, now),
                point(second, 0.0, 10.0, 100, now),
                point(second, 0.0, 10.0, 100, now),
            ]
        };
        assert_eq!(hit_rate_trend(&mk(0.4, 0.5)), HitRateTrend::Increasing);
        assert_eq!(hit_rate_trend(&mk(0.5, 0.4)), HitRateTrend::Decreasing);
        // Four percentage points sits inside the five-point band.
        assert_eq!(hit_rate_trend(&mk(0.50, 0.54)), HitRateTrend::Stable);
    }

    #[test]
    fn test_response_time_trend_is_inverted() {
        let now = Utc::now();
        let mk = |first: f64, second: f64| {
            vec![point(0.5, 0.0, first, 100, now), point(0.5, 0.0, second, 100, now)]
        };
        assert_eq!(response_time_trend(&mk(100.0, 80.0)), ResponseTimeTrend::Improving);
        assert_eq!(response_time_trend(&mk(100.0, 130.0)), ResponseTimeTrend::Degrading);
        assert_eq!(response_time_trend(&mk(100.0, 105.0)), ResponseTimeTrend::Stable);
    }

    #[test]
    fn test_size_trend() {
        let now = Utc::now();
        let mk = |first: u64, second: u64| {
            vec![point(0.5, 0.0, 10.0, first, now), point(0.5, 0.0, 10.0, second, now)]
        };
        assert_eq!(size_trend(&mk(1_000, 1_500)), SizeTrend::Growing);
        assert_eq!(size_trend(&mk(1_500, 1_000)), SizeTrend::Shrinking);
        assert_eq!(size_trend(&mk(1_000, 1_050)), SizeTrend::Stable);
    }

    #[test]
    fn test_short_series_is_stable() {
        let now = Utc::now();
        let single = vec![point(0.9, 0.0, 10.0, 100, now)];
        assert_eq!(hit_rate_trend(&single), HitRateTrend::Stable);
        assert_eq!(response_time_trend(&[]), ResponseTimeTrend::Stable);
        assert_eq!(size_trend(&single), SizeTrend::Stable);
    }

    #[test]
    fn test_flat_export_uses_dotted_keys() {
        let now = Utc::now();
        let events = lookup_events(8, 2, 0, now);
        let report = build_report(now, Duration::from_secs(60), &events, &[], 1);
        let flat = export(&report, ReportFormat::Flat);
        let map = flat.as_object().unwrap();
        assert!(map.contains_key("summary.hit_rate"));
        assert!(map.contains_key("summary.alerts_fired"));
        assert!(map.contains_key("trends.hit_rate"));
        assert!(map.contains_key("efficiency"));
        assert!(map.values().all(|v| !v.is_object() && !v.is_array()));
    }

    #[test]
    fn test_structured_export_keeps_nesting() {
        let now = Utc::now();
        let report = build_report(now, Duration::from_secs(60), &[], &[], 0);
        let value = export(&report, ReportFormat::Structured);
        assert!(value["summary"].is_object());
        assert!(value["trends"]["hit_rate"].is_string());
    }

    #[test]
    fn test_empty_window_reports_no_activity() {
        let now = Utc::now();
        let report = build_report(now, Duration::from_secs(60), &[], &[], 0);
        assert_eq!(report.summary.total_events, 0);
        assert_eq!(report.insights, vec!["No cache activity in the report window.".to_string()]);
    }

    #[test]
    fn test_low_hit_rate_recommendation() {
        let now = Utc::now();
        let events = lookup_events(1, 9, 0, now);
        let report = build_report(now, Duration::from_secs(60), &events, &[], 0);
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("similarity threshold")));
    }

    #[test]
    fn test_engine_report_includes_current_window() {
        let engine = AnalyticsEngine::new(AnalyticsConfig::default());
        let start = Utc::now();
        let gauge = CacheGauge {
            entry_count: 1,
            total_size_bytes: 512,
            max_size_bytes: 1_000_000,
        };
        for i in 0..4 {
            engine.record(
                AnalyticsEvent::new(EventKind::Hit)
                    .with_timestamp(start + ChronoDuration::seconds(i))
                    .with_duration_ms(5),
                &gauge,
            );
        }
        let report = engine.report_at(start + ChronoDuration::seconds(10), Duration::from_secs(3600));
        assert_eq!(report.summary.hits, 4);
        assert_eq!(report.summary.lookups, 4);
        assert!((report.summary.hit_rate - 1.0).abs() < 1e-9);
        // The in-progress window was flushed into the series.
        assert_eq!(engine.series_since(start - ChronoDuration::seconds(1)).len(), 1);
    }
}
