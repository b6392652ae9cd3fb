//! Threshold alerts on cache health.

use std::collections::HashMap;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CacheError;

/// One alert per type inside this window; repeats are suppressed.
pub const ALERT_DEDUP_WINDOW: std::time::Duration = std::time::Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LowHitRate,
    SlowResponse,
    HighUtilization,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::LowHitRate => "low_hit_rate",
            AlertType::SlowResponse => "slow_response",
            AlertType::HighUtilization => "high_utilization",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Maps how far a reading sits past its threshold onto a severity tier.
/// `excess` is 0 at the threshold and 1 at the worst representable reading.
fn severity_for(excess: f64) -> AlertSeverity {
    if excess >= 0.75 {
        AlertSeverity::Critical
    } else if excess >= 0.5 {
        AlertSeverity::High
    } else if excess >= 0.25 {
        AlertSeverity::Medium
    } else {
        AlertSeverity::Low
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlertThresholds {
    /// Alert when the recent hit rate (direct plus similarity) drops below
    /// this percentage.
    pub min_hit_rate_pct: f64,
    /// Alert when the recent average operation duration exceeds this.
    pub max_response_time_ms: u64,
    /// Alert when live bytes exceed this percentage of the size ceiling.
    pub max_utilization_pct: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            min_hit_rate_pct: 30.0,
            max_response_time_ms: 5_000,
            max_utilization_pct: 90.0,
        }
    }
}

impl AlertThresholds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_hit_rate_pct(mut self, pct: f64) -> Self {
        self.min_hit_rate_pct = pct;
        self
    }

    pub fn with_max_response_time_ms(mut self, ms: u64) -> Self {
        self.max_response_time_ms = ms;
        self
    }

    pub fn with_max_utilization_pct(mut self, pct: f64) -> Self {
        self.max_utilization_pct = pct;
        self
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        if !(0.0..=100.0).contains(&self.min_hit_rate_pct) {
            return Err(CacheError::configuration_field(
                "must be a percentage between 0 and 100",
                "alert_thresholds.min_hit_rate_pct",
            ));
        }
        if self.max_response_time_ms == 0 {
            return Err(CacheError::configuration_field(
                "must be positive",
                "alert_thresholds.max_response_time_ms",
            ));
        }
        if !(0.0..=100.0).contains(&self.max_utilization_pct) {
            return Err(CacheError::configuration_field(
                "must be a percentage between 0 and 100",
                "alert_thresholds.max_utilization_pct",
            ));
        }
        Ok(())
    }
}

/// A fired alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    /// The reading that tripped the alert.
    pub value: f64,
    /// The configured bound it was compared against.
    pub threshold: f64,
}

/// Point-in-time health view fed to the evaluator. Rate and latency are
/// `None` until enough lookups have been observed to make them meaningful.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthReading {
    pub hit_rate_pct: Option<f64>,
    pub avg_response_time_ms: Option<f64>,
    pub utilization_pct: f64,
}

/// Compares health readings against the thresholds, scaling severity with
/// the size of the breach and suppressing repeats per alert type.
#[derive(Debug)]
pub struct AlertEvaluator {
    thresholds: AlertThresholds,
    last_fired: HashMap<AlertType, DateTime<Utc>>,
}

impl AlertEvaluator {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self {
            thresholds,
            last_fired: HashMap::new(),
        }
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    pub fn evaluate(&mut self, reading: &HealthReading, now: DateTime<Utc>) -> Vec<AlertEvent> {
        let mut fired = Vec::new();

        if let Some(rate) = reading.hit_rate_pct {
            let min = self.thresholds.min_hit_rate_pct;
            if min > 0.0 && rate < min {
                let excess = ((min - rate) / min).clamp(0.0, 1.0);
                self.fire(
                    &mut fired,
                    AlertType::LowHitRate,
                    severity_for(excess),
                    format!("hit rate {:.1}% below {:.1}%", rate, min),
                    rate,
                    min,
                    now,
                );
            }
        }

        if let Some(avg_ms) = reading.avg_response_time_ms {
            let max = self.thresholds.max_response_time_ms as f64;
            if avg_ms > max {
                let excess = ((avg_ms - max) / max).clamp(0.0, 1.0);
                self.fire(
                    &mut fired,
                    AlertType::SlowResponse,
                    severity_for(excess),
                    format!("average response time {:.0}ms above {:.0}ms", avg_ms, max),
                    avg_ms,
                    max,
                    now,
                );
            }
        }

        let max_util = self.thresholds.max_utilization_pct;
        if reading.utilization_pct > max_util {
            let headroom = 100.0 - max_util;
            let excess = if headroom > 0.0 {
                ((reading.utilization_pct - max_util) / headroom).clamp(0.0, 1.0)
            } else {
                1.0
            };
            self.fire(
                &mut fired,
                AlertType::HighUtilization,
                severity_for(excess),
                format!(
                    "cache at {:.1}% of its size ceiling (threshold {:.1}%)",
                    reading.utilization_pct, max_util
                ),
                reading.utilization_pct,
                max_util,
                now,
            );
        }

        fired
    }

    #[allow(clippy::too_many_arguments)]
    fn fire(
        &mut self,
        fired: &mut Vec<AlertEvent>,
        alert_type: AlertType,
        severity: AlertSeverity,
        message: String,
        value: f64,
        threshold: f64,
        now: DateTime<Utc>,
    ) {
        let dedup = ChronoDuration::from_std(ALERT_DEDUP_WINDOW).unwrap_or(ChronoDuration::zero());
        if let Some(last) = self.last_fired.get(&alert_type) {
            if now - *last < dedup {
                return;
            }
        }
        self.last_fired.insert(alert_type, now);
        fired.push(AlertEvent {
            id: Uuid::new_v4(),
            timestamp: now,
            alert_type,
            severity,
            message,
            value,
            threshold,
        });
    }
}
