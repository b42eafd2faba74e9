// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use crate::config::{PersistenceConfig, TrackerConfig};
use crate::error::{LearningError, Result};
use crate::logging::SharedLogger;
use crate::persistence::{with_timeout, SharedStore, StoreKeys};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::task::JoinHandle;
const COMPONENT: &str = "performance_tracker";
pub const SUCCESS_WEIGHT: f64 = 0.30;
pub const SATISFACTION_WEIGHT: f64 = 0.25;
pub const SPEED_WEIGHT: f64 = 0.20;
pub const RELIABILITY_WEIGHT: f64 = 0.15;
pub const EFFICIENCY_WEIGHT: f64 = 0.10;
pub const EXECUTION_TIME_REFERENCE_MS: f64 = 60_000.0;
pub const TREND_DEAD_BAND: f64 = 0.05;
const MILLIS_PER_DAY: f64 = 86_400_000.0;
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub tasks_completed: u64,
    pub success_rate: f64,
    pub average_execution_time_ms: f64,
    pub error_rate: f64,
    pub user_satisfaction: f64,
    pub resource_efficiency: f64,
}
impl PerformanceMetrics {
    fn sanitized(mut self) -> Self {
        let unit = |v: f64| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        self.success_rate = unit(self.success_rate);
        self.error_rate = unit(self.error_rate);
        self.user_satisfaction = unit(self.user_satisfaction);
        self.resource_efficiency = unit(self.resource_efficiency);
        if !self.average_execution_time_ms.is_finite() || self.average_execution_time_ms < 0.0 {
            self.average_execution_time_ms = 0.0;
        }
        self
    }
}
pub fn composite_score(metrics: &PerformanceMetrics) -> f64 {
    let speed = (1.0 - metrics.average_execution_time_ms / EXECUTION_TIME_REFERENCE_MS).max(0.0);
    SUCCESS_WEIGHT * metrics.success_rate
        + SATISFACTION_WEIGHT * metrics.user_satisfaction
        + SPEED_WEIGHT * speed
        + RELIABILITY_WEIGHT * (1.0 - metrics.error_rate).max(0.0)
        + EFFICIENCY_WEIGHT * metrics.resource_efficiency
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    pub period_start: DateTime<Utc>,
    pub metrics: PerformanceMetrics,
}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImprovementReport {
    pub baseline: PerformanceSnapshot,
    pub current: PerformanceSnapshot,
    pub baseline_score: f64,
    pub current_score: f64,
    pub improvement_rate: f64,
    pub days_elapsed: f64,
    pub target_achieved: bool,
}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    pub improvement_rate: f64,
}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImprovementTrend {
    pub points: Vec<TrendPoint>,
    pub slope: f64,
    pub intercept: f64,
    pub horizon: usize,
    pub projected_rate: f64,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricTrends {
    pub tasks_completed: TrendDirection,
    pub success_rate: TrendDirection,
    pub average_execution_time_ms: TrendDirection,
    pub error_rate: TrendDirection,
    pub user_satisfaction: TrendDirection,
    pub resource_efficiency: TrendDirection,
}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodMetrics {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub snapshot_count: usize,
    pub aggregate: PerformanceMetrics,
    pub trends: MetricTrends,
}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub agent_id: String,
    pub generated_at: DateTime<Utc>,
    pub snapshot_count: usize,
    pub improvement: Option<ImprovementReport>,
    pub trend: Option<ImprovementTrend>,
    pub summary: String,
    pub recommendations: Vec<String>,
}
// Absolute dead-band for rates in [0, 1]; relative for unbounded metrics.
fn direction(first: f64, last: f64, relative: bool) -> TrendDirection {
    let delta = if relative {
        if first.abs() > f64::EPSILON {
            (last - first) / first.abs()
        } else if last.abs() > f64::EPSILON {
            last.signum()
        } else {
            0.0
        }
    } else {
        last - first
    };
    if delta > TREND_DEAD_BAND {
        TrendDirection::Up
    } else if delta < -TREND_DEAD_BAND {
        TrendDirection::Down
    } else {
        TrendDirection::Stable
    }
}
// A window too large to represent reaches back to the start of time.
fn window_start(days: i64) -> DateTime<Utc> {
    TimeDelta::try_days(days)
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
fn improvement_rate(baseline_score: f64, current_score: f64) -> f64 {
    if baseline_score.abs() <= f64::EPSILON {
        if current_score > baseline_score {
            100.0
        } else {
            0.0
        }
    } else {
        (current_score - baseline_score) / baseline_score * 100.0
    }
}
pub fn linear_regression(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    if n == 1 {
        return (0.0, values[0]);
    }
    let n_f = n as f64;
    let mean_x = (n_f - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n_f;
    let (mut num, mut den) = (0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }
    let slope = if den > 0.0 { num / den } else { 0.0 };
    (slope, mean_y - slope * mean_x)
}
pub struct PerformanceTracker {
    agent_id: String,
    config: TrackerConfig,
    persistence: PersistenceConfig,
    keys: StoreKeys,
    snapshots: Vec<PerformanceSnapshot>,
    baseline: Option<PerformanceSnapshot>,
    store: Option<SharedStore>,
    pending: Vec<JoinHandle<()>>,
    logger: SharedLogger,
}
impl std::fmt::Debug for PerformanceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceTracker")
            .field("agent_id", &self.agent_id)
            .field("snapshots", &self.snapshots.len())
            .field("has_baseline", &self.baseline.is_some())
            .field("has_store", &self.store.is_some())
            .finish()
    }
}
impl PerformanceTracker {
    pub fn new(
        agent_id: impl Into<String>,
        config: TrackerConfig,
        persistence: PersistenceConfig,
        logger: SharedLogger,
    ) -> Self {
        let agent_id = agent_id.into();
        Self {
            keys: StoreKeys::new(persistence.namespace.clone(), agent_id.clone()),
            agent_id,
            config,
            persistence,
            snapshots: Vec::new(),
            baseline: None,
            store: None,
            pending: Vec::new(),
            logger,
        }
    }
    pub fn with_store(mut self, store: SharedStore) -> Self {
        self.store = Some(store);
        self
    }
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }
    pub fn baseline(&self) -> Option<&PerformanceSnapshot> {
        self.baseline.as_ref()
    }
    pub fn snapshots(&self) -> &[PerformanceSnapshot] {
        &self.snapshots
    }
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }
    pub async fn initialize(&mut self) -> usize {
        let Some(store) = self.store.clone() else {
            return 0;
        };
        let timeout = self.persistence.timeout();
        let partition = self.persistence.partition.clone();
        let baseline_key = self.keys.baseline();
        match with_timeout("retrieve", timeout, store.retrieve(&baseline_key, &partition)).await {
            Ok(Some(value)) => match serde_json::from_value::<PerformanceSnapshot>(value) {
                Ok(baseline) if self.baseline.is_none() => self.baseline = Some(baseline),
                Ok(_) => {}
                Err(e) => self.logger.warn(
                    COMPONENT,
                    "baseline_decode_failed",
                    json!({ "key": baseline_key, "error": e.to_string() }),
                ),
            },
            Ok(None) => {}
            Err(e) => self.logger.warn(
                COMPONENT,
                "baseline_load_failed",
                json!({ "key": baseline_key, "error": e.to_string() }),
            ),
        }
        let pattern = self.keys.snapshots_pattern();
        let stored = match with_timeout("query", timeout, store.query(&pattern, &partition)).await {
            Ok(entries) => entries,
            Err(e) => {
                self.logger.warn(
                    COMPONENT,
                    "snapshot_load_failed",
                    json!({ "pattern": pattern, "error": e.to_string() }),
                );
                Vec::new()
            }
        };
        let mut restored = 0;
        for (key, value) in stored {
            match serde_json::from_value::<PerformanceSnapshot>(value) {
                Ok(snapshot) => {
                    if !self.snapshots.iter().any(|s| s.timestamp == snapshot.timestamp) {
                        self.insert_sorted(snapshot);
                        restored += 1;
                    }
                }
                Err(e) => self.logger.warn(
                    COMPONENT,
                    "snapshot_decode_failed",
                    json!({ "key": key, "error": e.to_string() }),
                ),
            }
        }
        if self.baseline.is_none() {
            self.baseline = self.snapshots.first().cloned();
        }
        self.logger.info(
            COMPONENT,
            "tracker_initialized",
            json!({
                "agent_id": self.agent_id,
                "restored_snapshots": restored,
                "has_baseline": self.baseline.is_some(),
            }),
        );
        restored
    }
    pub fn record_snapshot(&mut self, metrics: PerformanceMetrics) -> PerformanceSnapshot {
        // Timestamps identify snapshots in the store.
        let mut timestamp = Utc::now();
        while self.snapshots.iter().any(|s| s.timestamp == timestamp) {
            match timestamp.checked_add_signed(TimeDelta::nanoseconds(1)) {
                Some(next) => timestamp = next,
                None => break,
            }
        }
        self.record_snapshot_at(metrics, timestamp)
    }
    pub fn record_snapshot_at(
        &mut self,
        metrics: PerformanceMetrics,
        timestamp: DateTime<Utc>,
    ) -> PerformanceSnapshot {
        let period_start = self
            .snapshots
            .iter()
            .rev()
            .find(|s| s.timestamp <= timestamp)
            .map_or(timestamp, |s| s.timestamp);
        let snapshot = PerformanceSnapshot {
            agent_id: self.agent_id.clone(),
            timestamp,
            period_start,
            metrics: metrics.sanitized(),
        };
        self.insert_sorted(snapshot.clone());
        if self.baseline.is_none() {
            self.baseline = Some(snapshot.clone());
            self.persist(self.keys.baseline(), &snapshot);
            self.logger.info(
                COMPONENT,
                "baseline_established",
                json!({
                    "agent_id": self.agent_id,
                    "score": composite_score(&snapshot.metrics),
                }),
            );
        }
        self.persist(self.keys.snapshot(timestamp), &snapshot);
        snapshot
    }
    fn insert_sorted(&mut self, snapshot: PerformanceSnapshot) {
        let idx = self
            .snapshots
            .partition_point(|s| s.timestamp <= snapshot.timestamp);
        self.snapshots.insert(idx, snapshot);
    }
    fn persist(&mut self, key: String, snapshot: &PerformanceSnapshot) {
        let Some(store) = self.store.clone() else {
            return;
        };
        let value = match serde_json::to_value(snapshot) {
            Ok(v) => v,
            Err(e) => {
                self.logger.warn(
                    COMPONENT,
                    "snapshot_encode_failed",
                    json!({ "key": key, "error": e.to_string() }),
                );
                return;
            }
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            self.logger.debug(
                COMPONENT,
                "persistence_skipped",
                json!({ "key": key, "reason": "no async runtime" }),
            );
            return;
        };
        let timeout = self.persistence.timeout();
        let partition = self.persistence.partition.clone();
        let logger = self.logger.clone();
        self.pending.retain(|h| !h.is_finished());
        self.pending.push(handle.spawn(async move {
            let write = store.store(&key, value, &partition);
            if let Err(e) = with_timeout("store", timeout, write).await {
                logger.warn(
                    COMPONENT,
                    "snapshot_store_failed",
                    json!({ "key": key, "error": e.to_string() }),
                );
            }
        }));
    }
    pub async fn flush(&mut self) {
        let pending: Vec<_> = self.pending.drain(..).collect();
        for result in futures::future::join_all(pending).await {
            if let Err(e) = result {
                self.logger.warn(
                    COMPONENT,
                    "persistence_task_failed",
                    json!({ "error": e.to_string() }),
                );
            }
        }
    }
    pub fn calculate_improvement(&self) -> Result<ImprovementReport> {
        let baseline = self.baseline.as_ref().ok_or(LearningError::NoBaseline)?;
        let current = self
            .snapshots
            .last()
            .ok_or_else(|| LearningError::NoSnapshots("no snapshots recorded".to_string()))?;
        let baseline_score = composite_score(&baseline.metrics);
        let current_score = composite_score(&current.metrics);
        let rate = improvement_rate(baseline_score, current_score);
        let days_elapsed =
            (current.timestamp - baseline.timestamp).num_milliseconds() as f64 / MILLIS_PER_DAY;
        Ok(ImprovementReport {
            baseline: baseline.clone(),
            current: current.clone(),
            baseline_score,
            current_score,
            improvement_rate: rate,
            days_elapsed,
            target_achieved: rate >= self.config.target_improvement,
        })
    }
    pub fn improvement_trend(
        &self,
        days: i64,
        horizon: Option<usize>,
    ) -> Result<ImprovementTrend> {
        let baseline = self.baseline.as_ref().ok_or(LearningError::NoBaseline)?;
        let baseline_score = composite_score(&baseline.metrics);
        let cutoff = window_start(days);
        let points: Vec<TrendPoint> = self
            .snapshots
            .iter()
            .filter(|s| s.timestamp >= cutoff)
            .map(|s| TrendPoint {
                timestamp: s.timestamp,
                improvement_rate: improvement_rate(baseline_score, composite_score(&s.metrics)),
            })
            .collect();
        if points.is_empty() {
            return Err(LearningError::NoSnapshots(format!(
                "no snapshots in the last {days} days"
            )));
        }
        let rates: Vec<f64> = points.iter().map(|p| p.improvement_rate).collect();
        let (slope, intercept) = linear_regression(&rates);
        let horizon = horizon.unwrap_or(self.config.projection_horizon);
        let x = (points.len() - 1 + horizon) as f64;
        Ok(ImprovementTrend {
            projected_rate: intercept + slope * x,
            points,
            slope,
            intercept,
            horizon,
        })
    }
    pub fn metrics_for_period(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PeriodMetrics> {
        let in_range: Vec<&PerformanceSnapshot> = self
            .snapshots
            .iter()
            .filter(|s| s.timestamp >= start && s.timestamp <= end)
            .collect();
        let (Some(first), Some(last)) = (in_range.first(), in_range.last()) else {
            return Err(LearningError::NoSnapshots(format!(
                "no snapshots between {start} and {end}"
            )));
        };
        let n = in_range.len() as f64;
        let mean = |f: fn(&PerformanceMetrics) -> f64| {
            in_range.iter().map(|s| f(&s.metrics)).sum::<f64>() / n
        };
        let aggregate = PerformanceMetrics {
            tasks_completed: in_range.iter().map(|s| s.metrics.tasks_completed).sum(),
            success_rate: mean(|m| m.success_rate),
            average_execution_time_ms: mean(|m| m.average_execution_time_ms),
            error_rate: mean(|m| m.error_rate),
            user_satisfaction: mean(|m| m.user_satisfaction),
            resource_efficiency: mean(|m| m.resource_efficiency),
        };
        let (a, b) = (&first.metrics, &last.metrics);
        let trends = MetricTrends {
            tasks_completed: direction(a.tasks_completed as f64, b.tasks_completed as f64, true),
            success_rate: direction(a.success_rate, b.success_rate, false),
            average_execution_time_ms: direction(
                a.average_execution_time_ms,
                b.average_execution_time_ms,
                true,
            ),
            error_rate: direction(a.error_rate, b.error_rate, false),
            user_satisfaction: direction(a.user_satisfaction, b.user_satisfaction, false),
            resource_efficiency: direction(a.resource_efficiency, b.resource_efficiency, false),
        };
        Ok(PeriodMetrics {
            start,
            end,
            snapshot_count: in_range.len(),
            aggregate,
            trends,
        })
    }
    // The baseline is unaffected.
    pub fn prune_old_snapshots(&mut self, keep_days: i64) -> usize {
        let cutoff = window_start(keep_days);
        let before = self.snapshots.len();
        self.snapshots.retain(|s| s.timestamp >= cutoff);
        let removed = before - self.snapshots.len();
        if removed > 0 {
            self.logger.debug(
                COMPONENT,
                "snapshots_pruned",
                json!({ "removed": removed, "keep_days": keep_days }),
            );
        }
        removed
    }
    pub fn generate_report(&self) -> PerformanceReport {
        let improvement = self.calculate_improvement().ok();
        let trend = self
            .improvement_trend(self.config.trend_window_days, None)
            .ok();
        let mut recommendations = Vec::new();
        if let Some(latest) = self.snapshots.last() {
            let m = &latest.metrics;
            if m.success_rate < 0.8 {
                recommendations.push(format!(
                    "Success rate is {:.0}%; favour higher-valued strategies for failing tasks.",
                    m.success_rate * 100.0
                ));
            }
            if m.error_rate > 0.1 {
                recommendations.push(format!(
                    "Error rate is {:.0}%; review retry policies and error handling.",
                    m.error_rate * 100.0
                ));
            }
            if m.average_execution_time_ms > EXECUTION_TIME_REFERENCE_MS / 2.0 {
                recommendations.push(format!(
                    "Average execution time is {:.1}s; consider higher parallelisation.",
                    m.average_execution_time_ms / 1000.0
                ));
            }
            if m.user_satisfaction < 0.7 {
                recommendations.push(
                    "User satisfaction is below 70%; collect more feedback on recent tasks."
                        .to_string(),
                );
            }
            if m.resource_efficiency < 0.6 {
                recommendations.push(
                    "Resource efficiency is below 60%; reduce resource allocation for simple tasks."
                        .to_string(),
                );
            }
        }
        if let Some(t) = &trend {
            if t.slope < 0.0 {
                recommendations.push(
                    "Improvement is trending down; raise the exploration rate."
                        .to_string(),
                );
            }
        }
        let summary = match &improvement {
            Some(r) if r.target_achieved => format!(
                "Agent {} improved {:.1}% over {:.1} days, meeting the {:.0}% target.",
                self.agent_id, r.improvement_rate, r.days_elapsed, self.config.target_improvement
            ),
            Some(r) => format!(
                "Agent {} improved {:.1}% over {:.1} days; {:.1} points short of {:.0}%.",
                self.agent_id,
                r.improvement_rate,
                r.days_elapsed,
                self.config.target_improvement - r.improvement_rate,
                self.config.target_improvement
            ),
            None => format!(
                "Agent {} has not recorded enough performance data yet.",
                self.agent_id
            ),
        };
        PerformanceReport {
            agent_id: self.agent_id.clone(),
            generated_at: Utc::now(),
            snapshot_count: self.snapshots.len(),
            improvement,
            trend,
            summary,
            recommendations,
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::TracingLogger;
    use crate::persistence::InMemoryStore;

    fn tracker() -> PerformanceTracker {
        PerformanceTracker::new(
            "agent-under-test",
            TrackerConfig::default(),
            PersistenceConfig::default(),
            TracingLogger::shared(),
        )
    }

    fn metrics(success: f64) -> PerformanceMetrics {
        PerformanceMetrics {
            tasks_completed: 10,
            success_rate: success,
            average_execution_time_ms: 30_000.0,
            error_rate: 0.1,
            user_satisfaction: 0.7,
            resource_efficiency: 0.6,
        }
    }

    #[test]
    fn composite_score_uses_fixed_weights() {
        let score = composite_score(&metrics(0.8));
        let expected = 0.30 * 0.8 + 0.25 * 0.7 + 0.20 * 0.5 + 0.15 * 0.9 + 0.10 * 0.6;
        assert!((score - expected).abs() < 1e-12);
    }

    #[test]
    fn slow_execution_contributes_nothing() {
        let mut m = metrics(1.0);
        m.average_execution_time_ms = 120_000.0;
        let mut fast = m.clone();
        fast.average_execution_time_ms = 60_000.0;
        assert_eq!(composite_score(&m), composite_score(&fast));
    }

    #[test]
    fn first_snapshot_becomes_immutable_baseline() {
        let mut t = tracker();
        let first = t.record_snapshot(metrics(0.5));
        t.record_snapshot(metrics(0.9));
        assert_eq!(t.baseline(), Some(&first));
        assert_eq!(t.snapshot_count(), 2);
        assert_eq!(t.snapshots()[1].period_start, first.timestamp);
    }

    #[test]
    fn improvement_requires_data() {
        let t = tracker();
        assert!(matches!(
            t.calculate_improvement(),
            Err(LearningError::NoBaseline)
        ));
    }

    #[test]
    fn improvement_rate_is_relative_to_baseline() {
        let mut t = tracker();
        t.record_snapshot(metrics(0.5));
        t.record_snapshot(metrics(1.0));
        let report = t.calculate_improvement().unwrap();
        let base = composite_score(&metrics(0.5));
        let cur = composite_score(&metrics(1.0));
        assert!((report.improvement_rate - (cur - base) / base * 100.0).abs() < 1e-9);
        assert_eq!(report.target_achieved, report.improvement_rate >= 20.0);
        let again = t.calculate_improvement().unwrap();
        assert_eq!(report.improvement_rate, again.improvement_rate);
    }

    #[test]
    fn trend_projects_linear_growth() {
        let mut t = tracker();
        let now = Utc::now();
        for i in 0..5 {
            let ts = now - TimeDelta::days(4 - i);
            t.record_snapshot_at(metrics(0.5 + 0.1 * i as f64), ts);
        }
        let trend = t.improvement_trend(30, Some(10)).unwrap();
        assert_eq!(trend.points.len(), 5);
        assert!(trend.slope > 0.0);
        assert_eq!(trend.points[0].improvement_rate, 0.0);
        let expected = trend.intercept + trend.slope * 14.0;
        assert!((trend.projected_rate - expected).abs() < 1e-9);
        assert!(trend.projected_rate > trend.points[4].improvement_rate);
    }

    #[test]
    fn trend_ignores_snapshots_outside_window() {
        let mut t = tracker();
        let now = Utc::now();
        t.record_snapshot_at(metrics(0.5), now - TimeDelta::days(60));
        assert!(matches!(
            t.improvement_trend(30, None),
            Err(LearningError::NoSnapshots(_))
        ));
        t.record_snapshot_at(metrics(0.7), now - TimeDelta::days(1));
        let trend = t.improvement_trend(30, None).unwrap();
        assert_eq!(trend.points.len(), 1);
        assert_eq!(trend.slope, 0.0);
        assert_eq!(trend.horizon, 30);
    }

    #[test]
    fn oversized_windows_keep_everything() {
        let mut t = tracker();
        let now = Utc::now();
        t.record_snapshot_at(metrics(0.5), now - TimeDelta::days(400));
        t.record_snapshot_at(metrics(0.6), now - TimeDelta::days(1));
        let trend = t.improvement_trend(1_000_000_000, None).unwrap();
        assert_eq!(trend.points.len(), 2);
        assert_eq!(t.improvement_trend(i64::MAX, None).unwrap().points.len(), 2);
        assert_eq!(t.prune_old_snapshots(i64::MAX), 0);
        assert_eq!(t.prune_old_snapshots(i64::MIN), 0);
        assert_eq!(t.snapshot_count(), 2);
    }

    #[tokio::test]
    async fn back_to_back_snapshots_all_survive_restart() {
        let store: SharedStore = InMemoryStore::shared();
        let mut t = tracker().with_store(store.clone());
        for i in 0..5 {
            t.record_snapshot(metrics(0.5 + 0.1 * f64::from(i)));
        }
        t.flush().await;
        let timestamps: std::collections::BTreeSet<_> =
            t.snapshots().iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps.len(), 5);

        let mut restored = tracker().with_store(store);
        assert_eq!(restored.initialize().await, 5);
        let restored_timestamps: std::collections::BTreeSet<_> =
            restored.snapshots().iter().map(|s| s.timestamp).collect();
        assert_eq!(restored_timestamps, timestamps);
        assert_eq!(
            restored.baseline().map(|b| b.timestamp),
            t.baseline().map(|b| b.timestamp)
        );
    }

    #[test]
    fn regression_recovers_exact_line() {
        let (slope, intercept) = linear_regression(&[1.0, 3.0, 5.0, 7.0]);
        assert!((slope - 2.0).abs() < 1e-12);
        assert!((intercept - 1.0).abs() < 1e-12);
    }

    #[test]
    fn prune_keeps_recent_and_baseline() {
        let mut t = tracker();
        let now = Utc::now();
        t.record_snapshot_at(metrics(0.5), now - TimeDelta::days(100));
        t.record_snapshot_at(metrics(0.6), now - TimeDelta::days(2));
        assert_eq!(t.prune_old_snapshots(30), 1);
        assert_eq!(t.snapshot_count(), 1);
        assert!(t.baseline().is_some());
    }

    #[test]
    fn period_metrics_aggregate_and_classify_trends() {
        let mut t = tracker();
        let now = Utc::now();
        let mut early = metrics(0.5);
        early.error_rate = 0.2;
        let mut late = metrics(0.8);
        late.error_rate = 0.18;
        late.average_execution_time_ms = 15_000.0;
        t.record_snapshot_at(early, now - TimeDelta::days(3));
        t.record_snapshot_at(late, now - TimeDelta::days(1));
        let period = t
            .metrics_for_period(now - TimeDelta::days(7), now)
            .unwrap();
        assert_eq!(period.snapshot_count, 2);
        assert_eq!(period.aggregate.tasks_completed, 20);
        assert!((period.aggregate.success_rate - 0.65).abs() < 1e-12);
        assert_eq!(period.trends.success_rate, TrendDirection::Up);
        assert_eq!(period.trends.error_rate, TrendDirection::Stable);
        assert_eq!(period.trends.average_execution_time_ms, TrendDirection::Down);
        assert_eq!(period.trends.user_satisfaction, TrendDirection::Stable);
    }

    #[test]
    fn empty_period_is_an_error() {
        let t = tracker();
        let now = Utc::now();
        let err = t
            .metrics_for_period(now - TimeDelta::days(1), now)
            .unwrap_err();
        assert!(err.is_insufficient_data());
    }

    #[test]
    fn metrics_are_clamped_on_record() {
        let mut t = tracker();
        let mut m = metrics(1.7);
        m.error_rate = -0.3;
        m.average_execution_time_ms = f64::NAN;
        let snap = t.record_snapshot(m);
        assert_eq!(snap.metrics.success_rate, 1.0);
        assert_eq!(snap.metrics.error_rate, 0.0);
        assert_eq!(snap.metrics.average_execution_time_ms, 0.0);
    }

    #[test]
    fn report_without_data_says_so() {
        let report = tracker().generate_report();
        assert!(report.improvement.is_none());
        assert!(report.summary.contains("not recorded enough"));
    }

    #[test]
    fn report_recommends_on_weak_metrics() {
        let mut t = tracker();
        t.record_snapshot(metrics(0.5));
        let report = t.generate_report();
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("Success rate")));
        assert!(report.improvement.is_some());
    }
}
