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

use crate::config::RewardConfig;
use crate::types::{LearningFeedback, TaskResult};
use serde::{Deserialize, Serialize};
pub const MAX_REWARD: f64 = 2.0;
pub const MIN_REWARD: f64 = -2.0;
const DEFAULT_USAGE: f64 = 0.5;
const ISSUE_PENALTY: f64 = 0.1;
const SUGGESTION_PENALTY: f64 = 0.05;
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardComponent {
    pub raw: f64,
    pub weight: f64,
    pub weighted: f64,
}
impl RewardComponent {
    fn new(raw: f64, weight: f64) -> Self {
        Self {
            raw,
            weight,
            weighted: raw * weight,
        }
    }
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardBreakdown {
    pub success: RewardComponent,
    pub time: RewardComponent,
    pub quality: RewardComponent,
    pub resource: RewardComponent,
    pub feedback: Option<RewardComponent>,
    pub penalty: f64,
    pub raw_total: f64,
    pub reward: f64,
}
#[derive(Debug, Clone, Default)]
pub struct RewardCalculator {
    config: RewardConfig,
}
impl RewardCalculator {
    pub fn new(config: RewardConfig) -> Self {
        Self { config }
    }
    pub fn config(&self) -> &RewardConfig {
        &self.config
    }
    pub fn calculate_reward(
        &self,
        result: &TaskResult,
        feedback: Option<&LearningFeedback>,
    ) -> f64 {
        self.breakdown(result, feedback).reward
    }
    pub fn breakdown(
        &self,
        result: &TaskResult,
        feedback: Option<&LearningFeedback>,
    ) -> RewardBreakdown {
        let cfg = &self.config;
        let success = RewardComponent::new(
            if result.success { 1.0 } else { -1.0 },
            cfg.success_weight,
        );
        let time = RewardComponent::new(self.time_score(result), cfg.time_weight);
        let quality = RewardComponent::new(self.quality_score(result), cfg.quality_weight);
        let resource = RewardComponent::new(resource_score(result), cfg.resource_weight);
        let feedback =
            feedback.map(|f| RewardComponent::new(feedback_score(f), cfg.feedback_weight));
        let penalty = self.penalty(result);
        let raw_total = success.weighted
            + time.weighted
            + quality.weighted
            + resource.weighted
            + feedback.map_or(0.0, |f| f.weighted)
            - penalty;
        let total_weight = cfg.total_weight();
        let normalized = if total_weight > 0.0 {
            raw_total / total_weight * 2.0
        } else {
            raw_total
        };
        let reward = if normalized.is_finite() {
            normalized.clamp(MIN_REWARD, MAX_REWARD)
        } else {
            0.0
        };
        RewardBreakdown {
            success,
            time,
            quality,
            resource,
            feedback,
            penalty,
            raw_total,
            reward,
        }
    }
    fn time_score(&self, result: &TaskResult) -> f64 {
        let baseline = self.config.baseline_time_ms;
        let elapsed = match result.execution_time_ms {
            Some(ms) if ms.is_finite() && ms >= 0.0 => ms,
            _ => return 0.0,
        };
        if !(baseline > 0.0) {
            return 0.0;
        }
        let ratio = elapsed / baseline;
        if ratio < 1.0 {
            (1.0 - ratio).min(1.0)
        } else {
            (1.0 - ratio).max(-1.0)
        }
    }
    fn quality_score(&self, result: &TaskResult) -> f64 {
        let mut score = finite_or(result.quality, 0.0);
        if let Some(coverage) = result.coverage.filter(|c| c.is_finite()) {
            let coverage_score = (coverage - self.config.baseline_coverage) * 2.0;
            if coverage_score > score {
                score = coverage_score;
            }
        }
        score.clamp(-1.0, 1.0)
    }
    fn penalty(&self, result: &TaskResult) -> f64 {
        let mut penalty = result.errors.len() as f64 * self.config.error_penalty;
        if result.timed_out {
            penalty += self.config.timeout_penalty;
        }
        penalty
    }
}
fn finite_or(value: Option<f64>, default: f64) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(default)
}
fn resource_score(result: &TaskResult) -> f64 {
    let cpu = finite_or(result.resource_usage.cpu, DEFAULT_USAGE).clamp(0.0, 1.0);
    let memory = finite_or(result.resource_usage.memory, DEFAULT_USAGE).clamp(0.0, 1.0);
    ((1.0 - cpu) + (1.0 - memory)) / 2.0
}
fn feedback_score(feedback: &LearningFeedback) -> f64 {
    let rating = if feedback.rating.is_finite() {
        feedback.rating.clamp(0.0, 1.0)
    } else {
        0.5
    };
    let score = (rating - 0.5) * 2.0
        - feedback.issues.len() as f64 * ISSUE_PENALTY
        - feedback.suggestions.len() as f64 * SUGGESTION_PENALTY;
    score.clamp(-1.0, 1.0)
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeedbackSource;

    fn calculator() -> RewardCalculator {
        RewardCalculator::new(RewardConfig::default())
    }

    #[test]
    fn fast_successful_run_with_coverage_gain() {
        let calc = calculator();
        let result = TaskResult::succeeded(15_000.0).with_coverage(0.9);
        let breakdown = calc.breakdown(&result, None);
        assert_eq!(breakdown.success.raw, 1.0);
        assert_eq!(breakdown.time.raw, 0.5);
        assert!((breakdown.quality.raw - 0.2).abs() < 1e-9);
        assert_eq!(breakdown.resource.raw, 0.5);
        assert_eq!(breakdown.penalty, 0.0);
        assert!(breakdown.feedback.is_none());
        assert!(breakdown.reward > 0.0);
        let defaults = calc.calculate_reward(&TaskResult::default(), None);
        assert!(breakdown.reward > defaults);
    }

    #[test]
    fn normalises_by_total_configured_weight() {
        let calc = calculator();
        let result = TaskResult::succeeded(15_000.0).with_coverage(0.9);
        let b = calc.breakdown(&result, None);
        let expected = b.raw_total / 3.0 * 2.0;
        assert!((b.reward - expected).abs() < 1e-12);
    }

    #[test]
    fn slow_runs_are_floored_at_minus_one() {
        let calc = calculator();
        let result = TaskResult::succeeded(120_000.0);
        assert_eq!(calc.breakdown(&result, None).time.raw, -1.0);
        let result = TaskResult::succeeded(45_000.0);
        assert_eq!(calc.breakdown(&result, None).time.raw, -0.5);
    }

    #[test]
    fn quality_score_wins_when_higher_than_coverage_delta() {
        let calc = calculator();
        let result = TaskResult::succeeded(30_000.0)
            .with_quality(0.9)
            .with_coverage(0.85);
        assert_eq!(calc.breakdown(&result, None).quality.raw, 0.9);
    }

    #[test]
    fn errors_and_timeouts_are_penalised() {
        let calc = calculator();
        let result =
            TaskResult::failed(30_000.0, vec!["assertion".into(), "flaky".into()]).timed_out();
        let b = calc.breakdown(&result, None);
        assert!((b.penalty - 0.9).abs() < 1e-12);
        let clean = calc.calculate_reward(&TaskResult::failed(30_000.0, vec![]), None);
        assert!(b.reward < clean);
    }

    #[test]
    fn feedback_is_clamped() {
        let calc = calculator();
        let harsh = LearningFeedback::rating(FeedbackSource::User, 0.0)
            .with_issues(vec!["a".into(); 20]);
        let b = calc.breakdown(&TaskResult::succeeded(30_000.0), Some(&harsh));
        assert_eq!(b.feedback.unwrap().raw, -1.0);
        let glowing = LearningFeedback::rating(FeedbackSource::System, 1.0)
            .with_suggestions(vec!["tidy".into()]);
        let b = calc.breakdown(&TaskResult::succeeded(30_000.0), Some(&glowing));
        assert!((b.feedback.unwrap().raw - 0.95).abs() < 1e-12);
    }

    #[test]
    fn reported_resource_usage_is_used() {
        let calc = calculator();
        let result = TaskResult::succeeded(30_000.0).with_resource_usage(0.2, 0.4);
        assert!((calc.breakdown(&result, None).resource.raw - 0.7).abs() < 1e-12);
    }

    #[test]
    fn extreme_inputs_stay_in_bounds() {
        let calc = calculator();
        let mut result = TaskResult::failed(f64::INFINITY, vec!["e".into(); 1_000]).timed_out();
        result.quality = Some(f64::NAN);
        let reward = calc.calculate_reward(&result, None);
        assert_eq!(reward, MIN_REWARD);
    }
}
