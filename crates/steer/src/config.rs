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

use crate::error::{LearningError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    #[default]
    Uniform,
    Prioritized,
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QLearningConfig {
    pub learning_rate: f64,
    pub discount_factor: f64,
    pub exploration_rate: f64,
    pub exploration_decay: f64,
    pub min_exploration_rate: f64,
    pub use_experience_replay: bool,
    pub replay_buffer_size: usize,
    pub batch_size: usize,
    pub sampling_mode: SamplingMode,
    pub seed: Option<u64>,
}
impl Default for QLearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            discount_factor: 0.95,
            exploration_rate: 0.3,
            exploration_decay: 0.995,
            min_exploration_rate: 0.01,
            use_experience_replay: true,
            replay_buffer_size: 10_000,
            batch_size: 32,
            sampling_mode: SamplingMode::Prioritized,
            seed: None,
        }
    }
}
impl QLearningConfig {
    pub fn validate(&self) -> Result<()> {
        check_unit("learning_rate", self.learning_rate)?;
        check_unit("discount_factor", self.discount_factor)?;
        check_unit("exploration_rate", self.exploration_rate)?;
        check_unit("exploration_decay", self.exploration_decay)?;
        check_unit("min_exploration_rate", self.min_exploration_rate)?;
        if self.min_exploration_rate > self.exploration_rate {
            return Err(LearningError::InvalidConfig(format!(
                "min_exploration_rate {} exceeds exploration_rate {}",
                self.min_exploration_rate, self.exploration_rate
            )));
        }
        if self.replay_buffer_size == 0 || self.batch_size == 0 {
            return Err(LearningError::InvalidConfig(
                "replay_buffer_size and batch_size must be positive".to_string(),
            ));
        }
        if self.batch_size > self.replay_buffer_size {
            return Err(LearningError::InvalidConfig(format!(
                "batch_size {} exceeds replay_buffer_size {}",
                self.batch_size, self.replay_buffer_size
            )));
        }
        Ok(())
    }
    pub fn replay_buffer(&self) -> ReplayBufferConfig {
        ReplayBufferConfig {
            max_size: self.replay_buffer_size,
            min_size: self.batch_size,
            sampling_mode: self.sampling_mode,
            seed: self.seed.map(|s| s.wrapping_add(1)),
        }
    }
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayBufferConfig {
    pub max_size: usize,
    pub min_size: usize,
    pub sampling_mode: SamplingMode,
    pub seed: Option<u64>,
}
impl Default for ReplayBufferConfig {
    fn default() -> Self {
        Self {
            max_size: 10_000,
            min_size: 100,
            sampling_mode: SamplingMode::Uniform,
            seed: None,
        }
    }
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub success_weight: f64,
    pub time_weight: f64,
    pub quality_weight: f64,
    pub resource_weight: f64,
    pub feedback_weight: f64,
    pub baseline_time_ms: f64,
    pub baseline_coverage: f64,
    pub error_penalty: f64,
    pub timeout_penalty: f64,
}
impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            success_weight: 1.0,
            time_weight: 0.5,
            quality_weight: 0.7,
            resource_weight: 0.3,
            feedback_weight: 0.5,
            baseline_time_ms: 30_000.0,
            baseline_coverage: 0.8,
            error_penalty: 0.2,
            timeout_penalty: 0.5,
        }
    }
}
impl RewardConfig {
    pub fn total_weight(&self) -> f64 {
        self.success_weight
            + self.time_weight
            + self.quality_weight
            + self.resource_weight
            + self.feedback_weight
    }
    pub fn validate(&self) -> Result<()> {
        let weights = [
            ("success_weight", self.success_weight),
            ("time_weight", self.time_weight),
            ("quality_weight", self.quality_weight),
            ("resource_weight", self.resource_weight),
            ("feedback_weight", self.feedback_weight),
            ("error_penalty", self.error_penalty),
            ("timeout_penalty", self.timeout_penalty),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(LearningError::InvalidConfig(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.total_weight() <= 0.0 {
            return Err(LearningError::InvalidConfig(
                "reward weights must not all be zero".to_string(),
            ));
        }
        if !(self.baseline_time_ms > 0.0) {
            return Err(LearningError::InvalidConfig(
                "baseline_time_ms must be positive".to_string(),
            ));
        }
        check_unit("baseline_coverage", self.baseline_coverage)
    }
}
pub const MAX_WINDOW_DAYS: i64 = 36_500;
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub target_improvement: f64,
    pub retention_days: i64,
    pub trend_window_days: i64,
    pub projection_horizon: usize,
}
impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            target_improvement: 20.0,
            retention_days: 90,
            trend_window_days: 30,
            projection_horizon: 30,
        }
    }
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub namespace: String,
    pub partition: String,
    pub timeout_ms: u64,
}
impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            namespace: "learning".to_string(),
            partition: "learning".to_string(),
            timeout_ms: 5_000,
        }
    }
}
impl PersistenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub agent_id: String,
    pub q_learning: QLearningConfig,
    pub reward: RewardConfig,
    pub tracker: TrackerConfig,
    pub persistence: PersistenceConfig,
    pub max_experience_log: usize,
    // 0 disables improvement cycles.
    pub improvement_interval_episodes: u64,
}
impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            agent_id: "qe-agent".to_string(),
            q_learning: QLearningConfig::default(),
            reward: RewardConfig::default(),
            tracker: TrackerConfig::default(),
            persistence: PersistenceConfig::default(),
            max_experience_log: 10_000,
            improvement_interval_episodes: 10,
        }
    }
}
impl EngineConfig {
    pub fn load_from_file(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
    pub fn default_config_path() -> PathBuf {
        PathBuf::from("config/learning/engine.toml")
    }
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();
        Self::load_from_file(&config_path).unwrap_or_else(|_| Self::default())
    }
    pub fn with_env_overrides(mut self) -> Self {
        dotenvy::dotenv().ok();
        if let Ok(agent_id) = std::env::var("STEER_AGENT_ID") {
            self.agent_id = agent_id;
        }
        if let Ok(namespace) = std::env::var("STEER_NAMESPACE") {
            self.persistence.namespace = namespace;
        }
        if let Some(v) = parse_env_f64("STEER_LEARNING_RATE") {
            self.q_learning.learning_rate = v;
        }
        if let Some(v) = parse_env_f64("STEER_DISCOUNT_FACTOR") {
            self.q_learning.discount_factor = v;
        }
        if let Some(v) = parse_env_f64("STEER_EXPLORATION_RATE") {
            self.q_learning.exploration_rate = v;
        }
        if let Some(v) = parse_env_u64("STEER_SEED") {
            self.q_learning.seed = Some(v);
        }
        if let Some(v) = parse_env_u64("STEER_PERSISTENCE_TIMEOUT_MS") {
            self.persistence.timeout_ms = v;
        }
        self
    }
    pub fn validate(&self) -> Result<()> {
        if self.agent_id.trim().is_empty() {
            return Err(LearningError::InvalidConfig(
                "agent_id must not be empty".to_string(),
            ));
        }
        self.q_learning.validate()?;
        self.reward.validate()?;
        for (name, days) in [
            ("retention_days", self.tracker.retention_days),
            ("trend_window_days", self.tracker.trend_window_days),
        ] {
            if !(1..=MAX_WINDOW_DAYS).contains(&days) {
                return Err(LearningError::InvalidConfig(format!(
                    "tracker.{name} must be within [1, {MAX_WINDOW_DAYS}], got {days}"
                )));
            }
        }
        Ok(())
    }
}
fn check_unit(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(LearningError::InvalidConfig(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}
fn parse_env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok().and_then(|s| s.parse::<f64>().ok())
}
fn parse_env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|s| s.parse::<u64>().ok())
}
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
agent_id = "coverage-analyzer"

[q_learning]
learning_rate = 0.2
sampling_mode = "uniform"

[reward]
baseline_time_ms = 10000.0
"#
        )
        .unwrap();
        let config = EngineConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.agent_id, "coverage-analyzer");
        assert_eq!(config.q_learning.learning_rate, 0.2);
        assert_eq!(config.q_learning.discount_factor, 0.95);
        assert_eq!(config.q_learning.sampling_mode, SamplingMode::Uniform);
        assert_eq!(config.reward.baseline_time_ms, 10_000.0);
        assert_eq!(config.reward.success_weight, 1.0);
        assert_eq!(config.persistence.namespace, "learning");
    }

    #[test]
    fn out_of_range_rate_is_rejected() {
        let mut config = EngineConfig::default();
        config.q_learning.learning_rate = 1.5;
        assert!(matches!(
            config.validate(),
            Err(LearningError::InvalidConfig(_))
        ));
    }

    #[test]
    fn tracker_windows_are_bounded() {
        let mut config = EngineConfig::default();
        config.tracker.retention_days = MAX_WINDOW_DAYS;
        assert!(config.validate().is_ok());
        config.tracker.retention_days = i64::MAX;
        assert!(config.validate().is_err());
        config.tracker.retention_days = 90;
        config.tracker.trend_window_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn batch_larger_than_buffer_is_rejected() {
        let config = QLearningConfig {
            replay_buffer_size: 8,
            batch_size: 16,
            ..QLearningConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_toml_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "agent_id = [not toml").unwrap();
        assert!(matches!(
            EngineConfig::load_from_file(file.path()),
            Err(LearningError::ConfigParse(_))
        ));
    }

    #[test]
    fn replay_config_inherits_batch_size_as_minimum() {
        let q = QLearningConfig {
            batch_size: 8,
            seed: Some(7),
            ..QLearningConfig::default()
        };
        let replay = q.replay_buffer();
        assert_eq!(replay.min_size, 8);
        assert_eq!(replay.max_size, q.replay_buffer_size);
        assert_eq!(replay.seed, Some(8));
    }
}
