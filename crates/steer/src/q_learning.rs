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

use crate::codec::{encode_action, encode_state};
use crate::config::QLearningConfig;
use crate::error::{LearningError, Result};
use crate::logging::SharedLogger;
use crate::replay_buffer::{ExperienceReplayBuffer, ReplayBufferExport};
use crate::types::{AgentAction, TaskExperience, TaskState};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
const COMPONENT: &str = "q_learning";
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QValue {
    pub value: f64,
    pub update_count: u64,
    pub last_updated: DateTime<Utc>,
}
type QKey = (String, String);
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QLearningExport {
    // encoded state -> encoded action -> entry
    pub q_table: BTreeMap<String, BTreeMap<String, QValue>>,
    pub config: QLearningConfig,
    pub step_count: u64,
    pub episode_count: u64,
    pub exploration_rate: f64,
}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QLearningStats {
    pub step_count: u64,
    pub episode_count: u64,
    pub exploration_rate: f64,
    pub table_size: usize,
    pub state_count: usize,
    pub average_q_value: f64,
    pub max_q_value: f64,
    pub min_q_value: f64,
    pub replay_buffer_size: usize,
}
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSelection {
    pub action: AgentAction,
    pub was_exploration: bool,
}
#[derive(Debug, Clone)]
pub struct QLearningCore {
    config: QLearningConfig,
    q_table: HashMap<QKey, QValue>,
    actions_by_state: HashMap<String, Vec<String>>,
    exploration_rate: f64,
    replay_buffer: ExperienceReplayBuffer,
    step_count: u64,
    episode_count: u64,
    rng: StdRng,
    logger: SharedLogger,
}
impl QLearningCore {
    pub fn new(config: QLearningConfig, logger: SharedLogger) -> Self {
        let rng = config
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        let replay_buffer = ExperienceReplayBuffer::new(config.replay_buffer(), logger.clone());
        Self {
            exploration_rate: config.exploration_rate,
            config,
            q_table: HashMap::new(),
            actions_by_state: HashMap::new(),
            replay_buffer,
            step_count: 0,
            episode_count: 0,
            rng,
            logger,
        }
    }
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }
    pub fn config(&self) -> &QLearningConfig {
        &self.config
    }
    pub fn exploration_rate(&self) -> f64 {
        self.exploration_rate
    }
    pub fn set_exploration_rate(&mut self, new_rate: f64) {
        self.exploration_rate = new_rate.clamp(self.config.min_exploration_rate, 1.0);
    }
    pub fn step_count(&self) -> u64 {
        self.step_count
    }
    pub fn episode_count(&self) -> u64 {
        self.episode_count
    }
    pub fn replay_buffer(&self) -> &ExperienceReplayBuffer {
        &self.replay_buffer
    }
    pub fn select_action(
        &mut self,
        state: &TaskState,
        available_actions: &[AgentAction],
    ) -> Result<AgentAction> {
        self.select(state, available_actions).map(|s| s.action)
    }
    pub fn select(
        &mut self,
        state: &TaskState,
        available_actions: &[AgentAction],
    ) -> Result<ActionSelection> {
        if available_actions.is_empty() {
            return Err(LearningError::invalid_input(
                "cannot select an action from an empty action set",
            ));
        }
        let explore = self.rng.gen::<f64>() < self.exploration_rate;
        let greedy = if explore {
            None
        } else {
            self.best_action(state, available_actions).cloned()
        };
        let selection = match greedy {
            Some(action) => ActionSelection {
                action,
                was_exploration: false,
            },
            None => ActionSelection {
                action: available_actions[self.rng.gen_range(0..available_actions.len())].clone(),
                was_exploration: true,
            },
        };
        self.logger.debug(
            COMPONENT,
            "action_selected",
            json!({
                "strategy": selection.action.strategy,
                "exploration": selection.was_exploration,
                "epsilon": self.exploration_rate,
            }),
        );
        Ok(selection)
    }
    // Ties keep the caller's ordering.
    pub fn best_action<'a>(
        &self,
        state: &TaskState,
        available_actions: &'a [AgentAction],
    ) -> Option<&'a AgentAction> {
        let state_key = encode_state(state);
        let mut best: Option<(&AgentAction, f64)> = None;
        for action in available_actions {
            let key = (state_key.clone(), encode_action(action));
            if let Some(entry) = self.q_table.get(&key) {
                if best.map_or(true, |(_, v)| entry.value > v) {
                    best = Some((action, entry.value));
                }
            }
        }
        best.map(|(action, _)| action)
    }
    pub fn q_value(&self, state: &TaskState, action: &AgentAction) -> Option<f64> {
        self.q_table
            .get(&(encode_state(state), encode_action(action)))
            .map(|e| e.value)
    }
    pub fn state_action_values(&self, state: &TaskState) -> HashMap<String, f64> {
        self.state_values_by_key(&encode_state(state))
    }
    fn state_values_by_key(&self, state_key: &str) -> HashMap<String, f64> {
        let Some(actions) = self.actions_by_state.get(state_key) else {
            return HashMap::new();
        };
        actions
            .iter()
            .filter_map(|a| {
                self.q_table
                    .get(&(state_key.to_string(), a.clone()))
                    .map(|e| (a.clone(), e.value))
            })
            .collect()
    }
    fn max_q(&self, state_key: &str) -> f64 {
        let values = self.state_values_by_key(state_key);
        if values.is_empty() {
            0.0
        } else {
            values.values().copied().fold(f64::NEG_INFINITY, f64::max)
        }
    }
    pub fn update(&mut self, experience: &TaskExperience) -> f64 {
        let state_key = encode_state(&experience.state);
        let action_key = encode_action(&experience.action);
        let next_key = encode_state(&experience.next_state);
        let max_next = self.max_q(&next_key);
        let key = (state_key.clone(), action_key.clone());
        let current = self.q_table.get(&key).map_or(0.0, |e| e.value);
        let target = experience.reward + self.config.discount_factor * max_next;
        let td_error = target - current;
        let new_value = current + self.config.learning_rate * td_error;
        let now = Utc::now();
        match self.q_table.get_mut(&key) {
            Some(entry) => {
                entry.value = new_value;
                entry.update_count += 1;
                entry.last_updated = now;
            }
            None => {
                self.q_table.insert(
                    key,
                    QValue {
                        value: new_value,
                        update_count: 1,
                        last_updated: now,
                    },
                );
                self.actions_by_state
                    .entry(state_key)
                    .or_default()
                    .push(action_key);
            }
        }
        self.step_count += 1;
        if self.config.use_experience_replay {
            self.replay_buffer
                .add(experience.clone(), Some(td_error.abs()));
        }
        td_error
    }
    pub fn batch_update(&mut self) -> Result<usize> {
        let batch_size = self.config.batch_size;
        if !self.replay_buffer.can_sample(batch_size) {
            return Ok(0);
        }
        let batch = self.replay_buffer.sample(batch_size)?;
        let mut total_td_error = 0.0;
        for experience in &batch {
            total_td_error += self.update(experience).abs();
        }
        self.logger.debug(
            COMPONENT,
            "batch_replayed",
            json!({
                "batch_size": batch.len(),
                "mean_abs_td_error": total_td_error / batch.len().max(1) as f64,
            }),
        );
        Ok(batch.len())
    }
    pub fn decay_exploration(&mut self) {
        self.exploration_rate = (self.exploration_rate * self.config.exploration_decay)
            .max(self.config.min_exploration_rate);
    }
    pub fn end_episode(&mut self) -> Result<usize> {
        self.episode_count += 1;
        self.decay_exploration();
        let replayed = if self.config.use_experience_replay {
            self.batch_update()?
        } else {
            0
        };
        self.logger.info(
            COMPONENT,
            "episode_completed",
            json!({
                "episode": self.episode_count,
                "epsilon": self.exploration_rate,
                "replayed": replayed,
                "table_size": self.q_table.len(),
            }),
        );
        Ok(replayed)
    }
    pub fn statistics(&self) -> QLearningStats {
        let values: Vec<f64> = self.q_table.values().map(|e| e.value).collect();
        let (average, max, min) = if values.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            (
                values.iter().sum::<f64>() / values.len() as f64,
                values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                values.iter().copied().fold(f64::INFINITY, f64::min),
            )
        };
        QLearningStats {
            step_count: self.step_count,
            episode_count: self.episode_count,
            exploration_rate: self.exploration_rate,
            table_size: self.q_table.len(),
            state_count: self.actions_by_state.len(),
            average_q_value: average,
            max_q_value: max,
            min_q_value: min,
            replay_buffer_size: self.replay_buffer.len(),
        }
    }
    pub fn export(&self) -> QLearningExport {
        let mut q_table: BTreeMap<String, BTreeMap<String, QValue>> = BTreeMap::new();
        for ((state, action), entry) in &self.q_table {
            q_table
                .entry(state.clone())
                .or_default()
                .insert(action.clone(), entry.clone());
        }
        QLearningExport {
            q_table,
            config: self.config.clone(),
            step_count: self.step_count,
            episode_count: self.episode_count,
            exploration_rate: self.exploration_rate,
        }
    }
    pub fn import(&mut self, export: QLearningExport) -> Result<()> {
        export.config.validate()?;
        if export.config.replay_buffer() != self.config.replay_buffer() {
            self.replay_buffer =
                ExperienceReplayBuffer::new(export.config.replay_buffer(), self.logger.clone());
        }
        self.q_table.clear();
        self.actions_by_state.clear();
        let mut entries = 0usize;
        for (state, actions) in export.q_table {
            for (action, entry) in actions {
                self.actions_by_state
                    .entry(state.clone())
                    .or_default()
                    .push(action.clone());
                self.q_table.insert((state.clone(), action), entry);
                entries += 1;
            }
        }
        self.config = export.config;
        self.step_count = export.step_count;
        self.episode_count = export.episode_count;
        self.exploration_rate = export.exploration_rate;
        self.logger.info(
            COMPONENT,
            "q_table_imported",
            json!({ "entries": entries, "steps": self.step_count }),
        );
        Ok(())
    }
    pub fn export_replay_buffer(&self) -> ReplayBufferExport {
        self.replay_buffer.export()
    }
    pub fn import_replay_buffer(&mut self, export: ReplayBufferExport) {
        self.replay_buffer = ExperienceReplayBuffer::import(export, self.logger.clone());
    }
    pub fn reset(&mut self) {
        self.q_table.clear();
        self.actions_by_state.clear();
        self.replay_buffer.clear();
        self.step_count = 0;
        self.episode_count = 0;
        self.exploration_rate = self.config.exploration_rate;
        self.logger.info(COMPONENT, "reset", json!({}));
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SamplingMode;
    use crate::logging::{MemoryLogger, TracingLogger};

    fn greedy_config() -> QLearningConfig {
        QLearningConfig {
            exploration_rate: 0.0,
            min_exploration_rate: 0.0,
            seed: Some(11),
            ..QLearningConfig::default()
        }
    }

    fn transition(
        action: &AgentAction,
        reward: f64,
        state: TaskState,
        next: TaskState,
    ) -> TaskExperience {
        TaskExperience::new("t", "coverage", state, action.clone(), reward, next, "agent")
    }

    #[test]
    fn td_update_matches_closed_form() {
        let mut core = QLearningCore::new(greedy_config(), TracingLogger::shared());
        let state = TaskState::new(0.5, 0.5);
        let next = TaskState::new(0.9, 0.1);
        let action = AgentAction::new("thorough");
        let td = core.update(&transition(&action, 1.0, state.clone(), next));
        assert_eq!(td, 1.0);
        assert_eq!(core.q_value(&state, &action), Some(0.1));
        assert_eq!(core.step_count(), 1);
    }

    #[test]
    fn update_files_experience_with_absolute_td_error() {
        let mut core = QLearningCore::new(greedy_config(), TracingLogger::shared());
        let state = TaskState::new(0.3, 0.7);
        let terminal = TaskState::new(1.0, 0.0);
        let action = AgentAction::new("regression");

        let td = core.update(&transition(&action, 2.0, state.clone(), terminal.clone()));
        assert_eq!(td, 2.0);
        let last = core.replay_buffer().iter().last().unwrap();
        assert_eq!(last.priority, 2.0);
        assert_eq!(last.experience.reward, 2.0);

        // Q is now 0.2, so a reward of -1.0 gives a TD error of -1.2.
        let td = core.update(&transition(&action, -1.0, state.clone(), terminal));
        assert!(td < 0.0);
        assert!((td - -1.2).abs() < 1e-12);
        let last = core.replay_buffer().iter().last().unwrap();
        assert_eq!(last.priority, td.abs());
        assert_eq!(last.experience.reward, -1.0);
        assert_eq!(core.replay_buffer().len(), 2);
    }

    #[test]
    fn bootstraps_from_next_state_maximum() {
        let mut core = QLearningCore::new(greedy_config(), TracingLogger::shared());
        let s = TaskState::new(0.2, 0.2);
        let s_next = TaskState::new(0.8, 0.8);
        let a = AgentAction::new("a");
        let b = AgentAction::new("b");
        core.update(&transition(&b, 2.0, s_next.clone(), s_next.clone()));
        let q_next = core.q_value(&s_next, &b).unwrap();
        core.update(&transition(&a, 0.0, s.clone(), s_next));
        let expected = 0.1 * (0.95 * q_next);
        assert!((core.q_value(&s, &a).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn empty_action_set_is_invalid() {
        let mut core = QLearningCore::new(greedy_config(), TracingLogger::shared());
        assert!(matches!(
            core.select_action(&TaskState::default(), &[]),
            Err(LearningError::InvalidInput(_))
        ));
    }

    #[test]
    fn exploits_highest_recorded_value() {
        let mut core = QLearningCore::new(greedy_config(), TracingLogger::shared());
        let state = TaskState::new(0.4, 0.6);
        let actions = vec![
            AgentAction::new("quick"),
            AgentAction::new("balanced"),
            AgentAction::new("deep"),
        ];
        core.update(&transition(&actions[0], 0.2, state.clone(), state.clone()));
        core.update(&transition(&actions[2], 1.5, state.clone(), state.clone()));
        let selection = core.select(&state, &actions).unwrap();
        assert_eq!(selection.action.strategy, "deep");
        assert!(!selection.was_exploration);
    }

    #[test]
    fn unknown_state_falls_back_to_random_choice() {
        let mut core = QLearningCore::new(greedy_config(), TracingLogger::shared());
        let actions = vec![AgentAction::new("x"), AgentAction::new("y")];
        let selection = core.select(&TaskState::new(0.1, 0.1), &actions).unwrap();
        assert!(selection.was_exploration);
        assert!(actions.contains(&selection.action));
    }

    #[test]
    fn epsilon_decay_is_monotone_and_floored() {
        let config = QLearningConfig {
            exploration_rate: 0.3,
            exploration_decay: 0.995,
            min_exploration_rate: 0.01,
            ..QLearningConfig::default()
        };
        let mut core = QLearningCore::new(config, TracingLogger::shared());
        let mut previous = core.exploration_rate();
        for _ in 0..1000 {
            core.decay_exploration();
            assert!(core.exploration_rate() <= previous);
            previous = core.exploration_rate();
        }
        assert_eq!(core.exploration_rate(), 0.01);
    }

    #[test]
    fn batch_update_waits_for_enough_experience() {
        let config = QLearningConfig {
            batch_size: 4,
            replay_buffer_size: 16,
            sampling_mode: SamplingMode::Uniform,
            ..greedy_config()
        };
        let mut core = QLearningCore::new(config, TracingLogger::shared());
        let state = TaskState::default();
        let action = AgentAction::new("steady");
        for _ in 0..3 {
            core.update(&transition(&action, 1.0, state.clone(), state.clone()));
        }
        assert_eq!(core.batch_update().unwrap(), 0);
        core.update(&transition(&action, 1.0, state.clone(), state.clone()));
        let before = core.q_value(&state, &action).unwrap();
        assert_eq!(core.batch_update().unwrap(), 4);
        assert!(core.q_value(&state, &action).unwrap() > before);
        assert_eq!(core.step_count(), 8);
        assert_eq!(core.replay_buffer().len(), 8);
    }

    #[test]
    fn end_episode_counts_and_decays() {
        let logger = MemoryLogger::new();
        let mut core = QLearningCore::new(QLearningConfig::default(), logger.clone());
        core.end_episode().unwrap();
        assert_eq!(core.episode_count(), 1);
        assert!(core.exploration_rate() < 0.3);
        assert!(logger.contains("episode_completed"));
    }

    #[test]
    fn replay_disabled_keeps_buffer_empty() {
        let config = QLearningConfig {
            use_experience_replay: false,
            ..greedy_config()
        };
        let mut core = QLearningCore::new(config, TracingLogger::shared());
        let state = TaskState::default();
        core.update(&transition(&AgentAction::new("a"), 1.0, state.clone(), state));
        assert!(core.replay_buffer().is_empty());
        assert_eq!(core.end_episode().unwrap(), 0);
    }

    #[test]
    fn statistics_reflect_table() {
        let mut core = QLearningCore::new(greedy_config(), TracingLogger::shared());
        let state = TaskState::default();
        core.update(&transition(&AgentAction::new("a"), 1.0, state.clone(), state.clone()));
        core.update(&transition(&AgentAction::new("b"), -1.0, state.clone(), state));
        let stats = core.statistics();
        assert_eq!(stats.table_size, 2);
        assert_eq!(stats.state_count, 1);
        assert!(stats.max_q_value > 0.0);
        assert!(stats.min_q_value < 0.0);
    }

    #[test]
    fn reset_restores_initial_epsilon() {
        let mut core = QLearningCore::new(QLearningConfig::default(), TracingLogger::shared());
        let state = TaskState::default();
        core.update(&transition(&AgentAction::new("a"), 1.0, state.clone(), state));
        core.decay_exploration();
        core.reset();
        assert_eq!(core.statistics().table_size, 0);
        assert_eq!(core.exploration_rate(), 0.3);
        assert_eq!(core.step_count(), 0);
    }
}
