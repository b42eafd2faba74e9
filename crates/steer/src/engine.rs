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

use crate::config::EngineConfig;
use crate::error::{LearningError, Result};
use crate::explain::{ActionExplanation, ExplainableDecisionLayer};
use crate::logging::SharedLogger;
use crate::persistence::{with_timeout, SharedStore, StoreKeys};
use crate::q_learning::{QLearningCore, QLearningExport, QLearningStats};
use crate::replay_buffer::{ReplayBufferExport, ReplayBufferStats};
use crate::reward::{RewardBreakdown, RewardCalculator};
use crate::tracker::{
    PerformanceMetrics, PerformanceReport, PerformanceSnapshot, PerformanceTracker,
};
use crate::types::{AgentAction, LearningFeedback, TaskExperience, TaskResult, TaskState};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
const COMPONENT: &str = "learning_engine";
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskExecution {
    pub task_id: String,
    pub task_type: String,
    pub state: TaskState,
    pub action: AgentAction,
    pub result: TaskResult,
    pub next_state: TaskState,
    pub feedback: Option<LearningFeedback>,
}
impl TaskExecution {
    pub fn new(
        task_id: impl Into<String>,
        task_type: impl Into<String>,
        state: TaskState,
        action: AgentAction,
        result: TaskResult,
        next_state: TaskState,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            task_type: task_type.into(),
            state,
            action,
            result,
            next_state,
            feedback: None,
        }
    }
    pub fn with_feedback(mut self, feedback: LearningFeedback) -> Self {
        self.feedback = Some(feedback);
        self
    }
}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyRecommendation {
    pub action: AgentAction,
    pub was_exploration: bool,
    pub explanation: ActionExplanation,
}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningOutcome {
    pub reward: f64,
    pub td_error: f64,
    pub breakdown: RewardBreakdown,
}
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RestoreSummary {
    pub snapshots_restored: usize,
    pub learned_state_restored: bool,
}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStats {
    pub agent_id: String,
    pub q_learning: QLearningStats,
    pub replay_buffer: ReplayBufferStats,
    pub experience_log_size: usize,
    pub snapshot_count: usize,
}
pub struct LearningEngine {
    config: EngineConfig,
    core: QLearningCore,
    rewards: RewardCalculator,
    explainer: ExplainableDecisionLayer,
    tracker: Arc<Mutex<PerformanceTracker>>,
    experiences: VecDeque<TaskExperience>,
    store: Option<SharedStore>,
    keys: StoreKeys,
    improvement_cycles: Vec<JoinHandle<()>>,
    logger: SharedLogger,
}
impl std::fmt::Debug for LearningEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LearningEngine")
            .field("agent_id", &self.config.agent_id)
            .field("core", &self.core)
            .field("experiences", &self.experiences.len())
            .field("has_store", &self.store.is_some())
            .finish()
    }
}
impl LearningEngine {
    pub fn new(
        config: EngineConfig,
        logger: SharedLogger,
        store: Option<SharedStore>,
    ) -> Result<Self> {
        config.validate()?;
        let core = QLearningCore::new(config.q_learning.clone(), logger.clone());
        let mut tracker = PerformanceTracker::new(
            config.agent_id.clone(),
            config.tracker.clone(),
            config.persistence.clone(),
            logger.clone(),
        );
        if let Some(store) = &store {
            tracker = tracker.with_store(Arc::clone(store));
        }
        Ok(Self {
            keys: StoreKeys::new(config.persistence.namespace.clone(), config.agent_id.clone()),
            core,
            rewards: RewardCalculator::new(config.reward.clone()),
            explainer: ExplainableDecisionLayer::new(logger.clone()),
            tracker: Arc::new(Mutex::new(tracker)),
            experiences: VecDeque::new(),
            store,
            improvement_cycles: Vec::new(),
            logger,
            config,
        })
    }
    pub fn agent_id(&self) -> &str {
        &self.config.agent_id
    }
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
    pub fn core(&self) -> &QLearningCore {
        &self.core
    }
    pub fn tracker(&self) -> Arc<Mutex<PerformanceTracker>> {
        Arc::clone(&self.tracker)
    }
    pub fn experiences(&self) -> impl Iterator<Item = &TaskExperience> {
        self.experiences.iter()
    }
    pub async fn initialize(&mut self) -> RestoreSummary {
        let snapshots_restored = self.tracker.lock().await.initialize().await;
        let learned_state_restored = self.load_state().await;
        let summary = RestoreSummary {
            snapshots_restored,
            learned_state_restored,
        };
        self.logger.info(
            COMPONENT,
            "engine_initialized",
            json!({
                "agent_id": self.config.agent_id,
                "snapshots_restored": snapshots_restored,
                "learned_state_restored": learned_state_restored,
            }),
        );
        summary
    }
    pub fn recommend_strategy(
        &mut self,
        state: &TaskState,
        available_actions: &[AgentAction],
    ) -> Result<StrategyRecommendation> {
        let selection = self.core.select(state, available_actions)?;
        let explanation = self.explainer.explain_selection(
            &self.core,
            state,
            &selection,
            available_actions,
            self.experiences.make_contiguous(),
        );
        Ok(StrategyRecommendation {
            action: selection.action,
            was_exploration: selection.was_exploration,
            explanation,
        })
    }
    pub fn explain(
        &mut self,
        state: &TaskState,
        action: &AgentAction,
        available_actions: &[AgentAction],
        was_exploration: bool,
    ) -> ActionExplanation {
        self.explainer.explain_action(
            state,
            action,
            available_actions,
            &self.core.state_action_values(state),
            self.core.exploration_rate(),
            self.experiences.make_contiguous(),
            was_exploration,
        )
    }
    pub fn learn_from_execution(&mut self, execution: TaskExecution) -> LearningOutcome {
        let breakdown = self
            .rewards
            .breakdown(&execution.result, execution.feedback.as_ref());
        let experience = TaskExperience::new(
            execution.task_id,
            execution.task_type,
            execution.state,
            execution.action,
            breakdown.reward,
            execution.next_state,
            self.config.agent_id.clone(),
        );
        let td_error = self.core.update(&experience);
        self.logger.debug(
            COMPONENT,
            "experience_learned",
            json!({
                "task_id": experience.task_id,
                "strategy": experience.action.strategy,
                "reward": breakdown.reward,
                "td_error": td_error,
            }),
        );
        while self.experiences.len() >= self.config.max_experience_log.max(1) {
            self.experiences.pop_front();
        }
        self.experiences.push_back(experience);
        LearningOutcome {
            reward: breakdown.reward,
            td_error,
            breakdown,
        }
    }
    pub fn end_episode(&mut self) -> Result<usize> {
        let replayed = self.core.end_episode()?;
        let interval = self.config.improvement_interval_episodes;
        if interval > 0 && self.core.episode_count() % interval == 0 {
            self.spawn_improvement_cycle();
        }
        Ok(replayed)
    }
    fn spawn_improvement_cycle(&mut self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            self.logger.debug(
                COMPONENT,
                "improvement_cycle_skipped",
                json!({ "reason": "no async runtime" }),
            );
            return;
        };
        let tracker = Arc::clone(&self.tracker);
        let logger = self.logger.clone();
        let retention_days = self.config.tracker.retention_days;
        let episode = self.core.episode_count();
        self.improvement_cycles.retain(|h| !h.is_finished());
        self.improvement_cycles.push(handle.spawn(async move {
            let mut tracker = tracker.lock().await;
            let pruned = tracker.prune_old_snapshots(retention_days);
            match tracker.calculate_improvement() {
                Ok(report) => logger.info(
                    COMPONENT,
                    "improvement_cycle_completed",
                    json!({
                        "episode": episode,
                        "improvement_rate": report.improvement_rate,
                        "target_achieved": report.target_achieved,
                        "pruned": pruned,
                    }),
                ),
                Err(e) if e.is_insufficient_data() => logger.debug(
                    COMPONENT,
                    "improvement_cycle_skipped",
                    json!({ "episode": episode, "reason": e.to_string() }),
                ),
                Err(e) => logger.warn(
                    COMPONENT,
                    "improvement_cycle_failed",
                    json!({ "episode": episode, "error": e.to_string() }),
                ),
            }
        }));
    }
    pub async fn record_performance(&self, metrics: PerformanceMetrics) -> PerformanceSnapshot {
        self.tracker.lock().await.record_snapshot(metrics)
    }
    pub async fn generate_report(&self) -> PerformanceReport {
        self.tracker.lock().await.generate_report()
    }
    pub async fn statistics(&self) -> EngineStats {
        EngineStats {
            agent_id: self.config.agent_id.clone(),
            q_learning: self.core.statistics(),
            replay_buffer: self.core.replay_buffer().statistics(),
            experience_log_size: self.experiences.len(),
            snapshot_count: self.tracker.lock().await.snapshot_count(),
        }
    }
    pub async fn save_state(&self) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        let timeout = self.config.persistence.timeout();
        let partition = &self.config.persistence.partition;
        let mut saved = true;
        let entries = [
            (self.keys.q_table(), serde_json::to_value(self.core.export())),
            (
                self.keys.replay_buffer(),
                serde_json::to_value(self.core.export_replay_buffer()),
            ),
        ];
        for (key, value) in entries {
            let outcome = match value {
                Ok(value) => {
                    with_timeout("store", timeout, store.store(&key, value, partition)).await
                }
                Err(e) => Err(e.into()),
            };
            if let Err(e) = outcome {
                saved = false;
                self.logger.warn(
                    COMPONENT,
                    "state_save_failed",
                    json!({ "key": key, "error": e.to_string() }),
                );
            }
        }
        if saved {
            self.logger.info(
                COMPONENT,
                "state_saved",
                json!({ "steps": self.core.step_count(), "episodes": self.core.episode_count() }),
            );
        }
        saved
    }
    pub async fn load_state(&mut self) -> bool {
        let Some(store) = self.store.clone() else {
            return false;
        };
        let timeout = self.config.persistence.timeout();
        let partition = self.config.persistence.partition.clone();
        let q_key = self.keys.q_table();
        let lookup = store.retrieve(&q_key, &partition);
        let restored = match with_timeout("retrieve", timeout, lookup).await {
            Ok(Some(value)) => {
                match serde_json::from_value::<QLearningExport>(value)
                    .map_err(LearningError::from)
                    .and_then(|export| self.core.import(export))
                {
                    Ok(()) => true,
                    Err(e) => {
                        self.logger.warn(
                            COMPONENT,
                            "q_table_restore_failed",
                            json!({ "key": q_key, "error": e.to_string() }),
                        );
                        false
                    }
                }
            }
            Ok(None) => false,
            Err(e) => {
                self.logger.warn(
                    COMPONENT,
                    "q_table_load_failed",
                    json!({ "key": q_key, "error": e.to_string() }),
                );
                false
            }
        };
        if !restored {
            return false;
        }
        let buffer_key = self.keys.replay_buffer();
        match with_timeout("retrieve", timeout, store.retrieve(&buffer_key, &partition)).await {
            Ok(Some(value)) => match serde_json::from_value::<ReplayBufferExport>(value) {
                Ok(export) => self.core.import_replay_buffer(export),
                Err(e) => self.logger.warn(
                    COMPONENT,
                    "replay_buffer_restore_failed",
                    json!({ "key": buffer_key, "error": e.to_string() }),
                ),
            },
            Ok(None) => {}
            Err(e) => self.logger.warn(
                COMPONENT,
                "replay_buffer_load_failed",
                json!({ "key": buffer_key, "error": e.to_string() }),
            ),
        }
        true
    }
    pub async fn flush(&mut self) {
        let cycles: Vec<_> = self.improvement_cycles.drain(..).collect();
        for result in futures::future::join_all(cycles).await {
            if let Err(e) = result {
                self.logger.warn(
                    COMPONENT,
                    "improvement_cycle_panicked",
                    json!({ "error": e.to_string() }),
                );
            }
        }
        self.tracker.lock().await.flush().await;
    }
}
