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

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod explain;
pub mod logging;
pub mod persistence;
pub mod q_learning;
pub mod replay_buffer;
pub mod reward;
pub mod tracker;
pub mod types;
pub use codec::{encode_action, encode_state, state_features};
pub use config::{
    EngineConfig, PersistenceConfig, QLearningConfig, ReplayBufferConfig, RewardConfig,
    SamplingMode, TrackerConfig,
};
pub use engine::{
    EngineStats, LearningEngine, LearningOutcome, RestoreSummary, StrategyRecommendation,
    TaskExecution,
};
pub use error::{LearningError, Result};
pub use explain::{
    calculate_confidence, format_explanation, state_similarity, ActionExplanation,
    AlternativeAction, ContributingExperience, DecisionFactor, DecisionType,
    ExplainableDecisionLayer,
};
pub use logging::{LearningLogger, LogLevel, MemoryLogger, SharedLogger, TracingLogger};
pub use persistence::{InMemoryStore, MemoryStore, SharedStore, StoreKeys};
pub use q_learning::{ActionSelection, QLearningCore, QLearningExport, QLearningStats, QValue};
pub use replay_buffer::{
    ExperienceReplayBuffer, ReplayBufferExport, ReplayBufferStats, ReplayRecord,
};
pub use reward::{RewardBreakdown, RewardCalculator, RewardComponent};
pub use tracker::{
    composite_score, ImprovementReport, ImprovementTrend, PerformanceMetrics, PerformanceReport,
    PerformanceSnapshot, PerformanceTracker, PeriodMetrics, TrendDirection,
};
pub use types::{
    AgentAction, FeedbackSource, LearningFeedback, ResourceUsage, TaskExperience, TaskResult,
    TaskState,
};
