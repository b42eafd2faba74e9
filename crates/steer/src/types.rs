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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    pub task_complexity: f64,
    pub required_capabilities: BTreeSet<String>,
    pub previous_attempts: u32,
    pub available_resources: f64,
    pub time_constraint: Option<u64>,
}
impl TaskState {
    pub fn new(task_complexity: f64, available_resources: f64) -> Self {
        Self {
            task_complexity: task_complexity.clamp(0.0, 1.0),
            required_capabilities: BTreeSet::new(),
            previous_attempts: 0,
            available_resources: available_resources.clamp(0.0, 1.0),
            time_constraint: None,
        }
    }
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }
    pub fn with_previous_attempts(mut self, attempts: u32) -> Self {
        self.previous_attempts = attempts;
        self
    }
    pub fn with_time_constraint(mut self, millis: u64) -> Self {
        self.time_constraint = Some(millis);
        self
    }
}
impl Default for TaskState {
    fn default() -> Self {
        Self::new(0.5, 1.0)
    }
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAction {
    pub strategy: String,
    pub tools_used: Vec<String>,
    pub parallelization: f64,
    pub retry_policy: String,
    pub resource_allocation: f64,
}
impl AgentAction {
    pub fn new(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            tools_used: Vec::new(),
            parallelization: 0.0,
            retry_policy: "none".to_string(),
            resource_allocation: 0.5,
        }
    }
    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools_used = tools.into_iter().map(Into::into).collect();
        self
    }
    pub fn with_parallelization(mut self, parallelization: f64) -> Self {
        self.parallelization = parallelization.clamp(0.0, 1.0);
        self
    }
    pub fn with_retry_policy(mut self, retry_policy: impl Into<String>) -> Self {
        self.retry_policy = retry_policy.into();
        self
    }
    pub fn with_resource_allocation(mut self, allocation: f64) -> Self {
        self.resource_allocation = allocation.clamp(0.0, 1.0);
        self
    }
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskExperience {
    pub task_id: String,
    pub task_type: String,
    pub state: TaskState,
    pub action: AgentAction,
    pub reward: f64,
    pub next_state: TaskState,
    pub timestamp: DateTime<Utc>,
    pub agent_id: String,
}
impl TaskExperience {
    pub fn new(
        task_id: impl Into<String>,
        task_type: impl Into<String>,
        state: TaskState,
        action: AgentAction,
        reward: f64,
        next_state: TaskState,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            task_type: task_type.into(),
            state,
            action,
            reward,
            next_state,
            timestamp: Utc::now(),
            agent_id: agent_id.into(),
        }
    }
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub cpu: Option<f64>,
    pub memory: Option<f64>,
}
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub success: bool,
    pub execution_time_ms: Option<f64>,
    pub coverage: Option<f64>,
    pub quality: Option<f64>,
    #[serde(default)]
    pub resource_usage: ResourceUsage,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub timed_out: bool,
}
impl TaskResult {
    pub fn succeeded(execution_time_ms: f64) -> Self {
        Self {
            success: true,
            execution_time_ms: Some(execution_time_ms),
            ..Self::default()
        }
    }
    pub fn failed(execution_time_ms: f64, errors: Vec<String>) -> Self {
        Self {
            success: false,
            execution_time_ms: Some(execution_time_ms),
            errors,
            ..Self::default()
        }
    }
    pub fn with_coverage(mut self, coverage: f64) -> Self {
        self.coverage = Some(coverage);
        self
    }
    pub fn with_quality(mut self, quality: f64) -> Self {
        self.quality = Some(quality);
        self
    }
    pub fn with_resource_usage(mut self, cpu: f64, memory: f64) -> Self {
        self.resource_usage = ResourceUsage {
            cpu: Some(cpu),
            memory: Some(memory),
        };
        self
    }
    pub fn timed_out(mut self) -> Self {
        self.timed_out = true;
        self
    }
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FeedbackSource {
    #[default]
    User,
    System,
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningFeedback {
    pub source: FeedbackSource,
    // 0.5 is neutral.
    pub rating: f64,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}
impl LearningFeedback {
    pub fn rating(source: FeedbackSource, rating: f64) -> Self {
        Self {
            source,
            rating,
            issues: Vec::new(),
            suggestions: Vec::new(),
        }
    }
    pub fn with_issues(mut self, issues: Vec<String>) -> Self {
        self.issues = issues;
        self
    }
    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }
}
