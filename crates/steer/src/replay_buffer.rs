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

use crate::config::{ReplayBufferConfig, SamplingMode};
use crate::error::{LearningError, Result};
use crate::logging::SharedLogger;
use crate::types::TaskExperience;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::VecDeque;
const COMPONENT: &str = "replay_buffer";
pub const MIN_PRIORITY_OFFSET: f64 = 0.01;
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRecord {
    pub experience: TaskExperience,
    pub priority: f64,
    pub timestamp: DateTime<Utc>,
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayBufferExport {
    pub buffer: Vec<ReplayRecord>,
    pub config: ReplayBufferConfig,
    pub total_experiences: u64,
}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayBufferStats {
    pub size: usize,
    pub capacity: usize,
    pub utilization: f64,
    pub average_reward: f64,
    pub average_priority: f64,
    pub max_priority: f64,
    pub total_experiences: u64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}
pub fn default_priority(experience: &TaskExperience) -> f64 {
    experience.reward.abs() + MIN_PRIORITY_OFFSET
}
// Eviction is oldest-first; priorities only shape sampling.
#[derive(Debug, Clone)]
pub struct ExperienceReplayBuffer {
    buffer: VecDeque<ReplayRecord>,
    config: ReplayBufferConfig,
    total_experiences: u64,
    rng: StdRng,
    logger: SharedLogger,
}
impl ExperienceReplayBuffer {
    pub fn new(config: ReplayBufferConfig, logger: SharedLogger) -> Self {
        let rng = config
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self {
            buffer: VecDeque::with_capacity(config.max_size.min(4096)),
            config,
            total_experiences: 0,
            rng,
            logger,
        }
    }
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }
    pub fn config(&self) -> &ReplayBufferConfig {
        &self.config
    }
    pub fn add(&mut self, experience: TaskExperience, priority: Option<f64>) {
        let priority = match priority {
            Some(p) if p.is_finite() && p >= 0.0 => p,
            _ => default_priority(&experience),
        };
        if self.config.max_size == 0 {
            return;
        }
        while self.buffer.len() >= self.config.max_size {
            self.buffer.pop_front();
        }
        self.buffer.push_back(ReplayRecord {
            experience,
            priority,
            timestamp: Utc::now(),
        });
        self.total_experiences += 1;
    }
    pub fn can_sample(&self, batch_size: usize) -> bool {
        self.buffer.len() >= batch_size.max(self.config.min_size)
    }
    pub fn sample(&mut self, batch_size: usize) -> Result<Vec<TaskExperience>> {
        let required = batch_size.max(self.config.min_size);
        if self.buffer.len() < required {
            return Err(LearningError::InsufficientSamples {
                available: self.buffer.len(),
                required,
            });
        }
        let indices = match self.config.sampling_mode {
            SamplingMode::Uniform => self.uniform_indices(batch_size),
            SamplingMode::Prioritized => self.prioritized_indices(batch_size),
        };
        Ok(indices
            .into_iter()
            .map(|i| self.buffer[i].experience.clone())
            .collect())
    }
    fn uniform_indices(&mut self, batch_size: usize) -> Vec<usize> {
        rand::seq::index::sample(&mut self.rng, self.buffer.len(), batch_size).into_vec()
    }
    fn prioritized_indices(&mut self, batch_size: usize) -> Vec<usize> {
        let total_priority: f64 = self.buffer.iter().map(|r| r.priority).sum();
        if !(total_priority > 0.0) {
            self.logger.debug(
                COMPONENT,
                "zero_total_priority",
                json!({ "size": self.buffer.len() }),
            );
            let len = self.buffer.len();
            return (0..batch_size).map(|_| self.rng.gen_range(0..len)).collect();
        }
        (0..batch_size)
            .map(|_| {
                let target = self.rng.gen::<f64>() * total_priority;
                self.roulette_select(target)
            })
            .collect()
    }
    fn roulette_select(&self, target: f64) -> usize {
        let mut cumulative = 0.0;
        for (i, record) in self.buffer.iter().enumerate() {
            cumulative += record.priority;
            if target < cumulative {
                return i;
            }
        }
        self.buffer.len() - 1
    }
    pub fn update_priority(&mut self, task_id: &str, new_priority: f64) -> bool {
        let priority = if new_priority.is_finite() {
            new_priority.max(0.0)
        } else {
            return false;
        };
        let mut found = false;
        for record in self
            .buffer
            .iter_mut()
            .filter(|r| r.experience.task_id == task_id)
        {
            record.priority = priority;
            found = true;
        }
        found
    }
    pub fn prune(&mut self, retention_count: usize) -> usize {
        let excess = self.buffer.len().saturating_sub(retention_count);
        self.buffer.drain(..excess);
        if excess > 0 {
            self.logger.debug(
                COMPONENT,
                "pruned",
                json!({ "removed": excess, "remaining": self.buffer.len() }),
            );
        }
        excess
    }
    pub fn recent(&self, count: usize) -> Vec<&TaskExperience> {
        let skip = self.buffer.len().saturating_sub(count);
        self.buffer.iter().skip(skip).map(|r| &r.experience).collect()
    }
    pub fn iter(&self) -> impl Iterator<Item = &ReplayRecord> {
        self.buffer.iter()
    }
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
    pub fn len(&self) -> usize {
        self.buffer.len()
    }
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
    pub fn capacity(&self) -> usize {
        self.config.max_size
    }
    pub fn total_experiences(&self) -> u64 {
        self.total_experiences
    }
    pub fn statistics(&self) -> ReplayBufferStats {
        let size = self.buffer.len();
        let (reward_sum, priority_sum, max_priority) =
            self.buffer
                .iter()
                .fold((0.0, 0.0, 0.0_f64), |(r, p, m), record| {
                    (
                        r + record.experience.reward,
                        p + record.priority,
                        m.max(record.priority),
                    )
                });
        let denom = size.max(1) as f64;
        ReplayBufferStats {
            size,
            capacity: self.config.max_size,
            utilization: if self.config.max_size > 0 {
                size as f64 / self.config.max_size as f64
            } else {
                0.0
            },
            average_reward: reward_sum / denom,
            average_priority: priority_sum / denom,
            max_priority,
            total_experiences: self.total_experiences,
            oldest: self.buffer.front().map(|r| r.timestamp),
            newest: self.buffer.back().map(|r| r.timestamp),
        }
    }
    pub fn export(&self) -> ReplayBufferExport {
        ReplayBufferExport {
            buffer: self.buffer.iter().cloned().collect(),
            config: self.config.clone(),
            total_experiences: self.total_experiences,
        }
    }
    pub fn import(export: ReplayBufferExport, logger: SharedLogger) -> Self {
        let mut buffer = Self::new(export.config, logger);
        let skip = export.buffer.len().saturating_sub(buffer.config.max_size);
        if skip > 0 {
            buffer.logger.warn(
                COMPONENT,
                "import_truncated",
                json!({ "dropped": skip, "capacity": buffer.config.max_size }),
            );
        }
        buffer.buffer = export.buffer.into_iter().skip(skip).collect();
        buffer.total_experiences = export.total_experiences.max(buffer.buffer.len() as u64);
        buffer
    }
}
