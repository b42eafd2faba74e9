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

use std::time::Duration;
#[derive(Debug, thiserror::Error)]
pub enum LearningError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Replay buffer has {available} experiences, sampling requires at least {required}")]
    InsufficientSamples { available: usize, required: usize },
    #[error("No baseline has been recorded yet")]
    NoBaseline,
    #[error("No performance snapshots available: {0}")]
    NoSnapshots(String),
    #[error("Persistence operation '{operation}' failed for key '{key}': {reason}")]
    Persistence {
        operation: &'static str,
        key: String,
        reason: String,
    },
    #[error("Operation '{operation}' timed out after {elapsed:?}")]
    Timeout {
        operation: &'static str,
        elapsed: Duration,
    },
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Failed to read configuration: {0}")]
    ConfigIo(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
impl LearningError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
    pub fn persistence(
        operation: &'static str,
        key: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::Persistence {
            operation,
            key: key.into(),
            reason: reason.to_string(),
        }
    }
    // "Not enough data yet" rather than a fault.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(
            self,
            Self::InsufficientSamples { .. } | Self::NoBaseline | Self::NoSnapshots(_)
        )
    }
}
pub type Result<T> = std::result::Result<T, LearningError>;
