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
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
#[async_trait::async_trait]
pub trait MemoryStore: Send + Sync {
    async fn store(&self, key: &str, value: Value, partition: &str) -> Result<()>;
    async fn retrieve(&self, key: &str, partition: &str) -> Result<Option<Value>>;
    async fn query(&self, pattern: &str, partition: &str) -> Result<Vec<(String, Value)>>;
}
pub type SharedStore = Arc<dyn MemoryStore>;
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<(String, String), Value>>,
}
impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
#[async_trait::async_trait]
impl MemoryStore for InMemoryStore {
    async fn store(&self, key: &str, value: Value, partition: &str) -> Result<()> {
        self.entries
            .write()
            .insert((partition.to_string(), key.to_string()), value);
        Ok(())
    }
    async fn retrieve(&self, key: &str, partition: &str) -> Result<Option<Value>> {
        Ok(self
            .entries
            .read()
            .get(&(partition.to_string(), key.to_string()))
            .cloned())
    }
    async fn query(&self, pattern: &str, partition: &str) -> Result<Vec<(String, Value)>> {
        let matcher = pattern_to_regex(pattern)?;
        let mut matches: Vec<(String, Value)> = self
            .entries
            .read()
            .iter()
            .filter(|((p, k), _)| p == partition && matcher.is_match(k))
            .map(|((_, k), v)| (k.clone(), v.clone()))
            .collect();
        matches.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(matches)
    }
}
pub fn pattern_to_regex(pattern: &str) -> Result<Regex> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{body}$")).map_err(|e| LearningError::invalid_input(e.to_string()))
}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreKeys {
    namespace: String,
    agent_id: String,
}
impl StoreKeys {
    pub fn new(namespace: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            agent_id: agent_id.into(),
        }
    }
    fn prefix(&self) -> String {
        format!("{}/{}", self.namespace, self.agent_id)
    }
    pub fn baseline(&self) -> String {
        format!("{}/baseline", self.prefix())
    }
    // Nanosecond keys; millis only outside the i64 nanosecond range.
    pub fn snapshot(&self, timestamp: DateTime<Utc>) -> String {
        let stamp = timestamp
            .timestamp_nanos_opt()
            .unwrap_or_else(|| timestamp.timestamp_millis());
        format!("{}/snapshots/{}", self.prefix(), stamp)
    }
    pub fn snapshots_pattern(&self) -> String {
        format!("{}/snapshots/*", self.prefix())
    }
    pub fn q_table(&self) -> String {
        format!("{}/q-table", self.prefix())
    }
    pub fn replay_buffer(&self) -> String {
        format!("{}/replay-buffer", self.prefix())
    }
}
pub async fn with_timeout<T, F>(operation: &'static str, timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(LearningError::Timeout {
            operation,
            elapsed: timeout,
        }),
    }
}
