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

use parking_lot::Mutex;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}
pub trait LearningLogger: Send + Sync + Debug {
    fn log(&self, level: LogLevel, component: &str, event: &str, payload: Value);
    fn debug(&self, component: &str, event: &str, payload: Value) {
        self.log(LogLevel::Debug, component, event, payload);
    }
    fn info(&self, component: &str, event: &str, payload: Value) {
        self.log(LogLevel::Info, component, event, payload);
    }
    fn warn(&self, component: &str, event: &str, payload: Value) {
        self.log(LogLevel::Warn, component, event, payload);
    }
    fn error(&self, component: &str, event: &str, payload: Value) {
        self.log(LogLevel::Error, component, event, payload);
    }
}
pub type SharedLogger = Arc<dyn LearningLogger>;
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;
impl TracingLogger {
    pub fn shared() -> SharedLogger {
        Arc::new(Self)
    }
}
impl LearningLogger for TracingLogger {
    fn log(&self, level: LogLevel, component: &str, event: &str, payload: Value) {
        let payload = serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string());
        match level {
            LogLevel::Debug => debug!(component, event, payload = %payload, "Learning event"),
            LogLevel::Info => info!(component, event, payload = %payload, "Learning event"),
            LogLevel::Warn => warn!(component, event, payload = %payload, "Learning event"),
            LogLevel::Error => error!(component, event, payload = %payload, "Learning event"),
        }
    }
}
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub component: String,
    pub event: String,
    pub payload: Value,
}
#[derive(Debug, Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<LogEntry>>,
}
impl MemoryLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }
    pub fn events_at(&self, level: LogLevel) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.level == level)
            .map(|e| e.event.clone())
            .collect()
    }
    pub fn contains(&self, event: &str) -> bool {
        self.entries.lock().iter().any(|e| e.event == event)
    }
}
impl LearningLogger for MemoryLogger {
    fn log(&self, level: LogLevel, component: &str, event: &str, payload: Value) {
        self.entries.lock().push(LogEntry {
            level,
            component: component.to_string(),
            event: event.to_string(),
            payload,
        });
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_logger_records_levels() {
        let logger = MemoryLogger::new();
        logger.info("tracker", "snapshot_recorded", json!({ "count": 1 }));
        logger.warn("tracker", "baseline_store_failed", json!({}));
        assert!(logger.contains("snapshot_recorded"));
        assert_eq!(logger.events_at(LogLevel::Warn), vec!["baseline_store_failed"]);
        assert_eq!(logger.entries()[0].component, "tracker");
    }
}
