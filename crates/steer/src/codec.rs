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

use crate::types::{AgentAction, TaskState};
pub const CAPABILITY_SCALE: f64 = 10.0;
pub const ATTEMPT_SCALE: f64 = 5.0;
pub const TIME_CONSTRAINT_CAP_MS: f64 = 300_000.0;
pub const STATE_FEATURES: usize = 5;
fn tenths(value: f64) -> i64 {
    if value.is_finite() {
        (value * 10.0).round() as i64
    } else {
        0
    }
}
fn unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
fn format_tenths(units: i64) -> String {
    let sign = if units < 0 { "-" } else { "" };
    let abs = units.unsigned_abs();
    format!("{sign}{}.{}", abs / 10, abs % 10)
}
pub fn state_features(state: &TaskState) -> [f64; STATE_FEATURES] {
    let time = state
        .time_constraint
        .map_or(1.0, |ms| (ms as f64 / TIME_CONSTRAINT_CAP_MS).min(1.0));
    let raw = [
        unit(state.task_complexity),
        (state.required_capabilities.len() as f64 / CAPABILITY_SCALE).min(1.0),
        (f64::from(state.previous_attempts) / ATTEMPT_SCALE).min(1.0),
        unit(state.available_resources),
        time,
    ];
    raw.map(|v| tenths(v) as f64 / 10.0)
}
pub fn encode_state(state: &TaskState) -> String {
    state_features(state)
        .iter()
        .map(|v| format_tenths(tenths(*v)))
        .collect::<Vec<_>>()
        .join(",")
}
pub fn encode_action(action: &AgentAction) -> String {
    format!(
        "{}:{}:{}",
        action.strategy,
        format_tenths(tenths(action.parallelization)),
        action.retry_policy
    )
}
