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
use crate::logging::SharedLogger;
use crate::q_learning::{ActionSelection, QLearningCore};
use crate::reward::MAX_REWARD;
use crate::types::{AgentAction, TaskExperience, TaskState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;
const COMPONENT: &str = "explain";
pub const MAX_ALTERNATIVES: usize = 3;
pub const MAX_CONTRIBUTING: usize = 5;
pub const SIMILARITY_THRESHOLD: f64 = 0.5;
pub const CONFIDENCE_FLOOR: f64 = 0.1;
pub const CONFIDENCE_CEILING: f64 = 0.95;
const RECENT_WINDOW: usize = 10;
const ATTEMPT_DISTANCE_CAP: f64 = 5.0;
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionType {
    Exploration,
    Exploitation,
}
impl DecisionType {
    pub fn from_exploration(was_exploration: bool) -> Self {
        if was_exploration {
            Self::Exploration
        } else {
            Self::Exploitation
        }
    }
}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlternativeAction {
    pub action: AgentAction,
    pub q_value: Option<f64>,
    pub reason: String,
}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributingExperience {
    pub task_id: String,
    pub task_type: String,
    pub reward: f64,
    pub similarity: f64,
    pub timestamp: DateTime<Utc>,
}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionFactor {
    pub name: String,
    pub value: f64,
    pub impact: f64,
    pub description: String,
}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionExplanation {
    pub decision_type: DecisionType,
    pub selected_action: AgentAction,
    pub q_value: Option<f64>,
    pub confidence: f64,
    pub exploration_rate: f64,
    pub reasoning: String,
    pub alternatives: Vec<AlternativeAction>,
    pub contributing_experiences: Vec<ContributingExperience>,
    pub decision_factors: Vec<DecisionFactor>,
}
pub fn state_similarity(a: &TaskState, b: &TaskState) -> f64 {
    let complexity = 1.0 - (a.task_complexity - b.task_complexity).abs().min(1.0);
    let resources = 1.0 - (a.available_resources - b.available_resources).abs().min(1.0);
    let attempt_gap = a.previous_attempts.abs_diff(b.previous_attempts) as f64;
    let attempts = 1.0 - attempt_gap.min(ATTEMPT_DISTANCE_CAP) / ATTEMPT_DISTANCE_CAP;
    let capabilities = jaccard(&a.required_capabilities, &b.required_capabilities);
    (complexity + resources + attempts + capabilities) / 4.0
}
fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let shared = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    shared / union
}
// Only experiences matching both encoded state and action count.
pub fn calculate_confidence(
    state: &TaskState,
    action: &AgentAction,
    experiences: &[TaskExperience],
) -> f64 {
    let state_key = encode_state(state);
    let action_key = encode_action(action);
    let matching: Vec<&TaskExperience> = experiences
        .iter()
        .filter(|e| encode_action(&e.action) == action_key && encode_state(&e.state) == state_key)
        .collect();
    confidence_from_matches(&matching)
}
fn confidence_from_matches(matching: &[&TaskExperience]) -> f64 {
    let count = matching.len();
    if count == 0 {
        return CONFIDENCE_FLOOR;
    }
    let n = count as f64;
    let experience_term = ((n + 1.0).log10() / 2.0).min(0.4);
    let successes = matching.iter().filter(|e| e.reward > 0.0).count() as f64;
    let success_term = successes / n * 0.3;
    let recent = &matching[count.saturating_sub(RECENT_WINDOW)..];
    let recent_mean = recent.iter().map(|e| e.reward).sum::<f64>() / recent.len() as f64;
    let recency_term = recent_mean.max(0.0) * 0.3;
    (experience_term + success_term + recency_term).min(CONFIDENCE_CEILING)
}
fn confidence_label(confidence: f64) -> &'static str {
    if confidence >= 0.7 {
        "high"
    } else if confidence >= 0.4 {
        "moderate"
    } else {
        "low"
    }
}
#[derive(Debug, Clone)]
pub struct ExplainableDecisionLayer {
    logger: SharedLogger,
}
impl ExplainableDecisionLayer {
    pub fn new(logger: SharedLogger) -> Self {
        Self { logger }
    }
    #[allow(clippy::too_many_arguments)]
    pub fn explain_action(
        &self,
        state: &TaskState,
        selected_action: &AgentAction,
        available_actions: &[AgentAction],
        q_values: &HashMap<String, f64>,
        exploration_rate: f64,
        experiences: &[TaskExperience],
        was_exploration: bool,
    ) -> ActionExplanation {
        let decision_type = DecisionType::from_exploration(was_exploration);
        let state_key = encode_state(state);
        let selected_key = encode_action(selected_action);
        let q_value = q_values.get(&selected_key).copied();

        let same_action: Vec<&TaskExperience> = experiences
            .iter()
            .filter(|e| encode_action(&e.action) == selected_key)
            .collect();
        let matching: Vec<&TaskExperience> = same_action
            .iter()
            .copied()
            .filter(|e| encode_state(&e.state) == state_key)
            .collect();
        let confidence = confidence_from_matches(&matching);

        let alternatives = rank_alternatives(
            &selected_key,
            q_value,
            available_actions,
            q_values,
            was_exploration,
        );
        let contributing_experiences = contributing(state, &same_action);
        let reasoning = reasoning(
            decision_type,
            selected_action,
            q_value,
            available_actions.len(),
            exploration_rate,
            confidence,
            matching.len(),
        );
        let decision_factors = factors(
            state,
            q_value,
            exploration_rate,
            was_exploration,
            confidence,
            matching.len(),
        );

        self.logger.debug(
            COMPONENT,
            "decision_explained",
            json!({
                "strategy": selected_action.strategy,
                "decision_type": decision_type,
                "confidence": confidence,
                "alternatives": alternatives.len(),
                "contributing": contributing_experiences.len(),
            }),
        );

        ActionExplanation {
            decision_type,
            selected_action: selected_action.clone(),
            q_value,
            confidence,
            exploration_rate,
            reasoning,
            alternatives,
            contributing_experiences,
            decision_factors,
        }
    }
    pub fn explain_selection(
        &self,
        core: &QLearningCore,
        state: &TaskState,
        selection: &ActionSelection,
        available_actions: &[AgentAction],
        experiences: &[TaskExperience],
    ) -> ActionExplanation {
        self.explain_action(
            state,
            &selection.action,
            available_actions,
            &core.state_action_values(state),
            core.exploration_rate(),
            experiences,
            selection.was_exploration,
        )
    }
}
fn rank_alternatives(
    selected_key: &str,
    selected_q: Option<f64>,
    available_actions: &[AgentAction],
    q_values: &HashMap<String, f64>,
    was_exploration: bool,
) -> Vec<AlternativeAction> {
    let mut candidates: Vec<(AgentAction, Option<f64>)> = available_actions
        .iter()
        .filter_map(|a| {
            let key = encode_action(a);
            (key != selected_key).then(|| (a.clone(), q_values.get(&key).copied()))
        })
        .collect();
    // Unknown values rank below every known one; the sort is stable.
    candidates.sort_by(|a, b| {
        let a = a.1.unwrap_or(f64::NEG_INFINITY);
        let b = b.1.unwrap_or(f64::NEG_INFINITY);
        b.total_cmp(&a)
    });
    candidates
        .into_iter()
        .take(MAX_ALTERNATIVES)
        .map(|(action, q_value)| {
            let reason = match (q_value, selected_q) {
                (None, _) => "Not yet tried in this state".to_string(),
                (Some(q), _) if was_exploration => format!(
                    "Passed over while exploring (learned value {q:.3})"
                ),
                (Some(q), Some(s)) if q < s => {
                    format!("Lower learned value ({q:.3} vs {s:.3})")
                }
                (Some(q), Some(_)) => {
                    format!("Tied learned value ({q:.3}); earlier option preferred")
                }
                (Some(q), None) => format!("Learned value {q:.3} was not used for this decision"),
            };
            AlternativeAction {
                action,
                q_value,
                reason,
            }
        })
        .collect()
}
fn contributing(state: &TaskState, same_action: &[&TaskExperience]) -> Vec<ContributingExperience> {
    let mut similar: Vec<ContributingExperience> = same_action
        .iter()
        .filter_map(|e| {
            let similarity = state_similarity(state, &e.state);
            (similarity > SIMILARITY_THRESHOLD).then(|| ContributingExperience {
                task_id: e.task_id.clone(),
                task_type: e.task_type.clone(),
                reward: e.reward,
                similarity,
                timestamp: e.timestamp,
            })
        })
        .collect();
    similar.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    similar.truncate(MAX_CONTRIBUTING);
    similar
}
fn reasoning(
    decision_type: DecisionType,
    action: &AgentAction,
    q_value: Option<f64>,
    option_count: usize,
    exploration_rate: f64,
    confidence: f64,
    matches: usize,
) -> String {
    let value = q_value.map_or_else(
        || "no learned value yet".to_string(),
        |q| format!("learned value {q:.3}"),
    );
    let mut text = match decision_type {
        DecisionType::Exploitation => format!(
            "Selected '{}' because it has the highest {} among {} available strategies.",
            action.strategy, value, option_count
        ),
        DecisionType::Exploration => format!(
            "Selected '{}' to explore alternatives (exploration rate {:.1}%); it has {}.",
            action.strategy,
            exploration_rate * 100.0,
            value
        ),
    };
    let _ = write!(
        text,
        " Confidence is {} ({:.0}%) based on {} matching past execution{}.",
        confidence_label(confidence),
        confidence * 100.0,
        matches,
        if matches == 1 { "" } else { "s" }
    );
    if !action.tools_used.is_empty() {
        let _ = write!(text, " Tools: {}.", action.tools_used.join(", "));
    }
    text
}
fn factors(
    state: &TaskState,
    q_value: Option<f64>,
    exploration_rate: f64,
    was_exploration: bool,
    confidence: f64,
    matches: usize,
) -> Vec<DecisionFactor> {
    let value_impact = q_value.map_or(0.0, |q| (q.abs() / MAX_REWARD).min(1.0));
    let attempts = f64::from(state.previous_attempts);
    let mut factors = vec![
        DecisionFactor {
            name: "exploration_rate".to_string(),
            value: exploration_rate,
            impact: if was_exploration { 1.0 } else { exploration_rate },
            description: format!(
                "{:.1}% chance of trying a random strategy",
                exploration_rate * 100.0
            ),
        },
        DecisionFactor {
            name: "learned_value".to_string(),
            value: q_value.unwrap_or(0.0),
            impact: if was_exploration { value_impact / 2.0 } else { value_impact },
            description: "Expected return learned for this state and strategy".to_string(),
        },
        DecisionFactor {
            name: "experience".to_string(),
            value: matches as f64,
            impact: confidence,
            description: format!("{matches} matching past executions"),
        },
        DecisionFactor {
            name: "task_complexity".to_string(),
            value: state.task_complexity,
            impact: state.task_complexity * 0.5,
            description: "Complexity of the task being planned".to_string(),
        },
        DecisionFactor {
            name: "available_resources".to_string(),
            value: state.available_resources,
            impact: (1.0 - state.available_resources) * 0.5,
            description: "Scarcer resources weigh more heavily".to_string(),
        },
        DecisionFactor {
            name: "previous_attempts".to_string(),
            value: attempts,
            impact: attempts.min(ATTEMPT_DISTANCE_CAP) / ATTEMPT_DISTANCE_CAP * 0.5,
            description: "Earlier attempts at this task".to_string(),
        },
    ];
    factors.sort_by(|a, b| b.impact.total_cmp(&a.impact));
    factors
}
pub fn format_explanation(explanation: &ActionExplanation) -> String {
    let mut out = String::new();
    let decision = match explanation.decision_type {
        DecisionType::Exploration => "exploration",
        DecisionType::Exploitation => "exploitation",
    };
    let _ = writeln!(
        out,
        "Decision: {} ({decision})",
        explanation.selected_action.strategy
    );
    let _ = writeln!(out, "Confidence: {:.0}%", explanation.confidence * 100.0);
    let _ = writeln!(out, "{}", explanation.reasoning);
    if !explanation.alternatives.is_empty() {
        let _ = writeln!(out, "Alternatives:");
        for alt in &explanation.alternatives {
            let _ = writeln!(out, "  - {}: {}", alt.action.strategy, alt.reason);
        }
    }
    if !explanation.contributing_experiences.is_empty() {
        let _ = writeln!(out, "Based on:");
        for exp in &explanation.contributing_experiences {
            let _ = writeln!(
                out,
                "  - {} ({}) reward {:.2}, similarity {:.0}%",
                exp.task_id,
                exp.task_type,
                exp.reward,
                exp.similarity * 100.0
            );
        }
    }
    let _ = writeln!(out, "Factors:");
    for factor in &explanation.decision_factors {
        let _ = writeln!(
            out,
            "  - {} = {:.3} (impact {:.2})",
            factor.name, factor.value, factor.impact
        );
    }
    out
}
