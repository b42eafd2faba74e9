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

use proptest::prelude::*;
use steer::{
    encode_state, AgentAction, FeedbackSource, LearningFeedback, QLearningConfig, QLearningCore,
    ResourceUsage, RewardCalculator, RewardConfig, TaskExperience, TaskResult, TaskState,
    TracingLogger,
};

fn any_f64() -> impl Strategy<Value = f64> {
    prop_oneof![
        -1e6f64..1e6,
        Just(f64::NAN),
        Just(f64::INFINITY),
        Just(f64::NEG_INFINITY),
        -2.0f64..2.0,
    ]
}

fn task_result() -> impl Strategy<Value = TaskResult> {
    (
        any::<bool>(),
        proptest::option::of(any_f64()),
        proptest::option::of(any_f64()),
        proptest::option::of(any_f64()),
        proptest::option::of(any_f64()),
        proptest::option::of(any_f64()),
        0usize..50,
        any::<bool>(),
    )
        .prop_map(
            |(success, time, coverage, quality, cpu, memory, errors, timed_out)| TaskResult {
                success,
                execution_time_ms: time,
                coverage,
                quality,
                resource_usage: ResourceUsage { cpu, memory },
                errors: vec!["error".to_string(); errors],
                timed_out,
            },
        )
}

fn feedback() -> impl Strategy<Value = Option<LearningFeedback>> {
    let rated = (any_f64(), 0usize..30, 0usize..30).prop_map(|(rating, issues, suggestions)| {
        LearningFeedback::rating(FeedbackSource::User, rating)
            .with_issues(vec!["issue".to_string(); issues])
            .with_suggestions(vec!["suggestion".to_string(); suggestions])
    });
    proptest::option::of(rated)
}

fn greedy_config() -> QLearningConfig {
    QLearningConfig {
        exploration_rate: 0.0,
        min_exploration_rate: 0.0,
        seed: Some(3),
        ..QLearningConfig::default()
    }
}

fn state_for(index: u8) -> TaskState {
    TaskState::new(f64::from(index) / 4.0, 1.0 - f64::from(index) / 8.0)
}

fn action_set() -> Vec<AgentAction> {
    vec![
        AgentAction::new("smoke"),
        AgentAction::new("regression").with_parallelization(0.4),
        AgentAction::new("exhaustive").with_retry_policy("linear"),
    ]
}

proptest! {
    #[test]
    fn reward_is_always_bounded(result in task_result(), feedback in feedback()) {
        let calc = RewardCalculator::new(RewardConfig::default());
        let reward = calc.calculate_reward(&result, feedback.as_ref());
        prop_assert!(reward.is_finite());
        prop_assert!((-2.0..=2.0).contains(&reward));
    }

    #[test]
    fn encoded_states_have_five_one_decimal_features(
        complexity in any_f64(),
        resources in any_f64(),
        attempts in 0u32..100,
        time in proptest::option::of(0u64..1_000_000),
    ) {
        let mut state = TaskState::new(complexity, resources).with_previous_attempts(attempts);
        state.time_constraint = time;
        let encoded = encode_state(&state);
        let parts: Vec<&str> = encoded.split(',').collect();
        prop_assert_eq!(parts.len(), 5);
        for part in parts {
            let (whole, decimals) = part.split_once('.').unwrap();
            prop_assert_eq!(decimals.len(), 1);
            prop_assert!(whole == "0" || whole == "1");
        }
    }

    #[test]
    fn imported_table_makes_identical_greedy_choices(
        updates in proptest::collection::vec((0u8..5, 0usize..3, -2.0f64..2.0), 1..60)
    ) {
        let actions = action_set();
        let mut original = QLearningCore::new(greedy_config(), TracingLogger::shared());
        for (i, (state, action, reward)) in updates.iter().enumerate() {
            let experience = TaskExperience::new(
                format!("task-{i}"),
                "regression",
                state_for(*state),
                actions[*action].clone(),
                *reward,
                state_for((*state + 1) % 5),
                "agent",
            );
            original.update(&experience);
        }
        let mut restored = QLearningCore::new(greedy_config(), TracingLogger::shared());
        restored.import(original.export()).unwrap();
        prop_assert_eq!(restored.export(), original.export());
        for index in 0..5 {
            let state = state_for(index);
            let expected = original.best_action(&state, &actions).cloned();
            prop_assert_eq!(restored.best_action(&state, &actions).cloned(), expected.clone());
            if let Some(expected) = expected {
                let chosen = restored.select_action(&state, &actions).unwrap();
                prop_assert_eq!(chosen, expected.clone());
                prop_assert_eq!(original.select_action(&state, &actions).unwrap(), expected);
            }
        }
    }
}

#[test]
fn exported_table_survives_json() {
    let actions = action_set();
    let mut original = QLearningCore::new(greedy_config(), TracingLogger::shared());
    let state = state_for(2);
    for (action, reward) in actions.iter().zip([0.5, 1.5, -1.0]) {
        original.update(&TaskExperience::new(
            "task",
            "regression",
            state.clone(),
            action.clone(),
            reward,
            state_for(3),
            "agent",
        ));
    }
    let json = serde_json::to_string(&original.export()).unwrap();
    let mut restored = QLearningCore::new(greedy_config(), TracingLogger::shared());
    restored.import(serde_json::from_str(&json).unwrap()).unwrap();
    assert_eq!(
        restored.select_action(&state, &actions).unwrap().strategy,
        "regression"
    );
    assert_eq!(restored.statistics().table_size, 3);
    assert_eq!(restored.step_count(), 3);
}

#[test]
fn prioritized_sampling_favours_high_priority() {
    use steer::{ExperienceReplayBuffer, ReplayBufferConfig, SamplingMode};

    let config = ReplayBufferConfig {
        max_size: 10,
        min_size: 1,
        sampling_mode: SamplingMode::Prioritized,
        seed: Some(42),
    };
    let mut buffer = ExperienceReplayBuffer::new(config, TracingLogger::shared());
    let state = TaskState::default();
    let action = AgentAction::new("smoke");
    buffer.add(
        TaskExperience::new("low", "t", state.clone(), action.clone(), 0.0, state.clone(), "a"),
        Some(1.0),
    );
    buffer.add(
        TaskExperience::new("high", "t", state.clone(), action, 0.0, state, "a"),
        Some(99.0),
    );
    let high = (0..10_000)
        .filter(|_| buffer.sample(1).unwrap()[0].task_id == "high")
        .count();
    assert!(high >= 9_500, "high priority drawn {high} times");
}
