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

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::Arc;
use steer::{
    format_explanation, AgentAction, EngineConfig, InMemoryStore, LearningEngine,
    PerformanceMetrics, SharedStore, TaskExecution, TaskResult, TaskState, TracingLogger,
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "learning-demo")]
#[command(about = "Simulated QE agent learning which test strategy fits which task")]
struct Cli {
    #[arg(long, default_value_t = 200)]
    episodes: u32,
    #[arg(long, default_value_t = 5)]
    tasks_per_episode: u32,
    #[arg(long)]
    seed: Option<u64>,
    /// TOML engine configuration; falls back to config/learning/engine.toml.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = false)]
    debug: bool,
    /// Print the final report as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("info,steer=warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn strategies() -> Vec<AgentAction> {
    vec![
        AgentAction::new("smoke")
            .with_tools(["jest"])
            .with_resource_allocation(0.2),
        AgentAction::new("risk-based")
            .with_tools(["jest", "coverage-analyzer"])
            .with_parallelization(0.5)
            .with_retry_policy("linear"),
        AgentAction::new("exhaustive")
            .with_tools(["jest", "stryker", "playwright"])
            .with_parallelization(1.0)
            .with_retry_policy("exponential")
            .with_resource_allocation(0.9),
    ]
}

/// Simple tasks reward cheap strategies; complex tasks need exhaustive ones.
fn simulate(rng: &mut StdRng, state: &TaskState, action: &AgentAction) -> TaskResult {
    let fit = match action.strategy.as_str() {
        "smoke" => 1.0 - state.task_complexity,
        "risk-based" => 1.0 - (state.task_complexity - 0.5).abs() * 2.0,
        _ => state.task_complexity,
    };
    let success = rng.gen::<f64>() < 0.2 + 0.75 * fit;
    let time_ms = 8_000.0 + 40_000.0 * action.resource_allocation * (0.5 + state.task_complexity);
    let coverage = (0.6 + 0.35 * fit + rng.gen_range(-0.05..0.05)).clamp(0.0, 1.0);
    let result = if success {
        TaskResult::succeeded(time_ms)
    } else {
        TaskResult::failed(time_ms, vec!["assertion failure".to_string()])
    };
    result
        .with_coverage(coverage)
        .with_resource_usage(action.resource_allocation, 0.3 + 0.4 * action.resource_allocation)
}

fn random_state(rng: &mut StdRng) -> TaskState {
    let capabilities: &[&str] = match rng.gen_range(0..3) {
        0 => &["unit"],
        1 => &["unit", "api"],
        _ => &["unit", "api", "ui", "security"],
    };
    TaskState::new(f64::from(rng.gen_range(0..=10u8)) / 10.0, rng.gen_range(0.3..1.0))
        .with_capabilities(capabilities.iter().copied())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.debug);

    let mut config = match &args.config {
        Some(path) => EngineConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::load_or_default(),
    }
    .with_env_overrides();
    if let Some(seed) = args.seed {
        config.q_learning.seed = Some(seed);
    }
    config.validate()?;

    let mut rng = config
        .q_learning
        .seed
        .map_or_else(StdRng::from_entropy, |s| StdRng::seed_from_u64(s.wrapping_add(99)));
    let store: SharedStore = Arc::new(InMemoryStore::new());
    let mut engine = LearningEngine::new(config, TracingLogger::shared(), Some(store))?;
    engine.initialize().await;
    info!(agent_id = engine.agent_id(), episodes = args.episodes, "Starting learning demo");

    let actions = strategies();
    for episode in 0..args.episodes {
        let mut successes = 0u32;
        let mut total_time = 0.0;
        for _ in 0..args.tasks_per_episode {
            let state = random_state(&mut rng);
            let recommendation = engine.recommend_strategy(&state, &actions)?;
            let result = simulate(&mut rng, &state, &recommendation.action);
            successes += u32::from(result.success);
            total_time += result.execution_time_ms.unwrap_or_default();
            let next_state = state.clone().with_previous_attempts(state.previous_attempts + 1);
            engine.learn_from_execution(TaskExecution::new(
                Uuid::new_v4().to_string(),
                "test-generation",
                state,
                recommendation.action,
                result,
                next_state,
            ));
        }
        engine.end_episode()?;
        if episode % 20 == 0 || episode + 1 == args.episodes {
            let n = f64::from(args.tasks_per_episode.max(1));
            let success_rate = f64::from(successes) / n;
            engine
                .record_performance(PerformanceMetrics {
                    tasks_completed: u64::from(args.tasks_per_episode),
                    success_rate,
                    average_execution_time_ms: total_time / n,
                    error_rate: 1.0 - success_rate,
                    user_satisfaction: success_rate,
                    resource_efficiency: 0.6,
                })
                .await;
        }
    }

    engine.save_state().await;
    engine.flush().await;

    for complexity in [0.1, 0.5, 0.9] {
        let state = TaskState::new(complexity, 0.7).with_capabilities(["unit", "api"]);
        let best = engine
            .core()
            .best_action(&state, &actions)
            .cloned()
            .unwrap_or_else(|| actions[0].clone());
        let explanation = engine.explain(&state, &best, &actions, false);
        println!("--- complexity {complexity:.1} ---");
        println!("{}", format_explanation(&explanation));
    }

    let report = engine.generate_report().await;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.summary);
        for recommendation in &report.recommendations {
            println!("  * {recommendation}");
        }
        let stats = engine.statistics().await;
        println!(
            "Q-table: {} entries over {} states, epsilon {:.3}, {} experiences replayable",
            stats.q_learning.table_size,
            stats.q_learning.state_count,
            stats.q_learning.exploration_rate,
            stats.replay_buffer.size
        );
    }
    Ok(())
}
