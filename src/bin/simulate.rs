use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bomber_ai::arena::{Arena, ArenaOptions};
use bomber_ai::constants::TICK_MS;
use bomber_ai::profile::profile_for;
use bomber_ai::types::{AgentId, Difficulty};
use bomber_ai::{AgentBrain, Result, World};
use clap::Parser;
use serde::Serialize;
use tokio::runtime::Handle;
use tracing::{error, info, warn};
use tracing_subscriber::filter::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Runs AI-only bomber matches on generated arenas")]
struct Cli {
    #[arg(long)]
    agents: Option<usize>,
    #[arg(long)]
    matches: Option<u32>,
    /// Round time limit in game seconds.
    #[arg(long)]
    seconds: Option<u64>,
    #[arg(long)]
    difficulty: Option<String>,
    #[arg(long)]
    seed: Option<u64>,
    /// Game time per wall-clock time. Reaction latencies stay in wall-clock time.
    #[arg(long)]
    speedup: Option<f32>,
    #[arg(long)]
    match_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct RunConfig {
    agents: usize,
    matches: u32,
    seconds: u64,
    difficulty: Difficulty,
    seed: u64,
    speedup: f32,
}

#[derive(Clone, Debug, Serialize)]
struct MatchResultLine {
    #[serde(rename = "matchIndex")]
    match_index: u32,
    seed: u64,
    agents: usize,
    difficulty: Difficulty,
    #[serde(rename = "durationMs")]
    duration_ms: u64,
    winner: Option<AgentId>,
    survivors: Vec<AgentId>,
    deaths: usize,
    #[serde(rename = "bombsPlaced")]
    bombs_placed: u32,
    #[serde(rename = "blocksDestroyed")]
    blocks_destroyed: u32,
    #[serde(rename = "blocksLeft")]
    blocks_left: usize,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(rename = "startedAtMs")]
    started_at_ms: u64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: u64,
    config: RunConfig,
    #[serde(rename = "averageDurationMs")]
    average_duration_ms: u64,
    #[serde(rename = "winsByAgent")]
    wins_by_agent: BTreeMap<String, usize>,
    draws: usize,
    matches: Vec<MatchResultLine>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli);
    let started_at_ms = now_ms();
    let match_id = cli
        .match_id
        .clone()
        .unwrap_or_else(|| default_match_id(config.seed, started_at_ms));
    info!(%match_id, ?config, "simulation started");

    let mut results = Vec::new();
    let mut failed = false;
    for index in 0..config.matches {
        match run_match(&config, index).await {
            Ok(result) => {
                match serde_json::to_string(&result) {
                    Ok(line) => println!("{line}"),
                    Err(err) => warn!(%err, "result line did not serialize"),
                }
                info!(
                    %match_id,
                    index,
                    winner = ?result.winner,
                    duration_ms = result.duration_ms,
                    "match finished"
                );
                results.push(result);
            }
            Err(err) => {
                error!(%match_id, index, %err, "match aborted");
                failed = true;
            }
        }
    }

    let summary = build_run_summary(match_id.clone(), started_at_ms, now_ms(), config, results);
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(err) = write_summary(path, &summary) {
            error!(path = %path.display(), %err, "summary write failed");
            std::process::exit(2);
        }
    }
    info!(
        %match_id,
        average_duration_ms = summary.average_duration_ms,
        draws = summary.draws,
        "simulation finished"
    );

    if failed {
        std::process::exit(1);
    }
}

async fn run_match(config: &RunConfig, index: u32) -> Result<MatchResultLine> {
    let seed = config.seed.wrapping_add(u64::from(index));
    let options = ArenaOptions {
        seed,
        time_limit_ms: config.seconds * 1_000,
        ..ArenaOptions::default()
    };
    let arena = Arc::new(Arena::generate(&options, config.agents)?);
    let world: Arc<dyn World> = arena.clone();
    let profile = profile_for(config.difficulty);
    let runtime = Handle::current();
    let mut brains: Vec<AgentBrain> = arena
        .agents()?
        .iter()
        .map(|agent| AgentBrain::new(Arc::clone(&world), agent.id, profile.clone(), runtime.clone()))
        .collect();

    let period_us = ((TICK_MS * 1_000) as f32 / config.speedup).max(1.0) as u64;
    let mut interval = tokio::time::interval(Duration::from_micros(period_us));
    let mut now_ms = 0u64;
    while !arena.is_over() {
        interval.tick().await;
        for brain in &mut brains {
            let view = arena.agent(brain.agent())?;
            let intent = brain.tick(&view, now_ms);
            arena.apply(view.id, intent)?;
        }
        arena.step(TICK_MS)?;
        now_ms += TICK_MS;
    }
    drop(brains);

    let summary = arena.summary()?;
    Ok(MatchResultLine {
        match_index: index,
        seed,
        agents: config.agents,
        difficulty: config.difficulty,
        duration_ms: summary.elapsed_ms,
        winner: summary.winner,
        survivors: summary.survivors,
        deaths: summary.deaths.len(),
        bombs_placed: summary.bombs_placed,
        blocks_destroyed: summary.blocks_destroyed,
        blocks_left: summary.blocks_left,
    })
}

fn resolve_config(cli: &Cli) -> RunConfig {
    let difficulty = cli
        .difficulty
        .as_deref()
        .and_then(Difficulty::parse)
        .unwrap_or(Difficulty::Normal);
    RunConfig {
        agents: cli.agents.unwrap_or(4).clamp(1, 16),
        matches: cli.matches.unwrap_or(1).clamp(1, 1_000),
        seconds: cli.seconds.unwrap_or(120).clamp(5, 600),
        difficulty,
        seed: cli.seed.unwrap_or_else(now_ms),
        speedup: cli.speedup.unwrap_or(4.0).clamp(0.1, 100.0),
    }
}

fn default_match_id(seed: u64, timestamp_ms: u64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    match_id: String,
    started_at_ms: u64,
    finished_at_ms: u64,
    config: RunConfig,
    matches: Vec<MatchResultLine>,
) -> RunSummary {
    let average_duration_ms = if matches.is_empty() {
        0
    } else {
        matches.iter().map(|line| line.duration_ms).sum::<u64>() / matches.len() as u64
    };
    let mut wins_by_agent: BTreeMap<String, usize> = BTreeMap::new();
    let mut draws = 0;
    for line in &matches {
        match line.winner {
            Some(winner) => *wins_by_agent.entry(winner.to_string()).or_insert(0) += 1,
            None => draws += 1,
        }
    }
    RunSummary {
        match_id,
        started_at_ms,
        finished_at_ms,
        config,
        average_duration_ms,
        wins_by_agent,
        draws,
        matches,
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let text = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
    std::fs::write(path, text)
}
