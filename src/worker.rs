use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::constants::SEARCH_BUDGET_MS;
use crate::danger::{self, DangerInput};
use crate::error::{AiError, Result};
use crate::grid::{Grid, Layer};
use crate::profile::AgentProfile;
use crate::safety::{SafetyEvaluator, SafetyInput, SafetyVerdict};
use crate::scoring::{self, ScoringContext};
use crate::search::{Search, Weights};
use crate::types::{AgentId, Tile};
use crate::world::{World, WorldFrame};

pub type SnapshotSender = watch::Sender<Option<Arc<Snapshot>>>;
pub type SnapshotReceiver = watch::Receiver<Option<Arc<Snapshot>>>;

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub cycle: u64,
    #[serde(rename = "builtAtMs")]
    pub built_at_ms: u64,
    #[serde(skip)]
    pub grid: Grid,
    #[serde(skip)]
    pub reachable: Layer<bool>,
    #[serde(skip)]
    pub explosion_value: Layer<i32>,
    #[serde(rename = "bestTarget")]
    pub best_target: Option<Tile>,
    pub safety: SafetyVerdict,
}

impl Snapshot {
    pub fn is_reachable(&self, tile: Tile) -> bool {
        self.reachable.get(tile).unwrap_or(false)
    }

    pub fn value_at(&self, tile: Tile) -> i32 {
        self.explosion_value.get(tile).unwrap_or(0)
    }
}

pub fn channel() -> (SnapshotSender, SnapshotReceiver) {
    watch::channel(None)
}

pub fn analyze(
    frame: &WorldFrame,
    agent: AgentId,
    profile: &AgentProfile,
    evaluator: &mut SafetyEvaluator,
    cycle: u64,
) -> Result<Snapshot> {
    let view = frame.agent(agent).ok_or(AiError::UnknownAgent(agent))?;
    if !frame.codes.contains(view.tile) {
        return Err(AiError::OutOfBounds {
            tile: view.tile,
            width: frame.width(),
            height: frame.height(),
        });
    }

    let built = danger::build(&DangerInput {
        raw: &frame.codes,
        bombs: &frame.bombs,
        agent_tile: view.tile,
        speed: view.speed,
        fire_walk_multiplier: profile.fire_walk_multiplier,
    });
    let weights = Weights::walking();
    let reachable = Search::new(&built, &weights).flood(view.tile);

    let placement = scoring::score_all(&ScoringContext {
        raw: &frame.codes,
        reachable: &reachable,
        agents: &frame.agents,
        agent_tile: view.tile,
        fire_range: view.fire_power,
        profile,
    });

    let safety = evaluator.evaluate(&SafetyInput {
        raw: &frame.codes,
        built: &built,
        reachable: &reachable,
        bombs: &frame.bombs,
        agent_tile: view.tile,
        facing: view.facing,
        kick_escape: profile.kick_escape && view.can_kick,
        now_ms: frame.now_ms,
    });

    Ok(Snapshot {
        cycle,
        built_at_ms: frame.now_ms,
        reachable: reachable.mask(),
        explosion_value: placement.values,
        best_target: placement.best_target,
        grid: built,
        safety,
    })
}

pub fn spawn(
    world: Arc<dyn World>,
    agent: AgentId,
    profile: AgentProfile,
    publish: SnapshotSender,
) -> JoinHandle<()> {
    tokio::spawn(run(world, agent, profile, publish))
}

async fn run(world: Arc<dyn World>, agent: AgentId, profile: AgentProfile, publish: SnapshotSender) {
    info!(agent, reaction_ms = profile.reaction_ms, "analysis worker started");
    let reaction = Duration::from_millis(profile.reaction_ms);
    let mut evaluator = SafetyEvaluator::new();
    let mut cycle = 0u64;

    let reason = loop {
        if publish.is_closed() {
            break "brain dropped";
        }
        match world.frame() {
            Ok(frame) => {
                if let Some(reason) = stop_reason(&frame, agent) {
                    break reason;
                }
                cycle += 1;
                let started = Instant::now();
                let job_profile = profile.clone();
                let job = tokio::task::spawn_blocking(move || {
                    let outcome = analyze(&frame, agent, &job_profile, &mut evaluator, cycle);
                    (evaluator, outcome)
                });
                let outcome = match job.await {
                    Ok((returned, outcome)) => {
                        evaluator = returned;
                        outcome
                    }
                    Err(err) => {
                        warn!(agent, cycle, %err, "analysis task failed");
                        break "analysis task failed";
                    }
                };
                match outcome {
                    Ok(snapshot) => {
                        debug!(
                            agent,
                            cycle,
                            status = ?snapshot.safety.status,
                            target = ?snapshot.best_target,
                            "snapshot published"
                        );
                        publish.send_replace(Some(Arc::new(snapshot)));
                    }
                    Err(err) => debug!(agent, cycle, %err, "analysis skipped"),
                }
                let elapsed_ms = started.elapsed().as_millis();
                if elapsed_ms > SEARCH_BUDGET_MS {
                    warn!(agent, cycle, elapsed_ms = elapsed_ms as u64, "analysis cycle ran long");
                }
            }
            Err(err) => debug!(agent, %err, "frame read failed; retrying next cycle"),
        }
        tokio::time::sleep(reaction).await;
    };

    info!(agent, cycle, reason, "analysis worker stopped");
}

fn stop_reason(frame: &WorldFrame, agent: AgentId) -> Option<&'static str> {
    if frame.round_over {
        return Some("round over");
    }
    match frame.agent(agent) {
        None => Some("agent left the world"),
        Some(view) if !view.alive => Some("agent dead"),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::types::{AgentView, TileCode};

    struct FixedWorld {
        frame: Mutex<WorldFrame>,
    }

    impl World for FixedWorld {
        fn frame(&self) -> Result<WorldFrame> {
            self.frame
                .lock()
                .map(|frame| frame.clone())
                .map_err(|_| AiError::ReadRace("poisoned".to_string()))
        }
    }

    struct FlakyWorld {
        frame: WorldFrame,
        failures_left: AtomicUsize,
        reads: AtomicUsize,
    }

    impl World for FlakyWorld {
        fn frame(&self) -> Result<WorldFrame> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if failing {
                return Err(AiError::ReadRace("bombs moved mid-read".to_string()));
            }
            Ok(self.frame.clone())
        }
    }

    fn view(tile: Tile) -> AgentView {
        AgentView {
            id: 1,
            tile,
            pixel: (tile.x * 32 + 16, tile.y * 32 + 16),
            alive: true,
            speed: 1,
            fire_power: 1,
            bomb_capacity: 1,
            bombs_placed: 0,
            can_kick: false,
            facing: None,
        }
    }

    fn frame(codes: Grid, agent: AgentView) -> WorldFrame {
        WorldFrame {
            codes,
            bombs: Vec::new(),
            agents: vec![agent],
            round_over: false,
            now_ms: 0,
        }
    }

    fn quick_profile() -> AgentProfile {
        AgentProfile {
            reaction_ms: 5,
            ..AgentProfile::default()
        }
    }

    #[test]
    fn open_arena_snapshot_targets_the_block() {
        let codes = Grid::from_ascii(&[".....", ".....", ".....", "..x..", "....."]).expect("map");
        let frame = frame(codes, view(Tile::new(2, 2)));
        let snapshot = analyze(&frame, 1, &AgentProfile::default(), &mut SafetyEvaluator::new(), 1)
            .expect("agent is known");
        assert!(snapshot.safety.is_safe());
        let target = snapshot.best_target.expect("block is worth a bomb");
        assert!(snapshot.is_reachable(target));
        assert!(snapshot.value_at(target) > 0);
        assert!(!snapshot.is_reachable(Tile::new(2, 3)));
    }

    #[test]
    fn fire_underfoot_is_never_safe_on_the_next_cycle() {
        let mut codes = Grid::from_ascii(&["#.....#"]).expect("map");
        codes.set_code(Tile::new(3, 0), TileCode::Hazard(0));
        let frame = frame(codes, view(Tile::new(3, 0)));
        let snapshot = analyze(&frame, 1, &AgentProfile::default(), &mut SafetyEvaluator::new(), 1)
            .expect("agent is known");
        assert!(!snapshot.safety.is_safe());
    }

    #[test]
    fn unknown_agents_are_reported() {
        let codes = Grid::from_ascii(&["..."]).expect("map");
        let frame = frame(codes, view(Tile::new(0, 0)));
        let err = analyze(&frame, 9, &AgentProfile::default(), &mut SafetyEvaluator::new(), 1)
            .expect_err("agent 9 does not exist");
        assert!(matches!(err, AiError::UnknownAgent(9)));
    }

    #[tokio::test]
    async fn worker_publishes_and_stops_when_the_round_ends() {
        let codes = Grid::from_ascii(&["#.....#"]).expect("map");
        let world = Arc::new(FixedWorld {
            frame: Mutex::new(frame(codes, view(Tile::new(1, 0)))),
        });
        let (tx, mut rx) = channel();
        let handle = spawn(world.clone(), 1, quick_profile(), tx);

        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .expect("snapshot within two seconds")
            .expect("worker still running");
        let cycle = rx.borrow().as_ref().map(|snapshot| snapshot.cycle);
        assert!(cycle.is_some_and(|cycle| cycle >= 1));

        world.frame.lock().expect("lock").round_over = true;
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker exits")
            .expect("worker did not panic");
    }

    #[tokio::test]
    async fn worker_stops_once_the_receiver_is_gone() {
        let codes = Grid::from_ascii(&["..."]).expect("map");
        let world = Arc::new(FixedWorld {
            frame: Mutex::new(frame(codes, view(Tile::new(0, 0)))),
        });
        let (tx, rx) = channel();
        let handle = spawn(world, 1, quick_profile(), tx);
        drop(rx);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker exits")
            .expect("worker did not panic");
    }

    #[tokio::test]
    async fn worker_retries_after_read_races() {
        let codes = Grid::from_ascii(&["#.....#"]).expect("map");
        let world = Arc::new(FlakyWorld {
            frame: frame(codes, view(Tile::new(1, 0))),
            failures_left: AtomicUsize::new(3),
            reads: AtomicUsize::new(0),
        });
        let (tx, mut rx) = channel();
        let handle = spawn(world.clone(), 1, quick_profile(), tx);

        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .expect("snapshot after the failed reads")
            .expect("worker still running");
        assert!(!handle.is_finished());
        assert!(world.reads.load(Ordering::SeqCst) >= 4);
        let cycle = rx.borrow().as_ref().map(|snapshot| snapshot.cycle);
        assert!(cycle.is_some_and(|cycle| cycle >= 1));
        handle.abort();
    }
}
