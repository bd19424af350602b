use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::controller::{DecisionController, Directive};
use crate::profile::AgentProfile;
use crate::resolver::{DirectionResolver, PathCacheOptions, ResolveInput};
use crate::types::{AgentId, AgentIntent, AgentView};
use crate::worker::{self, Snapshot, SnapshotReceiver};
use crate::world::World;

pub struct AgentBrain {
    agent: AgentId,
    profile: AgentProfile,
    world: Arc<dyn World>,
    runtime: Handle,
    worker: Option<JoinHandle<()>>,
    snapshots: Option<SnapshotReceiver>,
    spawned_at_ms: Option<u64>,
    controller: DecisionController,
    resolver: DirectionResolver,
    enabled: bool,
    last_directive: Directive,
}

impl AgentBrain {
    pub fn new(world: Arc<dyn World>, agent: AgentId, profile: AgentProfile, runtime: Handle) -> Self {
        Self {
            agent,
            profile,
            world,
            runtime,
            worker: None,
            snapshots: None,
            spawned_at_ms: None,
            controller: DecisionController::new(),
            resolver: DirectionResolver::new(PathCacheOptions::default(), u64::from(agent)),
            enabled: true,
            last_directive: Directive::Thinking,
        }
    }

    pub fn agent(&self) -> AgentId {
        self.agent
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn last_directive(&self) -> Directive {
        self.last_directive
    }

    pub fn latest_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshots
            .as_ref()
            .and_then(|snapshots| snapshots.borrow().clone())
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        if !enabled {
            self.stop_worker();
        }
        debug!(agent = self.agent, enabled, "brain toggled");
    }

    pub fn reset(&mut self) {
        self.stop_worker();
        self.controller.reset();
        self.resolver.reset();
        self.spawned_at_ms = None;
        self.last_directive = Directive::Thinking;
    }

    pub fn tick(&mut self, view: &AgentView, now_ms: u64) -> AgentIntent {
        let idle = AgentIntent::idle(self.profile.speed_multiplier);
        if !self.enabled || !view.alive {
            self.last_directive = Directive::Hold;
            return idle;
        }
        self.ensure_worker(now_ms);

        let snapshot = self.latest_snapshot();
        let world = Arc::clone(&self.world);
        let directive = self.controller.decide(
            snapshot.as_deref(),
            view,
            &self.profile,
            |tile| world.bomb_at(tile),
            now_ms,
        );
        self.last_directive = directive;

        let speed_multiplier = self.profile.speed_multiplier * self.resolver.speed_factor(now_ms);
        let direction = match (directive, snapshot.as_deref()) {
            (Directive::MoveTo(goal), Some(snapshot)) => self.resolver.resolve(&ResolveInput {
                grid: &snapshot.grid,
                current: view.tile,
                pixel: view.pixel,
                center: self.world.tile_center(view.tile),
                goal,
                now_ms,
            }),
            (Directive::Step(direction), _) => Some(direction),
            _ => None,
        };

        AgentIntent {
            direction,
            place_bomb: directive == Directive::PlaceBomb,
            speed_multiplier,
        }
    }

    fn ensure_worker(&mut self, now_ms: u64) {
        let running = self
            .worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished());
        if running {
            return;
        }
        let backing_off = self
            .spawned_at_ms
            .is_some_and(|at| now_ms.saturating_sub(at) < self.profile.reaction_ms);
        if backing_off {
            return;
        }
        if self.world.frame().is_ok_and(|frame| frame.round_over) {
            self.spawned_at_ms = Some(now_ms);
            debug!(agent = self.agent, now_ms, "round over, worker not restarted");
            return;
        }

        let (publish, snapshots) = worker::channel();
        let _guard = self.runtime.enter();
        self.worker = Some(worker::spawn(
            Arc::clone(&self.world),
            self.agent,
            self.profile.clone(),
            publish,
        ));
        self.snapshots = Some(snapshots);
        self.spawned_at_ms = Some(now_ms);
        info!(agent = self.agent, now_ms, "analysis worker launched");
    }

    fn stop_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        self.snapshots = None;
    }
}

impl Drop for AgentBrain {
    fn drop(&mut self) {
        self.stop_worker();
    }
}
