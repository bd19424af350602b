use std::sync::{Mutex, MutexGuard};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::constants::{
    move_px_per_sec, BOMB_FUSE_MS, FIRE_DURATION_MS, KICKED_BOMB_TILES_PER_SEC, TILE_PX,
};
use crate::error::{AiError, Result};
use crate::grid::Grid;
use crate::scoring::blast_tiles;
use crate::types::{AgentId, AgentIntent, AgentView, BombView, Direction, ItemKind, Tile, TileCode};
use crate::world::{World, WorldFrame};

const MAX_FIRE_POWER: i32 = 10;
const MAX_SPEED: i32 = 8;

const DROPPABLE_ITEMS: [ItemKind; 8] = [
    ItemKind::FireUp,
    ItemKind::FireUp,
    ItemKind::BombUp,
    ItemKind::BombUp,
    ItemKind::SpeedUp,
    ItemKind::Kick,
    ItemKind::MaxFire,
    ItemKind::Skull,
];

#[derive(Clone, Debug)]
pub struct ArenaOptions {
    pub width: i32,
    pub height: i32,
    pub block_density: f32,
    pub item_drop_chance: f32,
    pub time_limit_ms: u64,
    pub seed: u64,
}

impl Default for ArenaOptions {
    fn default() -> Self {
        Self {
            width: 15,
            height: 13,
            block_density: 0.6,
            item_drop_chance: 0.3,
            time_limit_ms: 180_000,
            seed: 1,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Death {
    pub agent: AgentId,
    #[serde(rename = "atMs")]
    pub at_ms: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ArenaSummary {
    #[serde(rename = "elapsedMs")]
    pub elapsed_ms: u64,
    pub winner: Option<AgentId>,
    pub survivors: Vec<AgentId>,
    pub deaths: Vec<Death>,
    #[serde(rename = "bombsPlaced")]
    pub bombs_placed: u32,
    #[serde(rename = "blocksDestroyed")]
    pub blocks_destroyed: u32,
    #[serde(rename = "blocksLeft")]
    pub blocks_left: usize,
}

#[derive(Clone, Debug)]
struct BombInternal {
    view: BombView,
    sliding: Option<Direction>,
    slide_buffer: f32,
}

#[derive(Clone, Debug)]
struct AgentInternal {
    view: AgentView,
    desired: Option<Direction>,
    speed_multiplier: f32,
    place_requested: bool,
    move_buffer: f32,
}

#[derive(Debug)]
struct ArenaState {
    tiles: Grid,
    bombs: Vec<BombInternal>,
    fire: Vec<(Tile, i32)>,
    agents: Vec<AgentInternal>,
    deaths: Vec<Death>,
    rng: StdRng,
    item_drop_chance: f32,
    time_limit_ms: u64,
    elapsed_ms: u64,
    bombs_placed: u32,
    blocks_destroyed: u32,
    ended: bool,
}

pub struct Arena {
    state: Mutex<ArenaState>,
}

impl Arena {
    pub fn generate(options: &ArenaOptions, agent_count: usize) -> Result<Self> {
        if options.width < 5 || options.height < 5 {
            return Err(AiError::InvalidArena(format!(
                "{}x{} is too small",
                options.width, options.height
            )));
        }
        let mut rng = StdRng::seed_from_u64(options.seed);
        let (width, height) = (options.width, options.height);
        let mut tiles = Grid::filled(width, height, TileCode::Empty.code());
        for tile in tiles.tiles().collect::<Vec<_>>() {
            let border = tile.x == 0 || tile.y == 0 || tile.x == width - 1 || tile.y == height - 1;
            let pillar = tile.x % 2 == 0 && tile.y % 2 == 0;
            if border || pillar {
                tiles.set_code(tile, TileCode::Wall);
            }
        }

        let corners = [
            Tile::new(1, 1),
            Tile::new(width - 2, height - 2),
            Tile::new(width - 2, 1),
            Tile::new(1, height - 2),
        ];
        let mut spawns: Vec<Tile> = corners.iter().copied().take(agent_count).collect();
        let clear: Vec<Tile> = corners
            .iter()
            .flat_map(|corner| {
                let toward_x = if corner.x == 1 { 1 } else { -1 };
                let toward_y = if corner.y == 1 { 1 } else { -1 };
                [
                    *corner,
                    Tile::new(corner.x + toward_x, corner.y),
                    Tile::new(corner.x, corner.y + toward_y),
                ]
            })
            .collect();

        for tile in tiles.tiles().collect::<Vec<_>>() {
            if tiles.code(tile) == TileCode::Empty
                && !clear.contains(&tile)
                && rng.random_bool(f64::from(options.block_density.clamp(0.0, 1.0)))
            {
                tiles.set_code(tile, TileCode::Block);
            }
        }

        while spawns.len() < agent_count {
            let open: Vec<Tile> = tiles
                .tiles()
                .filter(|tile| tiles.code(*tile) == TileCode::Empty && !spawns.contains(tile))
                .collect();
            if open.is_empty() {
                return Err(AiError::InvalidArena(format!(
                    "no room for {agent_count} agents"
                )));
            }
            spawns.push(open[rng.random_range(0..open.len())]);
        }

        Ok(Self::assemble(tiles, &spawns, rng, options))
    }

    pub fn from_ascii(rows: &[&str], spawns: &[Tile]) -> Result<Self> {
        let tiles = Grid::from_ascii(rows)
            .ok_or_else(|| AiError::InvalidArena("rows must be non-empty and equally long".to_string()))?;
        for tile in tiles.tiles() {
            match tiles.code(tile) {
                TileCode::Empty | TileCode::Wall | TileCode::Block | TileCode::Item(_) => {}
                other => {
                    return Err(AiError::InvalidArena(format!(
                        "unsupported tile {other:?} at ({}, {})",
                        tile.x, tile.y
                    )))
                }
            }
        }
        for spawn in spawns {
            if !tiles.contains(*spawn) {
                return Err(AiError::OutOfBounds {
                    tile: *spawn,
                    width: tiles.width(),
                    height: tiles.height(),
                });
            }
            if tiles.code(*spawn).is_solid() {
                return Err(AiError::InvalidArena(format!(
                    "spawn ({}, {}) is not floor",
                    spawn.x, spawn.y
                )));
            }
        }
        let options = ArenaOptions::default();
        let rng = StdRng::seed_from_u64(options.seed);
        Ok(Self::assemble(tiles, spawns, rng, &options))
    }

    fn assemble(tiles: Grid, spawns: &[Tile], rng: StdRng, options: &ArenaOptions) -> Self {
        let agents = spawns
            .iter()
            .enumerate()
            .map(|(idx, tile)| AgentInternal {
                view: AgentView {
                    id: idx as AgentId + 1,
                    tile: *tile,
                    pixel: center_of(*tile),
                    alive: true,
                    speed: 1,
                    fire_power: 2,
                    bomb_capacity: 1,
                    bombs_placed: 0,
                    can_kick: false,
                    facing: None,
                },
                desired: None,
                speed_multiplier: 1.0,
                place_requested: false,
                move_buffer: 0.0,
            })
            .collect();
        Self {
            state: Mutex::new(ArenaState {
                tiles,
                bombs: Vec::new(),
                fire: Vec::new(),
                agents,
                deaths: Vec::new(),
                rng,
                item_drop_chance: options.item_drop_chance,
                time_limit_ms: options.time_limit_ms,
                elapsed_ms: 0,
                bombs_placed: 0,
                blocks_destroyed: 0,
                ended: false,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ArenaState>> {
        self.state
            .lock()
            .map_err(|_| AiError::ReadRace("arena state lock poisoned".to_string()))
    }

    pub fn apply(&self, agent: AgentId, intent: AgentIntent) -> Result<()> {
        let mut state = self.lock()?;
        let internal = state
            .agents
            .iter_mut()
            .find(|internal| internal.view.id == agent)
            .ok_or(AiError::UnknownAgent(agent))?;
        internal.desired = intent.direction;
        internal.speed_multiplier = intent.speed_multiplier.max(0.0);
        internal.place_requested |= intent.place_bomb;
        Ok(())
    }

    pub fn step(&self, dt_ms: u64) -> Result<()> {
        self.lock()?.step(dt_ms);
        Ok(())
    }

    pub fn agent(&self, id: AgentId) -> Result<AgentView> {
        let state = self.lock()?;
        state
            .agents
            .iter()
            .find(|internal| internal.view.id == id)
            .map(|internal| internal.view.clone())
            .ok_or(AiError::UnknownAgent(id))
    }

    pub fn agents(&self) -> Result<Vec<AgentView>> {
        let state = self.lock()?;
        Ok(state.agents.iter().map(|internal| internal.view.clone()).collect())
    }

    pub fn is_over(&self) -> bool {
        self.lock().map(|state| state.ended).unwrap_or(true)
    }

    pub fn summary(&self) -> Result<ArenaSummary> {
        let state = self.lock()?;
        let survivors: Vec<AgentId> = state
            .agents
            .iter()
            .filter(|internal| internal.view.alive)
            .map(|internal| internal.view.id)
            .collect();
        let winner = match survivors.as_slice() {
            [only] if state.agents.len() > 1 => Some(*only),
            _ => None,
        };
        Ok(ArenaSummary {
            elapsed_ms: state.elapsed_ms,
            winner,
            survivors,
            deaths: state.deaths.clone(),
            bombs_placed: state.bombs_placed,
            blocks_destroyed: state.blocks_destroyed,
            blocks_left: state
                .tiles
                .cells()
                .iter()
                .filter(|code| TileCode::from_code(**code) == TileCode::Block)
                .count(),
        })
    }
}

impl World for Arena {
    fn frame(&self) -> Result<WorldFrame> {
        let state = self.lock()?;
        Ok(WorldFrame {
            codes: state.hazard_codes(),
            bombs: state.bombs.iter().map(|bomb| bomb.view.clone()).collect(),
            agents: state.agents.iter().map(|internal| internal.view.clone()).collect(),
            round_over: state.ended,
            now_ms: state.elapsed_ms,
        })
    }

    fn bomb_at(&self, tile: Tile) -> bool {
        self.lock()
            .map(|state| state.bomb_index(tile).is_some())
            .unwrap_or(false)
    }
}

impl ArenaState {
    fn step(&mut self, dt_ms: u64) {
        if self.ended {
            return;
        }
        self.elapsed_ms += dt_ms;

        for idx in 0..self.agents.len() {
            if !self.agents[idx].view.alive {
                continue;
            }
            self.place_requested_bomb(idx);
            self.move_agent(idx, dt_ms);
            self.pick_up_item(idx);
        }
        self.slide_bombs(dt_ms);
        self.tick_bombs(dt_ms as i32);
        self.burn_agents();

        let alive = self.agents.iter().filter(|internal| internal.view.alive).count();
        let last_standing = self.agents.len() > 1 && alive <= 1;
        if last_standing || alive == 0 || self.elapsed_ms >= self.time_limit_ms {
            self.ended = true;
            tracing::info!(elapsed_ms = self.elapsed_ms, alive, "round over");
        }
    }

    fn bomb_index(&self, tile: Tile) -> Option<usize> {
        self.bombs.iter().position(|bomb| bomb.view.tile == tile)
    }

    fn floor_at(&self, tile: Tile) -> bool {
        matches!(self.tiles.code(tile), TileCode::Empty | TileCode::Item(_))
    }

    fn place_requested_bomb(&mut self, idx: usize) {
        let agent = &mut self.agents[idx];
        if !std::mem::take(&mut agent.place_requested) || agent.view.bombs_available() == 0 {
            return;
        }
        let tile = agent.view.tile;
        if self.bombs.iter().any(|bomb| bomb.view.tile == tile) {
            return;
        }
        agent.view.bombs_placed += 1;
        let view = BombView {
            tile,
            owner: agent.view.id,
            remaining_ms: BOMB_FUSE_MS,
            fire_power: agent.view.fire_power,
        };
        self.bombs.push(BombInternal {
            view,
            sliding: None,
            slide_buffer: 0.0,
        });
        self.bombs_placed += 1;
    }

    fn move_agent(&mut self, idx: usize, dt_ms: u64) {
        let Some(dir) = self.agents[idx].desired else {
            return;
        };
        let agent = &mut self.agents[idx];
        let px_per_sec = move_px_per_sec(agent.view.speed) * agent.speed_multiplier;
        agent.move_buffer += px_per_sec * dt_ms as f32 / 1000.0;
        agent.view.facing = Some(dir);

        let (dx, dy) = dir.delta();
        while self.agents[idx].move_buffer >= 1.0 {
            self.agents[idx].move_buffer -= 1.0;
            if dx != 0 {
                self.step_axis(idx, Direction::from_delta(dx, 0));
            }
            if dy != 0 {
                self.step_axis(idx, Direction::from_delta(0, dy));
            }
        }
    }

    fn step_axis(&mut self, idx: usize, dir: Option<Direction>) {
        let Some(dir) = dir else {
            return;
        };
        let (dx, dy) = dir.delta();
        let (px, py) = self.agents[idx].view.pixel;
        let tile = tile_of((px, py));
        let (cx, cy) = center_of(tile);
        let along = if dx != 0 { (px - cx) * dx } else { (py - cy) * dy };

        if along < 0 {
            self.set_pixel(idx, (px + dx, py + dy));
            return;
        }

        let next = tile.offset(dir);
        let bomb_ahead = self.bomb_index(next);
        if !self.floor_at(next) || bomb_ahead.is_some() {
            if let Some(bomb) = bomb_ahead {
                if self.agents[idx].view.can_kick && self.bombs[bomb].sliding.is_none() {
                    self.bombs[bomb].sliding = Some(dir);
                    tracing::debug!(agent = self.agents[idx].view.id, ?dir, "bomb kicked");
                }
            }
            return;
        }

        // Corner assist: line up on the cross axis before leaving the tile.
        let across = if dx != 0 { py - cy } else { px - cx };
        if across != 0 {
            let nudge = -across.signum();
            let pixel = if dx != 0 { (px, py + nudge) } else { (px + nudge, py) };
            self.set_pixel(idx, pixel);
            return;
        }
        self.set_pixel(idx, (px + dx, py + dy));
    }

    fn set_pixel(&mut self, idx: usize, pixel: (i32, i32)) {
        let view = &mut self.agents[idx].view;
        view.pixel = pixel;
        view.tile = tile_of(pixel);
    }

    fn pick_up_item(&mut self, idx: usize) {
        let tile = self.agents[idx].view.tile;
        let TileCode::Item(kind) = self.tiles.code(tile) else {
            return;
        };
        self.tiles.set_code(tile, TileCode::Empty);
        let view = &mut self.agents[idx].view;
        match kind {
            ItemKind::FireUp => view.fire_power = (view.fire_power + 1).min(MAX_FIRE_POWER),
            ItemKind::FireDown => view.fire_power = (view.fire_power - 1).max(1),
            ItemKind::MaxFire => view.fire_power = MAX_FIRE_POWER,
            ItemKind::BombUp => view.bomb_capacity += 1,
            ItemKind::BombDown => view.bomb_capacity = (view.bomb_capacity - 1).max(1),
            ItemKind::SpeedUp => view.speed = (view.speed + 1).min(MAX_SPEED),
            ItemKind::Sandals => view.speed = (view.speed - 1).max(1),
            ItemKind::Kick => view.can_kick = true,
            _ => {}
        }
        tracing::debug!(agent = view.id, ?kind, "item picked up");
    }

    fn slide_bombs(&mut self, dt_ms: u64) {
        for idx in 0..self.bombs.len() {
            let Some(dir) = self.bombs[idx].sliding else {
                continue;
            };
            self.bombs[idx].slide_buffer += KICKED_BOMB_TILES_PER_SEC * dt_ms as f32 / 1000.0;
            while self.bombs[idx].slide_buffer >= 1.0 {
                self.bombs[idx].slide_buffer -= 1.0;
                let next = self.bombs[idx].view.tile.offset(dir);
                let blocked = !self.floor_at(next)
                    || self.bomb_index(next).is_some()
                    || self
                        .agents
                        .iter()
                        .any(|internal| internal.view.alive && internal.view.tile == next);
                if blocked {
                    self.bombs[idx].sliding = None;
                    self.bombs[idx].slide_buffer = 0.0;
                    break;
                }
                self.bombs[idx].view.tile = next;
            }
        }
    }

    fn tick_bombs(&mut self, dt_ms: i32) {
        for fire in &mut self.fire {
            fire.1 -= dt_ms;
        }
        self.fire.retain(|(_, remaining)| *remaining > 0);

        let mut queue = Vec::new();
        for (idx, bomb) in self.bombs.iter_mut().enumerate() {
            bomb.view.remaining_ms -= dt_ms;
            if bomb.view.remaining_ms <= 0 {
                queue.push(idx);
            }
        }
        if queue.is_empty() {
            return;
        }

        let mut exploded = vec![false; self.bombs.len()];
        let mut burnt_blocks = Vec::new();
        while let Some(idx) = queue.pop() {
            if exploded[idx] {
                continue;
            }
            exploded[idx] = true;
            let bomb = &self.bombs[idx].view;
            let mut reach = blast_tiles(&self.tiles, bomb.tile, bomb.fire_power);
            reach.push(bomb.tile);
            for tile in reach {
                self.ignite(tile);
                match self.tiles.code(tile) {
                    TileCode::Block => burnt_blocks.push(tile),
                    TileCode::Item(_) => {
                        self.tiles.set_code(tile, TileCode::Empty);
                    }
                    _ => {}
                }
                for (other, laid) in self.bombs.iter().enumerate() {
                    if laid.view.tile == tile && !exploded[other] {
                        queue.push(other);
                    }
                }
            }
        }

        let mut idx = 0;
        self.bombs.retain(|_| {
            let keep = !exploded[idx];
            idx += 1;
            keep
        });
        self.release_bomb_slots();

        for tile in burnt_blocks {
            if self.tiles.code(tile) != TileCode::Block {
                continue;
            }
            self.blocks_destroyed += 1;
            let drop = self.rng.random_bool(f64::from(self.item_drop_chance.clamp(0.0, 1.0)));
            let code = if drop {
                TileCode::Item(DROPPABLE_ITEMS[self.rng.random_range(0..DROPPABLE_ITEMS.len())])
            } else {
                TileCode::Empty
            };
            self.tiles.set_code(tile, code);
        }
    }

    fn release_bomb_slots(&mut self) {
        for internal in &mut self.agents {
            let id = internal.view.id;
            internal.view.bombs_placed =
                self.bombs.iter().filter(|bomb| bomb.view.owner == id).count() as i32;
        }
    }

    fn ignite(&mut self, tile: Tile) {
        match self.fire.iter_mut().find(|(burning, _)| *burning == tile) {
            Some(fire) => fire.1 = FIRE_DURATION_MS,
            None => self.fire.push((tile, FIRE_DURATION_MS)),
        }
    }

    fn burn_agents(&mut self) {
        for internal in &mut self.agents {
            if internal.view.alive && self.fire.iter().any(|(tile, _)| *tile == internal.view.tile) {
                internal.view.alive = false;
                internal.desired = None;
                self.deaths.push(Death {
                    agent: internal.view.id,
                    at_ms: self.elapsed_ms,
                });
                tracing::info!(agent = internal.view.id, at_ms = self.elapsed_ms, "agent caught in blast");
            }
        }
    }

    fn effective_timers(&self) -> Vec<i32> {
        let blasts: Vec<Vec<Tile>> = self
            .bombs
            .iter()
            .map(|bomb| blast_tiles(&self.tiles, bomb.view.tile, bomb.view.fire_power))
            .collect();
        let mut timers: Vec<i32> = self.bombs.iter().map(|bomb| bomb.view.remaining_ms).collect();
        loop {
            let mut changed = false;
            for (source, blast) in blasts.iter().enumerate() {
                for (target, bomb) in self.bombs.iter().enumerate() {
                    if timers[source] < timers[target] && blast.contains(&bomb.view.tile) {
                        timers[target] = timers[source];
                        changed = true;
                    }
                }
            }
            if !changed {
                return timers;
            }
        }
    }

    fn hazard_codes(&self) -> Grid {
        let mut codes = self.tiles.clone();
        for (bomb, timer) in self.bombs.iter().zip(self.effective_timers()) {
            let ms = timer.max(0);
            let mut reach = blast_tiles(&self.tiles, bomb.view.tile, bomb.view.fire_power);
            reach.push(bomb.view.tile);
            for tile in reach {
                match codes.code(tile) {
                    TileCode::Wall | TileCode::Block => {}
                    TileCode::Hazard(existing) if existing <= ms => {}
                    _ => {
                        codes.set_code(tile, TileCode::Hazard(ms));
                    }
                }
            }
        }
        for (tile, _) in &self.fire {
            codes.set_code(*tile, TileCode::Hazard(0));
        }
        for internal in self.agents.iter().filter(|internal| internal.view.alive) {
            if codes.code(internal.view.tile) == TileCode::Empty {
                codes.set_code(internal.view.tile, TileCode::Occupied);
            }
        }
        codes
    }
}

fn center_of(tile: Tile) -> (i32, i32) {
    (tile.x * TILE_PX + TILE_PX / 2, tile.y * TILE_PX + TILE_PX / 2)
}

fn tile_of(pixel: (i32, i32)) -> Tile {
    Tile::new(pixel.0.div_euclid(TILE_PX), pixel.1.div_euclid(TILE_PX))
}
