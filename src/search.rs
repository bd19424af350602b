use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Instant;

use crate::constants::{FLOOD_COST_CEILING, SEARCH_BUDGET_MS};
use crate::grid::{Grid, Layer};
use crate::types::{Tile, TileCode};

#[derive(Clone, Debug, PartialEq)]
pub struct Weights {
    pub empty: Option<u32>,
    pub occupied: Option<u32>,
    pub item: Option<u32>,
    pub block: Option<u32>,
    pub bomb: Option<u32>,
    pub hazard: Option<u32>,
    pub active_hazard: Option<u32>,
}

impl Weights {
    pub fn walking() -> Self {
        Self {
            empty: Some(1),
            occupied: Some(1),
            item: Some(1),
            block: None,
            bomb: None,
            hazard: Some(4),
            active_hazard: None,
        }
    }

    /// Movement over raw codes while running from a blast. Ticking hazards are
    /// passable, live fire is not.
    pub fn escape() -> Self {
        Self {
            hazard: Some(2),
            ..Self::walking()
        }
    }

    pub fn cost_of(&self, code: TileCode) -> Option<u32> {
        match code {
            TileCode::Empty => self.empty,
            TileCode::Occupied => self.occupied,
            TileCode::Item(_) => self.item,
            TileCode::Block => self.block,
            TileCode::Bomb => self.bomb,
            TileCode::Hazard(0) => self.active_hazard,
            TileCode::Hazard(_) => self.hazard,
            TileCode::Wall | TileCode::Impassable => None,
        }
    }

    fn cheapest(&self) -> u32 {
        [
            self.empty,
            self.occupied,
            self.item,
            self.block,
            self.bomb,
            self.hazard,
            self.active_hazard,
        ]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(1)
    }
}

impl Default for Weights {
    fn default() -> Self {
        Self::walking()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Reachability {
    costs: Layer<Option<u32>>,
    order: Vec<Tile>,
}

impl Reachability {
    pub fn contains(&self, tile: Tile) -> bool {
        self.cost(tile).is_some()
    }

    pub fn cost(&self, tile: Tile) -> Option<u32> {
        self.costs.get(tile).flatten()
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn mask(&self) -> Layer<bool> {
        self.costs.map(|cost| cost.is_some())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchOutcome {
    pub path: Vec<Tile>,
    pub reachable: Reachability,
    pub cost: Option<u32>,
}

pub struct Search<'a> {
    grid: &'a Grid,
    weights: &'a Weights,
    bomb_timers: &'a [i32],
}

impl<'a> Search<'a> {
    pub fn new(grid: &'a Grid, weights: &'a Weights) -> Self {
        Self {
            grid,
            weights,
            bomb_timers: &[],
        }
    }

    pub fn with_bomb_timers(mut self, bomb_timers: &'a [i32]) -> Self {
        self.bomb_timers = bomb_timers;
        self
    }

    pub fn search(&self, start: Tile, goal: Option<Tile>) -> SearchOutcome {
        let reachable = self.flood(start);
        let Some(goal) = goal else {
            return SearchOutcome {
                path: Vec::new(),
                reachable,
                cost: None,
            };
        };
        match self.find_path(start, goal) {
            Some((path, cost)) => SearchOutcome {
                path,
                reachable,
                cost: Some(cost),
            },
            None => SearchOutcome {
                path: Vec::new(),
                reachable,
                cost: None,
            },
        }
    }

    pub fn find_path(&self, start: Tile, goal: Tile) -> Option<(Vec<Tile>, u32)> {
        if !self.grid.contains(start) || !self.grid.contains(goal) {
            return None;
        }
        if start == goal {
            return Some((Vec::new(), 0));
        }

        let started = Instant::now();
        let unit = self.weights.cheapest();
        let heuristic = |tile: Tile| tile.manhattan(goal) as u32 * unit;
        let (width, height) = (self.grid.width(), self.grid.height());
        let mut g_score: Layer<u32> = Layer::filled(width, height, u32::MAX);
        let mut came_from: Layer<Option<Tile>> = Layer::filled(width, height, None);
        let mut open = BinaryHeap::new();

        g_score.set(start, 0);
        open.push(Reverse((heuristic(start), 0u32, start.y, start.x)));

        let mut found = None;
        while let Some(Reverse((_, g, y, x))) = open.pop() {
            let current = Tile::new(x, y);
            if g > g_score.get(current).unwrap_or(u32::MAX) {
                continue;
            }
            if current == goal {
                found = Some((reconstruct(&came_from, start, goal), g));
                break;
            }
            for next in current.neighbors() {
                let Some(step) = self.step_cost(next) else {
                    continue;
                };
                let tentative = g.saturating_add(step);
                if tentative > FLOOD_COST_CEILING {
                    continue;
                }
                if tentative < g_score.get(next).unwrap_or(u32::MAX) {
                    g_score.set(next, tentative);
                    came_from.set(next, Some(current));
                    open.push(Reverse((
                        tentative.saturating_add(heuristic(next)),
                        tentative,
                        next.y,
                        next.x,
                    )));
                }
            }
        }

        self.check_budget(started, "path");
        found
    }

    pub fn flood(&self, start: Tile) -> Reachability {
        let started = Instant::now();
        let (width, height) = (self.grid.width(), self.grid.height());
        let mut costs: Layer<Option<u32>> = Layer::filled(width, height, None);
        let mut best: Layer<u32> = Layer::filled(width, height, u32::MAX);
        let mut order = Vec::new();
        if !self.grid.contains(start) {
            return Reachability { costs, order };
        }

        let mut open = BinaryHeap::new();
        best.set(start, 0);
        open.push(Reverse((0u32, start.y, start.x)));

        while let Some(Reverse((g, y, x))) = open.pop() {
            let current = Tile::new(x, y);
            if costs.get(current).flatten().is_some() {
                continue;
            }
            costs.set(current, Some(g));
            order.push(current);
            for next in current.neighbors() {
                let Some(step) = self.step_cost(next) else {
                    continue;
                };
                let tentative = g.saturating_add(step);
                if tentative > FLOOD_COST_CEILING {
                    continue;
                }
                if tentative < best.get(next).unwrap_or(u32::MAX) {
                    best.set(next, tentative);
                    open.push(Reverse((tentative, next.y, next.x)));
                }
            }
        }

        self.check_budget(started, "flood");
        Reachability { costs, order }
    }

    fn step_cost(&self, tile: Tile) -> Option<u32> {
        let code = TileCode::from_code(self.grid.get(tile)?);
        let base = self.weights.cost_of(code)?;
        match code {
            TileCode::Hazard(ms) if ms > 0 => {
                let sooner = self
                    .bomb_timers
                    .iter()
                    .filter(|remaining| **remaining < ms)
                    .count() as u32;
                Some(base.saturating_mul(1 + sooner))
            }
            _ => Some(base),
        }
    }

    fn check_budget(&self, started: Instant, kind: &str) {
        let elapsed_ms = started.elapsed().as_millis();
        if elapsed_ms > SEARCH_BUDGET_MS {
            tracing::warn!(
                kind,
                elapsed_ms = elapsed_ms as u64,
                width = self.grid.width(),
                height = self.grid.height(),
                "search exceeded its time budget; check grid size and weights"
            );
        }
    }
}

fn reconstruct(came_from: &Layer<Option<Tile>>, start: Tile, goal: Tile) -> Vec<Tile> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(prev) = came_from.get(current).flatten() {
        if prev == start {
            break;
        }
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}
