use crate::constants::{
    ADJACENT_ITEM_BONUS, BLOCK_DESTROY_VALUE, DANGER_PENALTY, DISTANCE_STEP_PENALTY,
    OUTLIER_BINS, OUTLIER_MIN_SHARE,
};
use crate::grid::{Grid, Layer};
use crate::profile::AgentProfile;
use crate::search::Reachability;
use crate::types::{AgentView, Direction, Tile, TileCode};

#[derive(Clone, Copy)]
pub struct ScoringContext<'a> {
    pub raw: &'a Grid,
    pub reachable: &'a Reachability,
    pub agents: &'a [AgentView],
    pub agent_tile: Tile,
    pub fire_range: i32,
    pub profile: &'a AgentProfile,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Placement {
    pub values: Layer<i32>,
    pub best_target: Option<Tile>,
}

pub fn blast_tiles(raw: &Grid, origin: Tile, fire_range: i32) -> Vec<Tile> {
    let mut tiles = Vec::new();
    for dir in Direction::CARDINAL {
        let mut tile = origin;
        for _ in 0..fire_range.max(0) {
            tile = tile.offset(dir);
            match raw.code(tile) {
                TileCode::Wall | TileCode::Impassable => break,
                TileCode::Block => {
                    tiles.push(tile);
                    break;
                }
                _ => tiles.push(tile),
            }
        }
    }
    tiles
}

pub fn score(ctx: &ScoringContext<'_>, tile: Tile) -> i32 {
    let blast = blast_tiles(ctx.raw, tile, ctx.fire_range);
    let consumed = |candidate: Tile| candidate == tile || blast.contains(&candidate);
    let mut total = 0;

    // Every agent in the blast is a target, the scoring agent included.
    for agent in ctx.agents.iter().filter(|agent| agent.alive) {
        if !consumed(agent.tile) {
            continue;
        }
        let mut bonus = ctx.profile.hunt_level;
        if ctx.profile.trap_seeking && tile != ctx.agent_tile && is_boxed_in(ctx, agent.tile, &consumed)
        {
            bonus *= 2;
        }
        total += bonus;
    }

    total += stand_value(ctx.raw.code(tile));
    total += blast
        .iter()
        .map(|blown| destroy_value(ctx.raw.code(*blown)))
        .sum::<i32>();

    let near_item = tile
        .neighbors()
        .into_iter()
        .any(|neighbor| stand_value(ctx.raw.code(neighbor)) > 0);
    if near_item {
        total += ADJACENT_ITEM_BONUS;
    }

    if ctx.raw.code(tile).is_hazard() {
        total -= DANGER_PENALTY;
    }

    total.max(0)
}

pub fn score_all(ctx: &ScoringContext<'_>) -> Placement {
    let mut values = Layer::filled(ctx.raw.width(), ctx.raw.height(), 0);
    for tile in ctx.reachable.tiles() {
        values.set(*tile, score(ctx, *tile));
    }

    apply_self_trap_guard(ctx, &mut values);
    clamp_outliers(&mut values);
    let best_target = select_best(ctx, &values);
    Placement {
        values,
        best_target,
    }
}

fn stand_value(code: TileCode) -> i32 {
    match code {
        TileCode::Item(kind) => kind.valuation().0,
        _ => 0,
    }
}

fn destroy_value(code: TileCode) -> i32 {
    match code {
        TileCode::Block => BLOCK_DESTROY_VALUE,
        TileCode::Item(kind) => kind.valuation().1,
        _ => 0,
    }
}

fn is_boxed_in(ctx: &ScoringContext<'_>, target: Tile, consumed: &impl Fn(Tile) -> bool) -> bool {
    target
        .neighbors()
        .into_iter()
        .filter(|exit| ctx.reachable.contains(*exit))
        .all(consumed)
}

fn apply_self_trap_guard(ctx: &ScoringContext<'_>, values: &mut Layer<i32>) {
    for tile in ctx.reachable.tiles() {
        if values.get(*tile).unwrap_or(0) <= 0 {
            continue;
        }
        let blast = blast_tiles(ctx.raw, *tile, ctx.fire_range);
        let escape_left = ctx
            .reachable
            .tiles()
            .iter()
            .any(|other| other != tile && !blast.contains(other));
        if !escape_left {
            values.set(*tile, 0);
        }
    }
}

fn clamp_outliers(values: &mut Layer<i32>) {
    let positives: Vec<i32> = values.cells().iter().copied().filter(|v| *v > 0).collect();
    let Some(max) = positives.iter().copied().max() else {
        return;
    };
    let bins = OUTLIER_BINS as i32;
    let width = ((max + bins - 1) / bins).max(1);
    let mut counts = [0usize; OUTLIER_BINS];
    for value in &positives {
        let bin = ((value - 1) / width).min(bins - 1) as usize;
        counts[bin] += 1;
    }

    let needed = positives.len() as f32 * OUTLIER_MIN_SHARE;
    let Some(bin) = (0..OUTLIER_BINS).rev().find(|bin| counts[*bin] as f32 >= needed) else {
        return;
    };
    let ceiling = (bin as i32 + 1) * width;
    for idx in 0..values.len() {
        let tile = values.tile_at(idx);
        if values.get(tile).unwrap_or(0) > ceiling {
            values.set(tile, ceiling);
        }
    }
}

fn discounted(value: i32, distance: u32, step: i32) -> f32 {
    let value = value as f32;
    if value <= 1.0 {
        return value;
    }
    let steps = distance / step.max(1) as u32;
    (value - DISTANCE_STEP_PENALTY * steps as f32).max(1.0)
}

fn select_best(ctx: &ScoringContext<'_>, values: &Layer<i32>) -> Option<Tile> {
    let mut best: Option<(Tile, f32, u32)> = None;
    for tile in values.tiles() {
        let value = values.get(tile).unwrap_or(0);
        if value <= 0 {
            continue;
        }
        let Some(distance) = ctx.reachable.cost(tile) else {
            continue;
        };
        let worth = discounted(value, distance, ctx.profile.distance_modifier);
        let better = match best {
            None => true,
            Some((_, best_worth, best_distance)) => {
                worth > best_worth + f32::EPSILON
                    || ((worth - best_worth).abs() <= f32::EPSILON && distance < best_distance)
            }
        };
        if better {
            best = Some((tile, worth, distance));
        }
    }
    best.map(|(tile, _, _)| tile)
}
