use serde::Serialize;

use crate::constants::{KEEP_MOVING_MS, KICK_LANDING_DISTANCE, MEANINGFUL_DELAY_MS};
use crate::grid::Grid;
use crate::search::{Reachability, Search, Weights};
use crate::types::{BombView, Direction, Tile, TileCode};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyStatus {
    Safe,
    Retreating,
    Desperate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyTarget {
    Tile(Tile),
    Kick {
        stand: Tile,
        bomb: Tile,
        direction: Direction,
    },
    NoEscape,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SafetyVerdict {
    pub status: SafetyStatus,
    /// Always `None` when `Safe`.
    pub target: Option<SafetyTarget>,
}

impl SafetyVerdict {
    pub const SAFE: SafetyVerdict = SafetyVerdict {
        status: SafetyStatus::Safe,
        target: None,
    };

    pub fn is_safe(&self) -> bool {
        self.status == SafetyStatus::Safe
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SafetyInput<'a> {
    pub raw: &'a Grid,
    pub built: &'a Grid,
    pub reachable: &'a Reachability,
    pub bombs: &'a [BombView],
    pub agent_tile: Tile,
    pub facing: Option<Direction>,
    pub kick_escape: bool,
    pub now_ms: u64,
}

#[derive(Debug, Default)]
pub struct SafetyEvaluator {
    keep_moving_until: Option<u64>,
    retreat: Option<Tile>,
}

impl SafetyEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.keep_moving_until = None;
        self.retreat = None;
    }

    /// A hazard-free own tile is `Safe` unless a retreat started within the last
    /// `KEEP_MOVING_MS` is still under way; that retreat runs to completion.
    pub fn evaluate(&mut self, input: &SafetyInput<'_>) -> SafetyVerdict {
        let own = input.raw.code(input.agent_tile);
        let TileCode::Hazard(own_ms) = own else {
            return self.settle(input);
        };

        if let Some(tile) = nearest_retreat(input) {
            self.keep_moving_until = Some(input.now_ms + KEEP_MOVING_MS);
            self.retreat = Some(tile);
            return SafetyVerdict {
                status: SafetyStatus::Retreating,
                target: Some(SafetyTarget::Tile(tile)),
            };
        }
        self.reset();

        if let Some(tile) = best_of_bad(input, own_ms) {
            return desperate(SafetyTarget::Tile(tile));
        }
        if input.kick_escape {
            if let Some(kick) = kick_escape(input) {
                return desperate(kick);
            }
        }
        tracing::debug!(
            x = input.agent_tile.x,
            y = input.agent_tile.y,
            own_ms,
            "no escape from hazard"
        );
        desperate(SafetyTarget::NoEscape)
    }

    /// Own tile is clear: finish an earlier retreat while the timer runs.
    fn settle(&mut self, input: &SafetyInput<'_>) -> SafetyVerdict {
        let running = self
            .keep_moving_until
            .is_some_and(|until| input.now_ms < until);
        match self.retreat {
            Some(tile)
                if running && tile != input.agent_tile && input.reachable.contains(tile) =>
            {
                SafetyVerdict {
                    status: SafetyStatus::Retreating,
                    target: Some(SafetyTarget::Tile(tile)),
                }
            }
            _ => {
                self.reset();
                SafetyVerdict::SAFE
            }
        }
    }
}

fn desperate(target: SafetyTarget) -> SafetyVerdict {
    SafetyVerdict {
        status: SafetyStatus::Desperate,
        target: Some(target),
    }
}

fn scan<'a>(input: &SafetyInput<'a>) -> Box<dyn Iterator<Item = Tile> + 'a> {
    let forward = input.raw.tiles();
    if input.facing.is_some_and(Direction::leans_down_or_right) {
        Box::new(forward.rev())
    } else {
        Box::new(forward)
    }
}

fn nearest_retreat(input: &SafetyInput<'_>) -> Option<Tile> {
    let mut best: Option<(Tile, u32)> = None;
    for tile in scan(input) {
        if !matches!(input.raw.code(tile), TileCode::Empty | TileCode::Item(_)) {
            continue;
        }
        let Some(cost) = input.reachable.cost(tile) else {
            continue;
        };
        if best.map_or(true, |(_, best_cost)| cost < best_cost) {
            best = Some((tile, cost));
        }
    }
    best.map(|(tile, _)| tile)
}

fn escape_grid(raw: &Grid, bombs: &[BombView], agent_tile: Tile) -> Grid {
    let mut grid = raw.clone();
    for bomb in bombs.iter().filter(|bomb| bomb.tile != agent_tile) {
        grid.set_code(bomb.tile, TileCode::Bomb);
    }
    grid
}

fn best_of_bad(input: &SafetyInput<'_>, own_ms: i32) -> Option<Tile> {
    let grid = escape_grid(input.raw, input.bombs, input.agent_tile);
    let weights = Weights::escape();
    let timers: Vec<i32> = input.bombs.iter().map(|bomb| bomb.remaining_ms).collect();
    let search = Search::new(&grid, &weights).with_bomb_timers(&timers);

    let mut best: Option<(Tile, i32)> = None;
    for tile in scan(input) {
        if tile == input.agent_tile || !input.reachable.contains(tile) {
            continue;
        }
        let TileCode::Hazard(ms) = input.raw.code(tile) else {
            continue;
        };
        if ms <= own_ms + MEANINGFUL_DELAY_MS {
            continue;
        }
        if best.is_some_and(|(_, best_ms)| ms <= best_ms) {
            continue;
        }
        if search.find_path(input.agent_tile, tile).is_some() {
            best = Some((tile, ms));
        }
    }
    best.map(|(tile, _)| tile)
}

fn kick_escape(input: &SafetyInput<'_>) -> Option<SafetyTarget> {
    let walking = Weights::walking();
    for stand in input.reachable.tiles() {
        for direction in Direction::CARDINAL {
            let bomb = stand.offset(direction);
            if !input.bombs.iter().any(|laid| laid.tile == bomb) {
                continue;
            }
            let mut landing = bomb;
            for _ in 0..KICK_LANDING_DISTANCE {
                landing = landing.offset(direction);
            }
            let free = input.bombs.iter().all(|laid| laid.tile != landing);
            if free && walking.cost_of(input.built.code(landing)).is_some() {
                return Some(SafetyTarget::Kick {
                    stand: *stand,
                    bomb,
                    direction,
                });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::danger::{self, DangerInput};

    struct Fixture {
        raw: Grid,
        built: Grid,
        reachable: Reachability,
        bombs: Vec<BombView>,
        agent_tile: Tile,
    }

    impl Fixture {
        fn new(raw: Grid, bombs: Vec<BombView>, agent_tile: Tile) -> Self {
            let built = danger::build(&DangerInput {
                raw: &raw,
                bombs: &bombs,
                agent_tile,
                speed: 1,
                fire_walk_multiplier: 1.0,
            });
            let reachable = Search::new(&built, &Weights::walking()).flood(agent_tile);
            Self {
                raw,
                built,
                reachable,
                bombs,
                agent_tile,
            }
        }

        fn input(&self, facing: Option<Direction>, kick_escape: bool, now_ms: u64) -> SafetyInput<'_> {
            SafetyInput {
                raw: &self.raw,
                built: &self.built,
                reachable: &self.reachable,
                bombs: &self.bombs,
                agent_tile: self.agent_tile,
                facing,
                kick_escape,
                now_ms,
            }
        }
    }

    fn corridor(hazards: &[(i32, i32)], agent_x: i32) -> Fixture {
        let mut raw = Grid::from_ascii(&["#.....#"]).expect("map");
        for (x, ms) in hazards {
            raw.set_code(Tile::new(*x, 0), TileCode::Hazard(*ms));
        }
        Fixture::new(raw, Vec::new(), Tile::new(agent_x, 0))
    }

    #[test]
    fn hazard_free_tile_is_safe_without_target() {
        let fixture = corridor(&[(5, 300)], 1);
        let verdict = SafetyEvaluator::new().evaluate(&fixture.input(None, true, 0));
        assert_eq!(verdict, SafetyVerdict::SAFE);
    }

    #[test]
    fn hazard_free_tile_is_safe_once_no_retreat_is_running() {
        let danger = corridor(&[(2, 1_500), (3, 1_500), (4, 1_500)], 3);
        let calm = corridor(&[], 2);
        let mut evaluator = SafetyEvaluator::new();

        evaluator.evaluate(&danger.input(None, false, 0));
        assert_eq!(
            evaluator.evaluate(&calm.input(None, false, 100)).status,
            SafetyStatus::Retreating
        );

        evaluator.reset();
        assert_eq!(evaluator.evaluate(&calm.input(None, false, 100)), SafetyVerdict::SAFE);
    }

    #[test]
    fn standing_in_live_fire_is_never_safe() {
        let fixture = corridor(&[(2, 0), (3, 0), (4, 0)], 3);
        let verdict = SafetyEvaluator::new().evaluate(&fixture.input(None, false, 0));
        assert_eq!(verdict.status, SafetyStatus::Desperate);
        assert_eq!(verdict.target, Some(SafetyTarget::NoEscape));
    }

    #[test]
    fn retreat_tie_breaks_follow_the_facing_direction() {
        let fixture = corridor(&[(2, 1_500), (3, 1_500), (4, 1_500)], 3);
        let mut evaluator = SafetyEvaluator::new();
        let left = evaluator.evaluate(&fixture.input(Some(Direction::Up), false, 0));
        assert_eq!(left.status, SafetyStatus::Retreating);
        assert_eq!(left.target, Some(SafetyTarget::Tile(Tile::new(1, 0))));

        let right = evaluator.evaluate(&fixture.input(Some(Direction::Right), false, 0));
        assert_eq!(right.target, Some(SafetyTarget::Tile(Tile::new(5, 0))));
    }

    #[test]
    fn keeps_moving_until_the_timer_lapses() {
        let danger = corridor(&[(2, 1_500), (3, 1_500), (4, 1_500)], 3);
        let mut evaluator = SafetyEvaluator::new();
        evaluator.evaluate(&danger.input(None, false, 1_000));

        let calm = corridor(&[], 2);
        let still = evaluator.evaluate(&calm.input(None, false, 1_100));
        assert_eq!(still.status, SafetyStatus::Retreating);
        assert_eq!(still.target, Some(SafetyTarget::Tile(Tile::new(1, 0))));

        let done = evaluator.evaluate(&calm.input(None, false, 1_000 + KEEP_MOVING_MS));
        assert_eq!(done, SafetyVerdict::SAFE);
    }

    #[test]
    fn best_of_bad_prefers_the_latest_explosion() {
        let mut raw = Grid::from_ascii(&["#...#"]).expect("map");
        raw.set_code(Tile::new(1, 0), TileCode::Hazard(300));
        raw.set_code(Tile::new(2, 0), TileCode::Hazard(200));
        raw.set_code(Tile::new(3, 0), TileCode::Hazard(600));
        let fixture = Fixture::new(raw, Vec::new(), Tile::new(2, 0));
        let verdict = SafetyEvaluator::new().evaluate(&fixture.input(None, false, 0));
        assert_eq!(verdict.status, SafetyStatus::Desperate);
        assert_eq!(verdict.target, Some(SafetyTarget::Tile(Tile::new(3, 0))));
    }

    #[test]
    fn boxed_in_agent_kicks_the_bomb_away() {
        let mut raw = Grid::from_ascii(&["#....#"]).expect("map");
        for x in 1..=4 {
            raw.set_code(Tile::new(x, 0), TileCode::Hazard(1_500));
        }
        let bombs = vec![BombView {
            tile: Tile::new(2, 0),
            owner: 7,
            remaining_ms: 1_500,
            fire_power: 3,
        }];
        let fixture = Fixture::new(raw, bombs, Tile::new(1, 0));

        let verdict = SafetyEvaluator::new().evaluate(&fixture.input(None, true, 0));
        assert_eq!(verdict.status, SafetyStatus::Desperate);
        assert_eq!(
            verdict.target,
            Some(SafetyTarget::Kick {
                stand: Tile::new(1, 0),
                bomb: Tile::new(2, 0),
                direction: Direction::Right,
            })
        );

        let without = SafetyEvaluator::new().evaluate(&fixture.input(None, false, 0));
        assert_eq!(without.target, Some(SafetyTarget::NoEscape));
    }
}
