use crate::constants::{
    fire_walk_cutoff_ms, EMERGENCY_RUN_FOR_IT_MS, EMERGENCY_WALKABLE_FROM_MS,
};
use crate::grid::Grid;
use crate::types::{BombView, Tile, TileCode};

#[derive(Clone, Copy, Debug)]
pub struct DangerInput<'a> {
    pub raw: &'a Grid,
    pub bombs: &'a [BombView],
    pub agent_tile: Tile,
    pub speed: i32,
    pub fire_walk_multiplier: f32,
}

pub fn is_emergency(raw: &Grid, agent_tile: Tile) -> bool {
    raw.code(agent_tile).is_hazard()
}

pub fn build(input: &DangerInput<'_>) -> Grid {
    let mut grid = input.raw.clone();
    for bomb in input.bombs {
        if bomb.tile != input.agent_tile {
            grid.set_code(bomb.tile, TileCode::Bomb);
        }
    }

    match input.raw.code(input.agent_tile) {
        TileCode::Hazard(own_ms) => apply_emergency(&mut grid, input.agent_tile, own_ms),
        _ => apply_fire_walk(
            &mut grid,
            fire_walk_cutoff_ms(input.speed, input.fire_walk_multiplier),
        ),
    }
    grid
}

fn apply_fire_walk(grid: &mut Grid, cutoff_ms: i32) {
    for idx in 0..grid.len() {
        let tile = grid.tile_at(idx);
        if let TileCode::Hazard(ms) = grid.code(tile) {
            let code = if ms > cutoff_ms {
                TileCode::Empty
            } else {
                TileCode::Impassable
            };
            grid.set_code(tile, code);
        }
    }
}

fn apply_emergency(grid: &mut Grid, agent_tile: Tile, own_ms: i32) {
    for idx in 0..grid.len() {
        let tile = grid.tile_at(idx);
        let code = match grid.code(tile) {
            code if code.is_structural() => code,
            TileCode::Hazard(0) => TileCode::Impassable,
            TileCode::Hazard(ms) if ms >= EMERGENCY_WALKABLE_FROM_MS => TileCode::Empty,
            TileCode::Hazard(ms) if ms < own_ms => {
                if own_ms <= EMERGENCY_RUN_FOR_IT_MS {
                    TileCode::Empty
                } else {
                    TileCode::Impassable
                }
            }
            _ => TileCode::Empty,
        };
        grid.set_code(tile, code);
    }
    grid.set_code(agent_tile, TileCode::Empty);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BombView, IMPASSABLE_CODE};

    fn input<'a>(raw: &'a Grid, bombs: &'a [BombView], agent_tile: Tile) -> DangerInput<'a> {
        DangerInput {
            raw,
            bombs,
            agent_tile,
            speed: 1,
            fire_walk_multiplier: 1.0,
        }
    }

    #[test]
    fn safe_own_tile_is_copied_unchanged() {
        let raw = Grid::from_ascii(&["#####", "#.x.#", "#.f9#", "#####"]).expect("map");
        let agent = Tile::new(1, 1);
        let built = build(&input(&raw, &[], agent));
        assert_eq!(built.get(agent), raw.get(agent));
        assert_eq!(built.code(Tile::new(2, 1)), TileCode::Block);
        assert_eq!(
            built.code(Tile::new(2, 2)),
            raw.code(Tile::new(2, 2)),
            "items are not hazards"
        );
    }

    #[test]
    fn hazards_below_the_cutoff_become_impassable() {
        let mut raw = Grid::from_ascii(&["...."]).expect("map");
        raw.set_code(Tile::new(1, 0), TileCode::Hazard(1_400));
        raw.set_code(Tile::new(2, 0), TileCode::Hazard(1_900));
        let built = build(&input(&raw, &[], Tile::new(0, 0)));
        assert_eq!(built.get(Tile::new(1, 0)), Some(IMPASSABLE_CODE));
        assert_eq!(built.code(Tile::new(2, 0)), TileCode::Empty);
    }

    #[test]
    fn bolder_multiplier_walks_through_closer_hazards() {
        let mut raw = Grid::from_ascii(&["..."]).expect("map");
        raw.set_code(Tile::new(1, 0), TileCode::Hazard(1_000));
        let mut bold = input(&raw, &[], Tile::new(0, 0));
        bold.fire_walk_multiplier = 0.5;
        assert_eq!(build(&bold).code(Tile::new(1, 0)), TileCode::Empty);
        let timid = input(&raw, &[], Tile::new(0, 0));
        assert_eq!(build(&timid).code(Tile::new(1, 0)), TileCode::Impassable);
    }

    #[test]
    fn other_bombs_block_but_the_one_underfoot_does_not() {
        let raw = Grid::from_ascii(&["....."]).expect("map");
        let bombs = [
            BombView {
                tile: Tile::new(0, 0),
                owner: 1,
                remaining_ms: 2_400,
                fire_power: 1,
            },
            BombView {
                tile: Tile::new(3, 0),
                owner: 2,
                remaining_ms: 2_400,
                fire_power: 1,
            },
        ];
        let built = build(&input(&raw, &bombs, Tile::new(0, 0)));
        assert_eq!(built.code(Tile::new(0, 0)), TileCode::Empty);
        assert_eq!(built.code(Tile::new(3, 0)), TileCode::Bomb);
    }

    #[test]
    fn emergency_relaxes_walkability_around_the_agent() {
        let mut raw = Grid::from_ascii(&["#......#"]).expect("map");
        let agent = Tile::new(3, 0);
        raw.set_code(agent, TileCode::Hazard(800));
        raw.set_code(Tile::new(1, 0), TileCode::Hazard(0));
        raw.set_code(Tile::new(2, 0), TileCode::Hazard(300));
        raw.set_code(Tile::new(4, 0), TileCode::Hazard(1_200));
        raw.set_code(Tile::new(5, 0), TileCode::Hazard(450));
        let built = build(&input(&raw, &[], agent));

        assert!(is_emergency(&raw, agent));
        assert_eq!(built.code(agent), TileCode::Empty);
        assert_eq!(built.code(Tile::new(0, 0)), TileCode::Wall);
        assert_eq!(built.code(Tile::new(1, 0)), TileCode::Impassable);
        assert_eq!(
            built.code(Tile::new(2, 0)),
            TileCode::Impassable,
            "explodes sooner and the agent still has time to pick a better route"
        );
        assert_eq!(built.code(Tile::new(4, 0)), TileCode::Empty);
        assert_eq!(built.code(Tile::new(5, 0)), TileCode::Impassable);
    }

    #[test]
    fn emergency_runs_for_it_when_little_time_is_left() {
        let mut raw = Grid::from_ascii(&["..."]).expect("map");
        let agent = Tile::new(1, 0);
        raw.set_code(agent, TileCode::Hazard(500));
        raw.set_code(Tile::new(0, 0), TileCode::Hazard(200));
        let built = build(&input(&raw, &[], agent));
        assert_eq!(built.code(Tile::new(0, 0)), TileCode::Empty);
    }
}
