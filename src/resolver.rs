use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::constants::{
    ALIGN_TOLERANCE_PX, JITTER_OVERRIDE_MS, JITTER_SPEED_MULTIPLIER, PATH_CACHE_CAPACITY,
    PATH_CACHE_TTL_MS, STUCK_AFTER_MS, STUCK_PIXEL_THRESHOLD, STUCK_RESUME_GAP_MS,
};
use crate::grid::Grid;
use crate::search::{Search, Weights};
use crate::types::{Direction, Tile};

#[derive(Clone, Copy, Debug)]
pub struct PathCacheOptions {
    pub ttl_ms: u64,
    pub capacity: usize,
}

impl Default for PathCacheOptions {
    fn default() -> Self {
        Self {
            ttl_ms: PATH_CACHE_TTL_MS,
            capacity: PATH_CACHE_CAPACITY,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct CacheEntry {
    start: Tile,
    goal: Tile,
    direction: Direction,
    stored_at_ms: u64,
}

#[derive(Debug)]
pub struct PathCache {
    options: PathCacheOptions,
    entries: Vec<CacheEntry>,
}

impl PathCache {
    pub fn new(options: PathCacheOptions) -> Self {
        Self {
            options,
            entries: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&mut self, start: Tile, goal: Tile, now_ms: u64) -> Option<Direction> {
        self.prune(now_ms);
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.start == start && entry.goal == goal)
            .map(|entry| entry.direction)
    }

    pub fn store(&mut self, start: Tile, goal: Tile, direction: Direction, now_ms: u64) {
        self.prune(now_ms);
        self.entries
            .retain(|entry| entry.start != start || entry.goal != goal);
        while self.entries.len() >= self.options.capacity.max(1) {
            self.entries.remove(0);
        }
        self.entries.push(CacheEntry {
            start,
            goal,
            direction,
            stored_at_ms: now_ms,
        });
    }

    fn prune(&mut self, now_ms: u64) {
        let ttl_ms = self.options.ttl_ms;
        self.entries
            .retain(|entry| now_ms.saturating_sub(entry.stored_at_ms) < ttl_ms);
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ResolveInput<'a> {
    pub grid: &'a Grid,
    pub current: Tile,
    pub pixel: (i32, i32),
    pub center: (i32, i32),
    pub goal: Tile,
    pub now_ms: u64,
}

#[derive(Clone, Copy, Debug)]
struct StuckWatch {
    tile: Tile,
    goal: Tile,
    pixel: (i32, i32),
    since_ms: u64,
    seen_ms: u64,
}

pub struct DirectionResolver {
    cache: PathCache,
    weights: Weights,
    rng: StdRng,
    last_direction: Option<Direction>,
    watch: Option<StuckWatch>,
    override_until: Option<u64>,
}

impl DirectionResolver {
    pub fn new(options: PathCacheOptions, seed: u64) -> Self {
        Self {
            cache: PathCache::new(options),
            weights: Weights::walking(),
            rng: StdRng::seed_from_u64(seed),
            last_direction: None,
            watch: None,
            override_until: None,
        }
    }

    pub fn reset(&mut self) {
        self.cache.clear();
        self.last_direction = None;
        self.watch = None;
        self.override_until = None;
    }

    pub fn cached_steps(&self) -> usize {
        self.cache.len()
    }

    pub fn last_direction(&self) -> Option<Direction> {
        self.last_direction
    }

    pub fn speed_factor(&self, now_ms: u64) -> f32 {
        match self.override_until {
            Some(until) if now_ms < until => JITTER_SPEED_MULTIPLIER,
            _ => 1.0,
        }
    }

    pub fn resolve(&mut self, input: &ResolveInput<'_>) -> Option<Direction> {
        if input.current == input.goal {
            self.watch = None;
            let direction = align(input.pixel, input.center);
            self.last_direction = direction;
            return direction;
        }

        if let Some(direction) = self.unstick(input) {
            return Some(direction);
        }

        if let Some(direction) = self.cache.lookup(input.current, input.goal, input.now_ms) {
            self.last_direction = Some(direction);
            return Some(direction);
        }

        let search = Search::new(input.grid, &self.weights);
        let (path, _) = search.find_path(input.current, input.goal)?;
        let direction = input.current.step_toward(*path.first()?)?;
        self.cache
            .store(input.current, input.goal, direction, input.now_ms);
        self.last_direction = Some(direction);
        Some(direction)
    }

    fn unstick(&mut self, input: &ResolveInput<'_>) -> Option<Direction> {
        let fresh = StuckWatch {
            tile: input.current,
            goal: input.goal,
            pixel: input.pixel,
            since_ms: input.now_ms,
            seen_ms: input.now_ms,
        };
        let Some(watch) = self.watch else {
            self.watch = Some(fresh);
            return None;
        };

        // A gap in resolve calls means the agent was holding, not pushing.
        let resumed = input.now_ms.saturating_sub(watch.seen_ms) > STUCK_RESUME_GAP_MS;
        let moved = (input.pixel.0 - watch.pixel.0).abs() + (input.pixel.1 - watch.pixel.1).abs();
        if resumed
            || watch.tile != input.current
            || watch.goal != input.goal
            || moved >= STUCK_PIXEL_THRESHOLD
        {
            self.watch = Some(fresh);
            return None;
        }
        self.watch = Some(StuckWatch {
            seen_ms: input.now_ms,
            ..watch
        });
        if input.now_ms.saturating_sub(watch.since_ms) <= STUCK_AFTER_MS {
            return None;
        }

        let choices: Vec<Direction> = Direction::CARDINAL
            .into_iter()
            .filter(|dir| Some(*dir) != self.last_direction)
            .collect();
        let direction = choices[self.rng.random_range(0..choices.len())];
        tracing::debug!(
            x = input.current.x,
            y = input.current.y,
            ?direction,
            "stuck, jittering"
        );
        self.watch = Some(fresh);
        self.override_until = Some(input.now_ms + JITTER_OVERRIDE_MS);
        self.cache.clear();
        self.last_direction = Some(direction);
        Some(direction)
    }
}

fn align(pixel: (i32, i32), center: (i32, i32)) -> Option<Direction> {
    let snap = |delta: i32| {
        if delta.abs() <= ALIGN_TOLERANCE_PX {
            0
        } else {
            delta
        }
    };
    Direction::from_delta(snap(center.0 - pixel.0), snap(center.1 - pixel.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::TICK_MS;
    use crate::types::TileCode;

    fn input(grid: &Grid, current: Tile, pixel: (i32, i32), goal: Tile, now_ms: u64) -> ResolveInput<'_> {
        ResolveInput {
            grid,
            current,
            pixel,
            center: (current.x * 32 + 16, current.y * 32 + 16),
            goal,
            now_ms,
        }
    }

    fn resolver() -> DirectionResolver {
        DirectionResolver::new(PathCacheOptions::default(), 7)
    }

    #[test]
    fn cache_entries_expire_and_stay_bounded() {
        let mut cache = PathCache::new(PathCacheOptions {
            ttl_ms: 300,
            capacity: 2,
        });
        cache.store(Tile::new(0, 0), Tile::new(3, 0), Direction::Right, 0);
        assert_eq!(
            cache.lookup(Tile::new(0, 0), Tile::new(3, 0), 299),
            Some(Direction::Right)
        );
        assert_eq!(cache.lookup(Tile::new(0, 0), Tile::new(3, 0), 300), None);

        for x in 0..3 {
            cache.store(Tile::new(x, 0), Tile::new(9, 9), Direction::Down, 1_000);
        }
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup(Tile::new(0, 0), Tile::new(9, 9), 1_000), None);
    }

    #[test]
    fn centred_on_goal_means_no_movement() {
        let grid = Grid::from_ascii(&["..."]).expect("map");
        let mut resolver = resolver();
        let here = Tile::new(1, 0);
        assert_eq!(resolver.resolve(&input(&grid, here, (49, 17), here, 0)), None);
        assert_eq!(
            resolver.resolve(&input(&grid, here, (40, 16), here, 0)),
            Some(Direction::Right)
        );
        assert_eq!(
            resolver.resolve(&input(&grid, here, (56, 26), here, 0)),
            Some(Direction::UpLeft)
        );
    }

    #[test]
    fn first_step_is_cached_until_it_expires() {
        let mut grid = Grid::from_ascii(&[".....", ".....", "....."]).expect("map");
        let mut resolver = resolver();
        let start = Tile::new(0, 1);
        let goal = Tile::new(4, 1);
        let first = resolver.resolve(&input(&grid, start, (16, 48), goal, 0));
        assert_eq!(first, Some(Direction::Right));

        grid.set_code(Tile::new(1, 1), TileCode::Wall);
        let cached = resolver.resolve(&input(&grid, start, (17, 48), goal, 100));
        assert_eq!(cached, Some(Direction::Right));

        let fresh = resolver.resolve(&input(&grid, start, (18, 48), goal, 1_000));
        assert!(matches!(fresh, Some(Direction::Up) | Some(Direction::Down)));
    }

    #[test]
    fn no_path_resolves_to_none() {
        let grid = Grid::from_ascii(&[".#."]).expect("map");
        let mut resolver = resolver();
        let goal = Tile::new(2, 0);
        assert_eq!(
            resolver.resolve(&input(&grid, Tile::new(0, 0), (16, 16), goal, 0)),
            None
        );
    }

    #[test]
    fn stalled_agents_jitter_with_a_temporary_speed_boost() {
        let grid = Grid::from_ascii(&["....."]).expect("map");
        let mut resolver = resolver();
        let start = Tile::new(0, 0);
        let goal = Tile::new(4, 0);
        let first = resolver.resolve(&input(&grid, start, (16, 16), goal, 0));
        assert_eq!(first, Some(Direction::Right));
        assert_eq!(resolver.speed_factor(0), 1.0);

        let mut now_ms = 0;
        while now_ms < STUCK_AFTER_MS {
            now_ms += TICK_MS;
            let pushing = resolver.resolve(&input(&grid, start, (16, 16), goal, now_ms));
            assert_eq!(pushing, Some(Direction::Right));
        }

        let at = now_ms + TICK_MS;
        let jitter = resolver.resolve(&input(&grid, start, (16, 16), goal, at));
        assert!(jitter.is_some());
        assert_ne!(jitter, first);
        assert_eq!(resolver.speed_factor(at + 50), JITTER_SPEED_MULTIPLIER);
        assert_eq!(resolver.speed_factor(at + JITTER_OVERRIDE_MS), 1.0);
    }

    #[test]
    fn holding_still_does_not_count_as_being_stuck() {
        let grid = Grid::from_ascii(&["....."]).expect("map");
        let mut resolver = resolver();
        let start = Tile::new(0, 0);
        let goal = Tile::new(4, 0);
        assert_eq!(
            resolver.resolve(&input(&grid, start, (16, 16), goal, 0)),
            Some(Direction::Right)
        );

        let resumed = resolver.resolve(&input(&grid, start, (16, 16), goal, 1_000));
        assert_eq!(resumed, Some(Direction::Right));
        assert_eq!(resolver.speed_factor(1_000), 1.0);
    }
}
