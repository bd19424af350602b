pub const TICK_RATE: u32 = 50;
pub const TICK_MS: u64 = 1000 / TICK_RATE as u64;

pub const TILE_PX: i32 = 32;

// Danger grid.
pub const EMERGENCY_WALKABLE_FROM_MS: i32 = 500;
pub const EMERGENCY_RUN_FOR_IT_MS: i32 = 600;
pub const FIRE_WALK_BASE_MS: f32 = 1_600.0;
pub const FIRE_WALK_MS_PER_SPEED: f32 = 100.0;

// Path search.
pub const FLOOD_COST_CEILING: u32 = 10_000;
pub const SEARCH_BUDGET_MS: u128 = 200;

// Placement scoring.
pub const BLOCK_DESTROY_VALUE: i32 = 3;
pub const ADJACENT_ITEM_BONUS: i32 = 2;
pub const DANGER_PENALTY: i32 = 5;
pub const OUTLIER_BINS: usize = 8;
pub const OUTLIER_MIN_SHARE: f32 = 0.10;
pub const DISTANCE_STEP_PENALTY: f32 = 0.6;

// Safety.
pub const KEEP_MOVING_MS: u64 = 2_000;
pub const MEANINGFUL_DELAY_MS: i32 = 50;
pub const KICK_LANDING_DISTANCE: i32 = 2;

// Controller and resolver.
pub const BOMB_COOLDOWN_MS: u64 = 250;
pub const PATH_CACHE_TTL_MS: u64 = 300;
pub const PATH_CACHE_CAPACITY: usize = 16;
pub const STUCK_AFTER_MS: u64 = 500;
pub const STUCK_PIXEL_THRESHOLD: i32 = 2;
pub const STUCK_RESUME_GAP_MS: u64 = 2 * TICK_MS;
pub const ALIGN_TOLERANCE_PX: i32 = 2;
pub const JITTER_SPEED_MULTIPLIER: f32 = 1.5;
pub const JITTER_OVERRIDE_MS: u64 = 200;

// Arena.
pub const BOMB_FUSE_MS: i32 = 2_500;
pub const FIRE_DURATION_MS: i32 = 500;
pub const BASE_MOVE_PX_PER_SEC: f32 = 96.0;
pub const SPEED_STEP_PX_PER_SEC: f32 = 16.0;
pub const KICKED_BOMB_TILES_PER_SEC: f32 = 8.0;

pub fn fire_walk_cutoff_ms(speed: i32, fire_walk_multiplier: f32) -> i32 {
    let base = FIRE_WALK_BASE_MS - speed as f32 * FIRE_WALK_MS_PER_SPEED;
    (base * fire_walk_multiplier).round() as i32
}

pub fn move_px_per_sec(speed: i32) -> f32 {
    BASE_MOVE_PX_PER_SEC + (speed - 1).max(0) as f32 * SPEED_STEP_PX_PER_SEC
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faster_agents_get_a_tighter_fire_walk_cutoff() {
        assert_eq!(fire_walk_cutoff_ms(1, 1.0), 1_500);
        assert_eq!(fire_walk_cutoff_ms(4, 1.0), 1_200);
        assert_eq!(fire_walk_cutoff_ms(4, 0.5), 600);
    }
}
