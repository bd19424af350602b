use serde::Serialize;

pub type AgentId = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Tile {
    pub x: i32,
    pub y: i32,
}

impl Tile {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dir: Direction) -> Self {
        let (dx, dy) = dir.delta();
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    pub fn manhattan(self, other: Tile) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn neighbors(self) -> [Tile; 4] {
        Direction::CARDINAL.map(|dir| self.offset(dir))
    }

    pub fn step_toward(self, next: Tile) -> Option<Direction> {
        Direction::from_delta(next.x - self.x, next.y - self.y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    UpLeft,
    UpRight,
    DownLeft,
    DownRight,
}

impl Direction {
    pub const CARDINAL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub const ALL: [Direction; 8] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
        Direction::UpLeft,
        Direction::UpRight,
        Direction::DownLeft,
        Direction::DownRight,
    ];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
            Self::UpLeft => (-1, -1),
            Self::UpRight => (1, -1),
            Self::DownLeft => (-1, 1),
            Self::DownRight => (1, 1),
        }
    }

    pub fn from_delta(dx: i32, dy: i32) -> Option<Self> {
        match (dx.signum(), dy.signum()) {
            (0, -1) => Some(Self::Up),
            (0, 1) => Some(Self::Down),
            (-1, 0) => Some(Self::Left),
            (1, 0) => Some(Self::Right),
            (-1, -1) => Some(Self::UpLeft),
            (1, -1) => Some(Self::UpRight),
            (-1, 1) => Some(Self::DownLeft),
            (1, 1) => Some(Self::DownRight),
            _ => None,
        }
    }

    pub fn is_cardinal(self) -> bool {
        matches!(self, Self::Up | Self::Down | Self::Left | Self::Right)
    }

    pub fn leans_down_or_right(self) -> bool {
        let (dx, dy) = self.delta();
        dx > 0 || dy > 0
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "up_left" => Some(Self::UpLeft),
            "up_right" => Some(Self::UpRight),
            "down_left" => Some(Self::DownLeft),
            "down_right" => Some(Self::DownRight),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    FireUp,
    FireDown,
    BombUp,
    BombDown,
    SpeedUp,
    Sandals,
    Skull,
    MaxFire,
    Kick,
    Punch,
    Devil,
    Egg,
    Remote,
    Shield,
    Pierce,
    Heart,
    Clock,
    Mystery,
}

impl ItemKind {
    pub const ALL: [ItemKind; 18] = [
        ItemKind::FireUp,
        ItemKind::FireDown,
        ItemKind::BombUp,
        ItemKind::BombDown,
        ItemKind::SpeedUp,
        ItemKind::Sandals,
        ItemKind::Skull,
        ItemKind::MaxFire,
        ItemKind::Kick,
        ItemKind::Punch,
        ItemKind::Devil,
        ItemKind::Egg,
        ItemKind::Remote,
        ItemKind::Shield,
        ItemKind::Pierce,
        ItemKind::Heart,
        ItemKind::Clock,
        ItemKind::Mystery,
    ];

    pub fn code(self) -> i32 {
        match self {
            Self::FireUp => -10,
            Self::FireDown => -11,
            Self::BombUp => -12,
            Self::BombDown => -13,
            Self::SpeedUp => -14,
            Self::Sandals => -15,
            Self::Skull => -16,
            Self::MaxFire => -17,
            Self::Kick => -18,
            Self::Punch => -19,
            Self::Devil => -20,
            Self::Egg => -21,
            Self::Remote => -22,
            Self::Shield => -23,
            Self::Pierce => -24,
            Self::Heart => -25,
            Self::Clock => -26,
            Self::Mystery => -27,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// `(stand, destroy)` value: what standing on the item is worth, and what
    /// blowing it up is worth.
    pub fn valuation(self) -> (i32, i32) {
        match self {
            Self::FireUp => (4, -3),
            Self::FireDown => (-3, 1),
            Self::BombUp => (4, -3),
            Self::BombDown => (-3, 1),
            Self::SpeedUp => (3, -2),
            Self::Sandals => (-3, 1),
            Self::Skull => (-6, 2),
            Self::MaxFire => (8, -6),
            Self::Kick => (3, -2),
            Self::Punch => (2, -1),
            Self::Devil => (-5, 2),
            Self::Egg => (25, -25),
            Self::Remote => (3, -2),
            Self::Shield => (3, -2),
            Self::Pierce => (2, -1),
            Self::Heart => (3, -2),
            Self::Clock => (1, 0),
            Self::Mystery => (1, 0),
        }
    }
}

pub const EMPTY_CODE: i32 = -1;
pub const WALL_CODE: i32 = -2;
pub const BLOCK_CODE: i32 = -3;
pub const OCCUPIED_CODE: i32 = -4;
pub const BOMB_CODE: i32 = -5;
pub const IMPASSABLE_CODE: i32 = 100_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileCode {
    /// Milliseconds until a hazard reaches the tile; `0` means active now.
    Hazard(i32),
    Empty,
    Wall,
    Block,
    Occupied,
    Bomb,
    Item(ItemKind),
    Impassable,
}

impl TileCode {
    pub fn from_code(code: i32) -> Self {
        match code {
            IMPASSABLE_CODE => Self::Impassable,
            ms if ms >= 0 => Self::Hazard(ms),
            EMPTY_CODE => Self::Empty,
            WALL_CODE => Self::Wall,
            BLOCK_CODE => Self::Block,
            OCCUPIED_CODE => Self::Occupied,
            BOMB_CODE => Self::Bomb,
            other => ItemKind::from_code(other)
                .map(Self::Item)
                .unwrap_or(Self::Impassable),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Hazard(ms) => ms.max(0),
            Self::Empty => EMPTY_CODE,
            Self::Wall => WALL_CODE,
            Self::Block => BLOCK_CODE,
            Self::Occupied => OCCUPIED_CODE,
            Self::Bomb => BOMB_CODE,
            Self::Item(kind) => kind.code(),
            Self::Impassable => IMPASSABLE_CODE,
        }
    }

    pub fn is_hazard(self) -> bool {
        matches!(self, Self::Hazard(_))
    }

    pub fn is_solid(self) -> bool {
        matches!(self, Self::Wall | Self::Block)
    }

    pub fn is_structural(self) -> bool {
        matches!(
            self,
            Self::Wall | Self::Block | Self::Bomb | Self::Item(_) | Self::Impassable
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
    Insane,
}

impl Difficulty {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "easy" => Some(Self::Easy),
            "normal" => Some(Self::Normal),
            "hard" => Some(Self::Hard),
            "insane" => Some(Self::Insane),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BombView {
    pub tile: Tile,
    pub owner: AgentId,
    #[serde(rename = "remainingMs")]
    pub remaining_ms: i32,
    #[serde(rename = "firePower")]
    pub fire_power: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AgentView {
    pub id: AgentId,
    pub tile: Tile,
    pub pixel: (i32, i32),
    pub alive: bool,
    pub speed: i32,
    #[serde(rename = "firePower")]
    pub fire_power: i32,
    #[serde(rename = "bombCapacity")]
    pub bomb_capacity: i32,
    #[serde(rename = "bombsPlaced")]
    pub bombs_placed: i32,
    #[serde(rename = "canKick")]
    pub can_kick: bool,
    pub facing: Option<Direction>,
}

impl AgentView {
    pub fn bombs_available(&self) -> i32 {
        (self.bomb_capacity - self.bombs_placed).max(0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct AgentIntent {
    pub direction: Option<Direction>,
    #[serde(rename = "placeBomb")]
    pub place_bomb: bool,
    #[serde(rename = "speedMultiplier")]
    pub speed_multiplier: f32,
}

impl AgentIntent {
    pub fn idle(speed_multiplier: f32) -> Self {
        Self {
            direction: None,
            place_bomb: false,
            speed_multiplier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_item_code_round_trips_through_tile_code() {
        for kind in ItemKind::ALL {
            assert!((-27..=-10).contains(&kind.code()));
            assert_eq!(TileCode::from_code(kind.code()), TileCode::Item(kind));
        }
    }

    #[test]
    fn unknown_codes_are_impassable() {
        assert_eq!(TileCode::from_code(-9), TileCode::Impassable);
        assert_eq!(TileCode::from_code(-28), TileCode::Impassable);
        assert_eq!(TileCode::from_code(IMPASSABLE_CODE), TileCode::Impassable);
        assert_eq!(TileCode::from_code(0), TileCode::Hazard(0));
    }

    #[test]
    fn direction_from_delta_uses_signs_only() {
        assert_eq!(Direction::from_delta(0, -5), Some(Direction::Up));
        assert_eq!(Direction::from_delta(3, 2), Some(Direction::DownRight));
        assert_eq!(Direction::from_delta(0, 0), None);
        assert!(Direction::DownLeft.leans_down_or_right());
        assert!(!Direction::UpLeft.leans_down_or_right());
    }
}
