use crate::constants::TILE_PX;
use crate::error::Result;
use crate::grid::Grid;
use crate::types::{AgentId, AgentView, BombView, Tile};

#[derive(Clone, Debug)]
pub struct WorldFrame {
    pub codes: Grid,
    pub bombs: Vec<BombView>,
    pub agents: Vec<AgentView>,
    pub round_over: bool,
    pub now_ms: u64,
}

impl WorldFrame {
    pub fn width(&self) -> i32 {
        self.codes.width()
    }

    pub fn height(&self) -> i32 {
        self.codes.height()
    }

    pub fn agent(&self, id: AgentId) -> Option<&AgentView> {
        self.agents.iter().find(|agent| agent.id == id)
    }

    pub fn bomb_at(&self, tile: Tile) -> Option<&BombView> {
        self.bombs.iter().find(|bomb| bomb.tile == tile)
    }
}

pub trait World: Send + Sync {
    /// Reads a frame. A transient inconsistency should surface as
    /// [`crate::error::AiError::ReadRace`]; the caller retries next cycle.
    fn frame(&self) -> Result<WorldFrame>;

    fn bomb_at(&self, tile: Tile) -> bool {
        self.frame()
            .map(|frame| frame.bomb_at(tile).is_some())
            .unwrap_or(false)
    }

    fn tile_center(&self, tile: Tile) -> (i32, i32) {
        (
            tile.x * TILE_PX + TILE_PX / 2,
            tile.y * TILE_PX + TILE_PX / 2,
        )
    }
}
