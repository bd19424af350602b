use thiserror::Error;

use crate::types::{AgentId, Tile};

#[derive(Debug, Error)]
pub enum AiError {
    #[error("world state changed during read: {0}")]
    ReadRace(String),

    #[error("tile ({}, {}) is outside the {width}x{height} arena", .tile.x, .tile.y)]
    OutOfBounds { tile: Tile, width: i32, height: i32 },

    #[error("unknown agent {0}")]
    UnknownAgent(AgentId),

    #[error("invalid arena: {0}")]
    InvalidArena(String),
}

pub type Result<T> = std::result::Result<T, AiError>;
