pub mod arena;
pub mod brain;
pub mod constants;
pub mod controller;
pub mod danger;
pub mod error;
pub mod grid;
pub mod profile;
pub mod resolver;
pub mod safety;
pub mod scoring;
pub mod search;
pub mod types;
pub mod worker;
pub mod world;

pub use brain::AgentBrain;
pub use error::{AiError, Result};
pub use world::{World, WorldFrame};
