use serde::Serialize;

use crate::types::Difficulty;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AgentProfile {
    #[serde(rename = "huntLevel")]
    pub hunt_level: i32,
    #[serde(rename = "reactionMs")]
    pub reaction_ms: u64,
    #[serde(rename = "distanceModifier")]
    pub distance_modifier: i32,
    /// Scales the time-to-explode cutoff for crossing hazard tiles. Lower is bolder.
    #[serde(rename = "fireWalkMultiplier")]
    pub fire_walk_multiplier: f32,
    #[serde(rename = "proactiveWalk")]
    pub proactive_walk: bool,
    #[serde(rename = "trapSeeking")]
    pub trap_seeking: bool,
    #[serde(rename = "kickEscape")]
    pub kick_escape: bool,
    #[serde(rename = "speedMultiplier")]
    pub speed_multiplier: f32,
}

impl Default for AgentProfile {
    fn default() -> Self {
        profile_for(Difficulty::Normal)
    }
}

pub fn profile_for(difficulty: Difficulty) -> AgentProfile {
    match difficulty {
        Difficulty::Easy => AgentProfile {
            hunt_level: 2,
            reaction_ms: 1_200,
            distance_modifier: 2,
            fire_walk_multiplier: 1.4,
            proactive_walk: false,
            trap_seeking: false,
            kick_escape: false,
            speed_multiplier: 0.9,
        },
        Difficulty::Normal => AgentProfile {
            hunt_level: 4,
            reaction_ms: 400,
            distance_modifier: 3,
            fire_walk_multiplier: 1.2,
            proactive_walk: true,
            trap_seeking: false,
            kick_escape: false,
            speed_multiplier: 1.0,
        },
        Difficulty::Hard => AgentProfile {
            hunt_level: 6,
            reaction_ms: 120,
            distance_modifier: 4,
            fire_walk_multiplier: 1.0,
            proactive_walk: true,
            trap_seeking: true,
            kick_escape: true,
            speed_multiplier: 1.0,
        },
        Difficulty::Insane => AgentProfile {
            hunt_level: 9,
            reaction_ms: 5,
            distance_modifier: 5,
            fire_walk_multiplier: 0.8,
            proactive_walk: true,
            trap_seeking: true,
            kick_escape: true,
            speed_multiplier: 1.1,
        },
    }
}
