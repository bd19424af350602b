use serde::Serialize;

use crate::constants::BOMB_COOLDOWN_MS;
use crate::profile::AgentProfile;
use crate::safety::SafetyTarget;
use crate::types::{AgentView, Direction, Tile};
use crate::worker::Snapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Directive {
    /// No snapshot has been published yet.
    Thinking,
    Hold,
    MoveTo(Tile),
    Step(Direction),
    PlaceBomb,
}

#[derive(Debug, Default)]
pub struct DecisionController {
    last_bomb_ms: Option<u64>,
    spent_cycle: Option<u64>,
}

impl DecisionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.last_bomb_ms = None;
        self.spent_cycle = None;
    }

    pub fn decide(
        &mut self,
        snapshot: Option<&Snapshot>,
        agent: &AgentView,
        profile: &AgentProfile,
        bomb_at: impl Fn(Tile) -> bool,
        now_ms: u64,
    ) -> Directive {
        let Some(snapshot) = snapshot else {
            return Directive::Thinking;
        };
        if !agent.alive {
            return Directive::Hold;
        }

        if !snapshot.safety.is_safe() {
            return match snapshot.safety.target {
                Some(SafetyTarget::Tile(tile)) => Directive::MoveTo(tile),
                Some(SafetyTarget::Kick {
                    stand, direction, ..
                }) => {
                    if agent.tile == stand {
                        Directive::Step(direction)
                    } else {
                        Directive::MoveTo(stand)
                    }
                }
                Some(SafetyTarget::NoEscape) | None => Directive::Hold,
            };
        }

        if self.spent_cycle == Some(snapshot.cycle) {
            return Directive::Hold;
        }
        let Some(target) = snapshot.best_target else {
            return Directive::Hold;
        };
        if bomb_at(target) {
            tracing::debug!(agent = agent.id, x = target.x, y = target.y, "target already bombed");
            self.spent_cycle = Some(snapshot.cycle);
            return Directive::Hold;
        }
        if agent.bombs_available() == 0 {
            return Directive::Hold;
        }

        if agent.tile == target {
            let cooled = self
                .last_bomb_ms
                .map_or(true, |at| now_ms.saturating_sub(at) >= BOMB_COOLDOWN_MS);
            if !cooled {
                return Directive::Hold;
            }
            self.last_bomb_ms = Some(now_ms);
            self.spent_cycle = Some(snapshot.cycle);
            return Directive::PlaceBomb;
        }

        if profile.proactive_walk && snapshot.is_reachable(target) && agent.speed > 0 {
            return Directive::MoveTo(target);
        }
        Directive::Hold
    }
}
