//! `Player` node data (§3, §4.6, §4.8).

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::node_id::NodeId;

/// Why a player is being removed from an instance, surfaced to the fleet
/// controller via `drain_pending_kicks` (§4.4 step 10 "leave/kick processing").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KickReason {
    /// `Player:Kick(message)` called from script.
    Script(String),
    /// Humanoid died and the blueprint doesn't respawn.
    Eliminated,
    /// AFK timeout elapsed with no actions (§4.8).
    Afk,
}

/// A connected agent's seat in the instance. Distinct from the `NodeId` of
/// its character model, which lives under Workspace like any other part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerData {
    pub agent_id: String,
    pub name: String,
    pub character_root: Option<NodeId>,
    pub kick_queue: VecDeque<KickReason>,
    /// Tick at which this player's last action was applied; used by the
    /// fleet controller's AFK sweep (§4.8).
    pub last_action_tick: u64,
}

impl PlayerData {
    pub fn new(agent_id: impl Into<String>, name: impl Into<String>, joined_tick: u64) -> Self {
        Self {
            agent_id: agent_id.into(),
            name: name.into(),
            character_root: None,
            kick_queue: VecDeque::new(),
            last_action_tick: joined_tick,
        }
    }

    pub fn queue_kick(&mut self, reason: KickReason) {
        self.kick_queue.push_back(reason);
    }

    pub fn record_action(&mut self, tick: u64) {
        self.last_action_tick = tick;
    }

    pub fn idle_ticks(&self, current_tick: u64) -> u64 {
        current_tick.saturating_sub(self.last_action_tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_ticks_counts_since_last_action() {
        let mut p = PlayerData::new("agent-1", "Agent One", 10);
        assert_eq!(p.idle_ticks(40), 30);
        p.record_action(35);
        assert_eq!(p.idle_ticks(40), 5);
    }

    #[test]
    fn kick_queue_is_fifo() {
        let mut p = PlayerData::new("agent-1", "Agent One", 0);
        p.queue_kick(KickReason::Afk);
        p.queue_kick(KickReason::Script("bye".to_owned()));
        assert_eq!(p.kick_queue.pop_front(), Some(KickReason::Afk));
        assert_eq!(
            p.kick_queue.pop_front(),
            Some(KickReason::Script("bye".to_owned()))
        );
    }
}
