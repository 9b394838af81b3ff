//! Admission and AFK eviction (§4.8).

use atrium_tree::prelude::KickReason;

use crate::error::FleetError;
use crate::fleet::Fleet;

impl Fleet {
    /// Resolve an admission request for `agent_id` into `blueprint_id`,
    /// retrying up to `config.max_join_retries` times against a capacity
    /// race (§5: "admission retries are bounded... exhaustion maps to
    /// ServiceBusy"). A prior seat for this agent in this blueprint is torn
    /// down first (§4.6 `duplicate_join_resolution`): atomic remove-then-add
    /// so the agent is never counted in two instances at once.
    pub fn try_join(&self, blueprint_id: &str, agent_id: &str, name: &str) -> Result<String, FleetError> {
        self.duplicate_join_resolution(blueprint_id, agent_id);

        let mut attempts = 0u8;
        loop {
            let handle = self.find_or_create_instance(blueprint_id)?;
            let instance_id = {
                let guard = handle.read();
                guard.instance_id.clone()
            };

            let joined = {
                let mut guard = handle.write();
                if guard.is_full() || !guard.state().has_capacity_to_join() {
                    None
                } else {
                    guard.join(agent_id, name).ok()
                }
            };

            if joined.is_some() {
                self.record_join(blueprint_id, agent_id, &instance_id);
                return Ok(instance_id);
            }

            attempts += 1;
            if attempts > self.config.max_join_retries {
                return Err(FleetError::ServiceBusy);
            }
            tracing::debug!(blueprint_id, agent_id, attempts, "join lost a capacity race, retrying");
        }
    }

    /// If `agent_id` already holds a seat elsewhere in `blueprint_id`,
    /// remove it before the new join is attempted.
    fn duplicate_join_resolution(&self, blueprint_id: &str, agent_id: &str) {
        if self.player_location(agent_id, blueprint_id).is_some() {
            self.leave(blueprint_id, agent_id);
        }
    }

    /// Queue an `Afk` kick for every player idle past `config.afk_timeout`,
    /// across every instance. Kicks land at the next tick boundary (§4.4
    /// step 10), never mid-tick.
    pub fn evict_idle_players(&self) {
        let afk_ticks = (self.config.afk_timeout.as_secs_f64() / self.config.tick_period.as_secs_f64()).ceil() as u64;
        for entry in self.instances_snapshot() {
            let guard = entry.read();
            if !guard.state().is_playing() {
                continue;
            }
            for agent_id in guard.agent_ids() {
                if guard.idle_ticks(&agent_id).unwrap_or(0) >= afk_ticks {
                    guard.queue_kick(&agent_id, KickReason::Afk);
                }
            }
        }
    }
}
