//! The fleet controller (§4.6, §4.8).
//!
//! One [`Fleet`] owns every running instance across every blueprint, plus the
//! routing tables admission and spectate requests consult. Concurrent maps
//! (`DashMap`) hold the top-level bookkeeping so admission on one blueprint
//! never blocks on another; each instance is its own `RwLock`, held for
//! exactly the duration of one tick or one admission call (§5).

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::RwLock;

use atrium_blueprint::prelude::BlueprintCache;
use atrium_instance::prelude::Instance;
use atrium_persistence::prelude::PersistenceStore;

use crate::config::FleetConfig;
use crate::error::FleetError;
use crate::ids::InstanceIdAllocator;

/// `(agent_id, blueprint_id)` -- an agent can be in at most one instance per
/// blueprint at a time (§4.6 `player_location`).
pub type PlayerKey = (String, String);

pub struct Fleet {
    pub config: FleetConfig,
    blueprints: BlueprintCache,
    persistence: Option<Arc<PersistenceStore>>,
    instance_ids: InstanceIdAllocator,

    instances: DashMap<String, Arc<RwLock<Instance>>>,
    /// Insertion-ordered so `find_or_create_instance` and `spectate_default`
    /// have a stable tie-break (earliest-created first).
    blueprint_to_instances: DashMap<String, Vec<String>>,
    player_location: DashMap<PlayerKey, String>,
}

impl Fleet {
    pub fn new(blueprints_root: impl Into<std::path::PathBuf>, persistence: Option<Arc<PersistenceStore>>) -> Self {
        Self {
            config: FleetConfig::default(),
            blueprints: BlueprintCache::new(blueprints_root),
            persistence,
            instance_ids: InstanceIdAllocator::new(),
            instances: DashMap::new(),
            blueprint_to_instances: DashMap::new(),
            player_location: DashMap::new(),
        }
    }

    pub fn with_config(mut self, config: FleetConfig) -> Self {
        self.config = config;
        self
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// On-disk directory of a blueprint, for serving files it carries
    /// verbatim (`skill.md`) that aren't part of the parsed config.
    pub fn blueprint_dir(&self, blueprint_id: &str) -> std::path::PathBuf {
        self.blueprints.blueprint_dir(blueprint_id)
    }

    pub fn blueprint_config(&self, blueprint_id: &str) -> Result<Arc<atrium_blueprint::prelude::BlueprintConfig>, FleetError> {
        Ok(self.blueprints.get_or_load(blueprint_id)?)
    }

    pub fn get_instance(&self, instance_id: &str) -> Option<Arc<RwLock<Instance>>> {
        self.instances.get(instance_id).map(|e| e.clone())
    }

    /// A short-lived snapshot of every live instance handle, taken under a
    /// brief read over the concurrent map (§4.6 "snapshot instance handles
    /// under a short read lock, tick in parallel").
    pub fn instances_snapshot(&self) -> Vec<Arc<RwLock<Instance>>> {
        self.instances.iter().map(|e| e.value().clone()).collect()
    }

    pub fn player_location(&self, agent_id: &str, blueprint_id: &str) -> Option<String> {
        self.player_location.get(&(agent_id.to_owned(), blueprint_id.to_owned())).map(|e| e.clone())
    }

    /// All instance ids of `blueprint_id` in creation order.
    pub fn instances_for_blueprint(&self, blueprint_id: &str) -> Vec<String> {
        self.blueprint_to_instances.get(blueprint_id).map(|v| v.clone()).unwrap_or_default()
    }

    /// Find an existing instance of `blueprint_id` with spare capacity, or
    /// create a fresh one. Does not itself reserve a seat -- `try_join`
    /// re-checks capacity under the instance's own lock (§4.6).
    pub fn find_or_create_instance(&self, blueprint_id: &str) -> Result<Arc<RwLock<Instance>>, FleetError> {
        let candidate_ids = self.instances_for_blueprint(blueprint_id);
        for instance_id in candidate_ids {
            if let Some(handle) = self.instances.get(&instance_id) {
                let guard = handle.read();
                if guard.state().has_capacity_to_join() && !guard.is_full() {
                    drop(guard);
                    return Ok(handle.clone());
                }
            }
        }
        self.create_instance(blueprint_id)
    }

    fn create_instance(&self, blueprint_id: &str) -> Result<Arc<RwLock<Instance>>, FleetError> {
        let config = self.blueprints.get_or_load(blueprint_id)?;
        let instance_id = self.instance_ids.allocate(blueprint_id);

        let instance = Instance::create(
            instance_id.clone(),
            blueprint_id.to_owned(),
            config.world.max_players as u32,
            config.asset_version,
            self.config.tick_period,
            &config.entry_script_source,
            self.persistence.clone(),
        )?;

        let handle = Arc::new(RwLock::new(instance));
        self.instances.insert(instance_id.clone(), handle.clone());
        self.blueprint_to_instances.entry(blueprint_id.to_owned()).or_default().push(instance_id.clone());
        tracing::info!(blueprint_id, instance_id, "instance created");
        Ok(handle)
    }

    /// Remove `agent_id` from whatever instance of `blueprint_id` it's
    /// currently in, if any.
    pub fn leave(&self, blueprint_id: &str, agent_id: &str) {
        let key = (agent_id.to_owned(), blueprint_id.to_owned());
        let Some((_, instance_id)) = self.player_location.remove(&key) else {
            return;
        };
        if let Some(handle) = self.instances.get(&instance_id) {
            handle.write().remove_player(agent_id);
        }
    }

    pub(crate) fn record_join(&self, blueprint_id: &str, agent_id: &str, instance_id: &str) {
        self.player_location.insert((agent_id.to_owned(), blueprint_id.to_owned()), instance_id.to_owned());
    }

    /// Destroy every instance that's been empty for longer than
    /// `config.empty_timeout` (§4.6 `garbage_collect`). Flushes persistence
    /// for each destroyed instance before dropping its handle (§4.7).
    pub fn garbage_collect(&self) -> Vec<String> {
        let now = Instant::now();
        let mut destroyed = Vec::new();
        let stale: Vec<String> = self
            .instances
            .iter()
            .filter_map(|entry| {
                let guard = entry.value().read();
                let expired = guard
                    .empty_since()
                    .map(|since| now.duration_since(since) > self.config.empty_timeout)
                    .unwrap_or(false)
                    || guard.state().is_finished();
                expired.then(|| entry.key().clone())
            })
            .collect();

        for instance_id in stale {
            if let Some((_, handle)) = self.instances.remove(&instance_id) {
                let blueprint_id = handle.read().blueprint_id.clone();
                if let Some(mut list) = self.blueprint_to_instances.get_mut(&blueprint_id) {
                    list.retain(|id| id != &instance_id);
                }
                self.player_location.retain(|_, v| v != &instance_id);
                tracing::info!(instance_id, "instance destroyed by gc");
                destroyed.push(instance_id);
            }
        }
        destroyed
    }

    /// Startup reconciliation (§4.6 "mark persisted rows orphaned, in-memory
    /// pool starts empty"). Every row in the `game_instances` store predates
    /// this process, so none of them can possibly still be running.
    pub async fn reconcile_on_start(&self) {
        let Some(persistence) = &self.persistence else { return };
        persistence.load_store("_fleet", "game_instances").await;
        let orphaned: Vec<(String, serde_json::Value)> = persistence
            .get("_fleet", "game_instances", "__index")
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|id| id.as_str().map(|s| s.to_owned()))
            .filter_map(|id| persistence.get("_fleet", "game_instances", &id).map(|row| (id, row)))
            .collect();

        for (id, mut row) in orphaned {
            if let Some(obj) = row.as_object_mut() {
                obj.insert("status".to_owned(), serde_json::json!("orphaned"));
            }
            if let Err(err) = persistence.set("_fleet", "game_instances", &id, row) {
                tracing::warn!(instance_id = id, error = %err, "failed to mark instance orphaned");
            }
        }
    }

    pub fn record_instance_row(&self, instance: &Instance) {
        let Some(persistence) = &self.persistence else { return };
        let row = serde_json::json!({
            "blueprint_id": instance.blueprint_id,
            "status": "running",
        });
        if persistence.set("_fleet", "game_instances", &instance.instance_id, row).is_ok() {
            let mut index: Vec<String> = persistence
                .get("_fleet", "game_instances", "__index")
                .and_then(|v| v.as_array().cloned())
                .unwrap_or_default()
                .into_iter()
                .filter_map(|v| v.as_str().map(|s| s.to_owned()))
                .collect();
            if !index.contains(&instance.instance_id) {
                index.push(instance.instance_id.clone());
                let _ = persistence.set("_fleet", "game_instances", "__index", serde_json::json!(index));
            }
        }
    }

    /// Largest player count, earliest-created tie-break (§4.8
    /// `spectate_default`).
    pub fn spectate_default(&self, blueprint_id: &str) -> Result<String, FleetError> {
        let mut best: Option<(String, usize, Instant)> = None;
        for instance_id in self.instances_for_blueprint(blueprint_id) {
            let Some(handle) = self.instances.get(&instance_id) else { continue };
            let guard = handle.read();
            let count = guard.player_count();
            let created = guard.created_at;
            let better = match &best {
                None => true,
                Some((_, best_count, best_created)) => count > *best_count || (count == *best_count && created < *best_created),
            };
            if better {
                best = Some((instance_id.clone(), count, created));
            }
        }
        best.map(|(id, _, _)| id).ok_or_else(|| FleetError::NotFound(blueprint_id.to_owned()))
    }

    /// The instance `agent_id` is currently playing in, within `blueprint_id`
    /// (§4.8 `spectate_player`).
    pub fn spectate_player(&self, blueprint_id: &str, agent_id: &str) -> Result<String, FleetError> {
        self.player_location(agent_id, blueprint_id).ok_or_else(|| FleetError::NotFound(agent_id.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn temp_blueprints_root(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("atrium-fleet-test-{name}-{}", std::process::id()));
        let dir = root.join("arena");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("world.toml"), "name = \"Arena\"\nmax_players = 2\n\n[scripts]\nmain = \"main.luau\"\n").unwrap();
        fs::write(dir.join("main.luau"), "-- empty").unwrap();
        root
    }

    #[test]
    fn find_or_create_makes_a_fresh_instance_when_none_exist() {
        let root = temp_blueprints_root("create");
        let fleet = Fleet::new(&root, None);
        let handle = fleet.find_or_create_instance("arena").unwrap();
        assert_eq!(handle.read().blueprint_id, "arena");
        assert_eq!(fleet.instance_count(), 1);
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn find_or_create_reuses_an_instance_with_capacity() {
        let root = temp_blueprints_root("reuse");
        let fleet = Fleet::new(&root, None);
        let first = fleet.find_or_create_instance("arena").unwrap();
        let second = fleet.find_or_create_instance("arena").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn garbage_collect_destroys_instances_empty_past_timeout() {
        let root = temp_blueprints_root("gc");
        let fleet = Fleet::new(&root, None).with_config(FleetConfig {
            empty_timeout: std::time::Duration::from_millis(0),
            ..FleetConfig::default()
        });
        fleet.find_or_create_instance("arena").unwrap();
        let destroyed = fleet.garbage_collect();
        assert_eq!(destroyed.len(), 1);
        assert_eq!(fleet.instance_count(), 0);
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn spectate_default_picks_the_most_populated_instance() {
        let root = temp_blueprints_root("spectate");
        let fleet = Fleet::new(&root, None);
        let first = fleet.find_or_create_instance("arena").unwrap();
        first.write().join("agent-1", "Agent One").unwrap();
        let _second = fleet.create_instance("arena").unwrap();
        let chosen = fleet.spectate_default("arena").unwrap();
        assert_eq!(chosen, first.read().instance_id);
        fs::remove_dir_all(&root).ok();
    }
}
