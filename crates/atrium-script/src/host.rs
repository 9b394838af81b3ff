//! The per-instance script host (§4.2).
//!
//! One [`ScriptHost`] owns one Luau VM and the `Arc<RwLock<SceneTree>>` it
//! shares with the instance's physics sync and observation builder. The
//! pipeline (`atrium-instance`) drives it through the five operations named
//! in §4.2: [`ScriptHost::fire_pre_physics`], [`fire_post_physics`],
//! [`fire_signal`], [`drain_pending_kicks`], [`collect_instances_by_id`].

use std::collections::HashMap;
use std::sync::Arc;

use mlua::{Lua, Value};
use parking_lot::RwLock;

use atrium_persistence::prelude::PersistenceStore;
use atrium_tree::prelude::{CFrame, FireOutcome, NodeId, NodeKind, PartData, SceneTree, SignalArg, Vec3};

use crate::budget::InstructionBudget;
use crate::config::ScriptConfig;
use crate::error::ScriptError;
use crate::node_api::NodeHandle;
use crate::services::{self, build_utility_services, PersistenceServiceHandle, PLAYERS_SERVICE, RUN_SERVICE};
use crate::value_bridge::cframe_from_lua;

pub struct ScriptHost {
    lua: Lua,
    tree: Arc<RwLock<SceneTree>>,
    budget: InstructionBudget,
    config: ScriptConfig,
}

impl ScriptHost {
    /// Build a host for one instance. Installs the standard service nodes,
    /// the Luau global table, and (if given) the `PersistenceService`
    /// binding -- but does not load any blueprint script yet.
    pub fn new(
        tree: Arc<RwLock<SceneTree>>,
        config: ScriptConfig,
        blueprint_id: String,
        max_players: u32,
        persistence: Option<Arc<PersistenceStore>>,
    ) -> Result<Self, ScriptError> {
        {
            let mut guard = tree.write();
            services::install_standard_services(&mut guard, max_players);
        }

        let lua = Lua::new();
        let budget = InstructionBudget::install(&lua, config.instruction_budget_per_callback)?;

        install_globals(&lua, &tree, persistence, blueprint_id)?;

        Ok(Self { lua, tree, budget, config })
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    /// Compile and run the blueprint's main script. This is where top-level
    /// `RunService:Connect(...)` calls register the script's callbacks.
    pub fn load_main(&self, source: &str, chunk_name: &str) -> Result<(), ScriptError> {
        self.budget.reset();
        self.lua
            .load(source)
            .set_name(chunk_name)
            .exec()
            .map_err(|e| ScriptError::CompileError(e.to_string()))
    }

    /// Fire the `RunService`'s pre-physics signal (§4.4 step 2).
    pub fn fire_pre_physics(&self) -> Vec<FireOutcome> {
        self.fire_service_signal(RUN_SERVICE, "PrePhysics", &[])
    }

    /// Fire the `RunService`'s post-physics signal (§4.4 step 9).
    pub fn fire_post_physics(&self) -> Vec<FireOutcome> {
        self.fire_service_signal(RUN_SERVICE, "PostPhysics", &[])
    }

    /// Fire a named signal on an arbitrary node (`Touched`, `TouchEnded`,
    /// `Died`, or a user-defined signal) -- §4.4 step 5, §4.3.
    pub fn fire_signal(&self, node: NodeId, name: &str, args: &[SignalArg]) -> Vec<FireOutcome> {
        self.budget.reset();
        let mut tree = self.tree.write();
        let outcomes = match tree.get_mut(node) {
            Some(n) => n.signal_mut(name).fire(args),
            None => Vec::new(),
        };
        drop(tree);
        log_outcomes(name, &outcomes);
        outcomes
    }

    fn fire_service_signal(&self, service: &str, signal_name: &str, args: &[SignalArg]) -> Vec<FireOutcome> {
        self.budget.reset();
        let mut tree = self.tree.write();
        let service_id = match services::find_service(&tree, service) {
            Some(id) => id,
            None => return Vec::new(),
        };
        let outcomes = match tree.get_mut(service_id) {
            Some(n) => n.signal_mut(signal_name).fire(args),
            None => Vec::new(),
        };
        drop(tree);
        log_outcomes(signal_name, &outcomes);
        outcomes
    }

    /// Drain every connected player's kick queue (§4.4 step 10).
    pub fn drain_pending_kicks(&self) -> Vec<(NodeId, atrium_tree::prelude::KickReason)> {
        let mut tree = self.tree.write();
        let Some(players) = services::find_service(&tree, PLAYERS_SERVICE) else {
            return Vec::new();
        };
        let children: Vec<NodeId> = tree.children(players).to_vec();
        let mut drained = Vec::new();
        for child in children {
            if let Some(node) = tree.get_mut(child) {
                if let Some(player) = node.kind.as_player_mut() {
                    while let Some(reason) = player.kick_queue.pop_front() {
                        drained.push((child, reason));
                    }
                }
            }
        }
        drained
    }

    /// Map each connected agent's id to their `Player` node (§4.4 step 1:
    /// "resolve them into data-model mutations" needs this to find the
    /// target node for an incoming agent input).
    pub fn collect_instances_by_id(&self) -> HashMap<String, NodeId> {
        let tree = self.tree.read();
        let Some(players) = services::find_service(&tree, PLAYERS_SERVICE) else {
            return HashMap::new();
        };
        tree.children(players)
            .iter()
            .filter_map(|&id| {
                let node = tree.get(id)?;
                let player = node.kind.as_player()?;
                Some((player.agent_id.clone(), id))
            })
            .collect()
    }

    pub fn tree(&self) -> &Arc<RwLock<SceneTree>> {
        &self.tree
    }
}

fn log_outcomes(signal_name: &str, outcomes: &[FireOutcome]) {
    for outcome in outcomes {
        match outcome {
            FireOutcome::Ok(_) => {}
            FireOutcome::Faulted(conn, msg) => {
                tracing::warn!(signal = signal_name, connection = ?conn, error = %msg, "script callback faulted");
            }
            FireOutcome::Disabled(conn, msg) => {
                tracing::error!(signal = signal_name, connection = ?conn, error = %msg, "script callback disabled after repeated faults");
            }
        }
    }
}

fn install_globals(
    lua: &Lua,
    tree: &Arc<RwLock<SceneTree>>,
    persistence: Option<Arc<PersistenceStore>>,
    blueprint_id: String,
) -> Result<(), ScriptError> {
    let root = tree.read().root_id();
    lua.globals().set("game", NodeHandle::new(root, tree.clone()))?;

    let utility = build_utility_services(lua, tree)?;
    lua.globals().set("UtilityServices", utility)?;

    let tree_for_instance_new = tree.clone();
    let instance_new = lua.create_function(move |_, (class_name, parent): (String, NodeHandle)| {
        new_instance(&tree_for_instance_new, &class_name, parent.id)
    })?;
    let instance_table = lua.create_table()?;
    instance_table.set("new", instance_new)?;
    lua.globals().set("Instance", instance_table)?;

    let tree_for_get_service = tree.clone();
    let persistence_handle = persistence.map(|store| PersistenceServiceHandle { store, blueprint_id });
    let get_service = lua.create_function(move |lua, name: String| -> mlua::Result<Value> {
        if name == "PersistenceService" {
            return match &persistence_handle {
                Some(handle) => Ok(Value::UserData(lua.create_userdata(handle.clone())?)),
                None => Ok(Value::Nil),
            };
        }
        let tree = tree_for_get_service.read();
        match services::find_service(&tree, &name) {
            Some(id) => {
                drop(tree);
                Ok(Value::UserData(lua.create_userdata(NodeHandle::new(id, tree_for_get_service.clone()))?))
            }
            None => Ok(Value::Nil),
        }
    })?;
    lua.globals().set("get_service", get_service)?;

    Ok(())
}

fn new_instance(tree: &Arc<RwLock<SceneTree>>, class_name: &str, parent: NodeId) -> mlua::Result<NodeHandle> {
    let kind = match class_name {
        "Part" => NodeKind::Part(PartData::new(
            atrium_tree::prelude::PartShape::Box,
            Vec3::new(4.0, 1.0, 2.0),
            CFrame::default(),
        )),
        "Model" => NodeKind::Model,
        "Folder" => NodeKind::Folder,
        "Light" => NodeKind::Light(atrium_tree::prelude::LightData::default()),
        other => {
            return Err(mlua::Error::RuntimeError(format!("Instance.new: unknown class '{other}'")));
        }
    };
    let mut guard = tree.write();
    let id = guard
        .spawn(parent, class_name, kind)
        .map_err(|e| mlua::Error::RuntimeError(e.to_string()))?;
    drop(guard);
    Ok(NodeHandle::new(id, tree.clone()))
}

// Re-exported for callers that need to turn a raw cframe table into a
// concrete CFrame outside of a NodeHandle method (e.g. tests).
#[allow(dead_code)]
fn _cframe_from_lua_reexport(value: &Value) -> Result<CFrame, ScriptError> {
    cframe_from_lua(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_tree::prelude::SceneTree as Tree;

    fn new_host() -> ScriptHost {
        let tree = Arc::new(RwLock::new(Tree::new()));
        ScriptHost::new(tree, ScriptConfig::default(), "bp-1".to_owned(), 8, None).unwrap()
    }

    #[test]
    fn load_main_runs_top_level_code() {
        let host = new_host();
        host.load_main("_G.ran = true", "main").unwrap();
        let ran: bool = host.lua.globals().get("ran").unwrap();
        assert!(ran);
    }

    #[test]
    fn pre_physics_signal_fires_connected_callback() {
        let host = new_host();
        host.load_main(
            r#"
            local RunService = get_service("RunService")
            _G.fired = 0
            RunService:Connect("PrePhysics", function() _G.fired = _G.fired + 1 end)
            "#,
            "main",
        )
        .unwrap();
        host.fire_pre_physics();
        let fired: i64 = host.lua.globals().get("fired").unwrap();
        assert_eq!(fired, 1);
    }

    #[test]
    fn instance_new_spawns_under_requested_parent() {
        let host = new_host();
        host.load_main(
            r#"
            local part = Instance.new("Part", game)
            _G.class_name = part:ClassName()
            "#,
            "main",
        )
        .unwrap();
        let class_name: String = host.lua.globals().get("class_name").unwrap();
        assert_eq!(class_name, "Part");
    }

    #[test]
    fn budget_exceeded_callback_is_reported_as_a_fault() {
        let tree = Arc::new(RwLock::new(Tree::new()));
        let mut config = ScriptConfig::default();
        config.instruction_budget_per_callback = 1_000;
        let host = ScriptHost::new(tree, config, "bp-1".to_owned(), 8, None).unwrap();
        host.load_main(
            r#"
            local RunService = get_service("RunService")
            RunService:Connect("PrePhysics", function()
                local x = 0
                for i = 1, 10000000 do x = x + i end
            end)
            "#,
            "main",
        )
        .unwrap();
        let outcomes = host.fire_pre_physics();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], FireOutcome::Faulted(_, _)));
    }

    #[test]
    fn collect_instances_by_id_maps_agent_to_player_node() {
        let tree = Arc::new(RwLock::new(Tree::new()));
        let host = ScriptHost::new(tree.clone(), ScriptConfig::default(), "bp-1".to_owned(), 8, None).unwrap();
        let players = services::find_service(&tree.read(), PLAYERS_SERVICE).unwrap();
        let player_id = tree
            .write()
            .spawn(
                players,
                "Agent One",
                NodeKind::Player(atrium_tree::prelude::PlayerData::new("agent-1", "Agent One", 0)),
            )
            .unwrap();
        let map = host.collect_instances_by_id();
        assert_eq!(map.get("agent-1"), Some(&player_id));
    }
}
