//! Service registry (§4.2 "services queried by name").
//!
//! `Players`, `Workspace`, and `RunService` are plain `Service` nodes in the
//! tree -- `RunService`'s pre/post-physics signals and `Players`' attributes
//! and child `Player` nodes are handled by the generic [`crate::node_api`]
//! machinery, so no bespoke binding code is needed for them. Only
//! `PersistenceService` and the `UtilityServices` facade need dedicated Lua
//! userdata, since they bridge to `atrium-persistence` and to non-tree
//! global state respectively.

use std::sync::Arc;

use mlua::{Lua, Table, UserData, UserDataMethods, Value};
use parking_lot::RwLock;

use atrium_persistence::prelude::PersistenceStore;
use atrium_tree::prelude::{AttributeValue, NodeId, NodeKind, SceneTree};

use crate::error::ScriptError;
use crate::node_api::NodeHandle;
use crate::value_bridge::{attribute_from_lua, attribute_to_lua};

/// Names of the well-known service nodes spawned under the tree root at
/// host construction time, ahead of anything the blueprint script does.
pub const PLAYERS_SERVICE: &str = "Players";
pub const RUN_SERVICE: &str = "RunService";
pub const LIGHTING_SERVICE: &str = "Lighting";

/// Ensure the standard service nodes exist under `root`, returning nothing
/// -- callers look them up again by name via [`find_service`].
pub fn install_standard_services(tree: &mut SceneTree, max_players: u32) {
    let root = tree.root_id();
    let players = find_service(tree, PLAYERS_SERVICE).unwrap_or_else(|| {
        tree.spawn(root, PLAYERS_SERVICE, NodeKind::Service(PLAYERS_SERVICE.to_owned()))
            .expect("root is always alive")
    });
    if let Some(node) = tree.get_mut(players) {
        node.set_attribute("MaxPlayers", AttributeValue::Number(max_players as f64));
    }
    if find_service(tree, RUN_SERVICE).is_none() {
        tree.spawn(root, RUN_SERVICE, NodeKind::Service(RUN_SERVICE.to_owned())).ok();
    }
    if find_service(tree, LIGHTING_SERVICE).is_none() {
        tree.spawn(root, LIGHTING_SERVICE, NodeKind::Service(LIGHTING_SERVICE.to_owned())).ok();
    }
}

pub fn find_service(tree: &SceneTree, name: &str) -> Option<NodeId> {
    let root = tree.root_id();
    tree.children(root)
        .iter()
        .copied()
        .find(|&id| tree.get(id).map(|n| n.name == name).unwrap_or(false))
}

/// A per-blueprint handle onto the shared persistence store, exposed to
/// scripts as `PersistenceService`.
#[derive(Clone)]
pub struct PersistenceServiceHandle {
    pub store: Arc<PersistenceStore>,
    pub blueprint_id: String,
}

impl UserData for PersistenceServiceHandle {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("GetDataStore", |_, this, store_name: String| {
            Ok(DataStoreHandle {
                store: this.store.clone(),
                blueprint_id: this.blueprint_id.clone(),
                store_name,
            })
        });
    }
}

#[derive(Clone)]
pub struct DataStoreHandle {
    store: Arc<PersistenceStore>,
    blueprint_id: String,
    store_name: String,
}

impl UserData for DataStoreHandle {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("GetAsync", |lua, this, key: String| {
            match this.store.get(&this.blueprint_id, &this.store_name, &key) {
                Some(value) => json_to_lua(lua, &value),
                None => Ok(Value::Nil),
            }
        });

        methods.add_method("SetAsync", |_, this, (key, value): (String, Value)| {
            let json = lua_to_json(&value).map_err(script_err_to_lua)?;
            this.store
                .set(&this.blueprint_id, &this.store_name, &key, json)
                .map_err(|e| mlua::Error::RuntimeError(e.to_string()))
        });

        methods.add_method("RemoveAsync", |_, this, key: String| {
            this.store.remove(&this.blueprint_id, &this.store_name, &key);
            Ok(())
        });
    }
}

fn script_err_to_lua(err: ScriptError) -> mlua::Error {
    mlua::Error::RuntimeError(err.to_string())
}

fn lua_to_json(value: &Value) -> Result<serde_json::Value, ScriptError> {
    let attr = attribute_from_lua(value)?;
    Ok(match attr {
        AttributeValue::Number(n) => serde_json::json!(n),
        AttributeValue::Bool(b) => serde_json::json!(b),
        AttributeValue::String(s) => serde_json::json!(s),
        AttributeValue::Vector(v) => serde_json::json!({"x": v.x, "y": v.y, "z": v.z}),
        AttributeValue::Color(c) => serde_json::json!({"r": c.r, "g": c.g, "b": c.b}),
    })
}

fn json_to_lua(lua: &Lua, value: &serde_json::Value) -> mlua::Result<Value> {
    match value {
        serde_json::Value::Number(n) => Ok(Value::Number(n.as_f64().unwrap_or(0.0))),
        serde_json::Value::Bool(b) => Ok(Value::Boolean(*b)),
        serde_json::Value::String(s) => Ok(Value::String(lua.create_string(s)?)),
        serde_json::Value::Null => Ok(Value::Nil),
        serde_json::Value::Array(items) => {
            let t = lua.create_table()?;
            for (i, item) in items.iter().enumerate() {
                t.set(i + 1, json_to_lua(lua, item)?)?;
            }
            Ok(Value::Table(t))
        }
        serde_json::Value::Object(map) => {
            let t = lua.create_table()?;
            for (k, v) in map {
                t.set(k.clone(), json_to_lua(lua, v)?)?;
            }
            Ok(Value::Table(t))
        }
    }
}

/// Build the `UtilityServices` facade table (§13: "a single `UtilityServices`
/// facade with `tween` and `lighting` sub-tables... cache-only non-yielding
/// calls"). `tween.Create` applies its target properties immediately rather
/// than interpolating, since nothing in the host yields mid-tick.
pub fn build_utility_services(lua: &Lua, tree: &Arc<RwLock<SceneTree>>) -> mlua::Result<Table> {
    let facade = lua.create_table()?;

    let tween = lua.create_table()?;
    let tree_for_tween = tree.clone();
    let create = lua.create_function(
        move |_, (node, _duration, properties): (NodeHandle, f64, Table)| {
            let mut guard = tree_for_tween.write();
            if let Some(n) = guard.get_mut(node.id) {
                for pair in properties.pairs::<String, Value>() {
                    let (key, value) = pair?;
                    let attr = attribute_from_lua(&value).map_err(script_err_to_lua)?;
                    n.set_attribute(key, attr);
                }
            }
            Ok(TweenHandle)
        },
    )?;
    tween.set("Create", create)?;
    facade.set("tween", tween)?;

    let lighting = lua.create_table()?;
    let tree_for_set = tree.clone();
    let set_ambient = lua.create_function(move |_, value: Value| {
        let attr = attribute_from_lua(&value).map_err(script_err_to_lua)?;
        let mut guard = tree_for_set.write();
        if let Some(id) = find_service(&guard, LIGHTING_SERVICE) {
            if let Some(n) = guard.get_mut(id) {
                n.set_attribute("Ambient", attr);
            }
        }
        Ok(())
    })?;
    lighting.set("SetAmbient", set_ambient)?;

    let tree_for_get = tree.clone();
    let get_ambient = lua.create_function(move |lua, ()| {
        let guard = tree_for_get.read();
        let value = find_service(&guard, LIGHTING_SERVICE)
            .and_then(|id| guard.get(id))
            .and_then(|n| n.get_attribute("Ambient"))
            .cloned();
        match value {
            Some(attr) => attribute_to_lua(lua, &attr),
            None => Ok(Value::Nil),
        }
    })?;
    lighting.set("GetAmbient", get_ambient)?;
    facade.set("lighting", lighting)?;

    Ok(facade)
}

/// Returned by `tween.Create`. Play/Cancel are no-ops since the tween has
/// already been applied -- kept so scripts written against a real tween
/// API's shape (`handle:Play()`) don't error on the call.
struct TweenHandle;

impl UserData for TweenHandle {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("Play", |_, _, ()| Ok(()));
        methods.add_method("Cancel", |_, _, ()| Ok(()));
    }
}
