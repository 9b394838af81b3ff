//! The Lua-visible node handle (§4.2 "global tree rooted at the data-model
//! root").
//!
//! [`NodeHandle`] is a thin userdata wrapper around a [`NodeId`] plus a
//! shared handle to the owning [`SceneTree`]; all mutation goes through the
//! tree's write lock so scripts and the tick pipeline see the same state.

use std::sync::Arc;

use mlua::{Lua, UserData, UserDataMethods, Value};
use parking_lot::RwLock;

use atrium_tree::prelude::{Connection, NodeId, NodeKind, PartData, PartShape, SceneTree, SignalArg};

use crate::error::ScriptError;
use crate::value_bridge::{attribute_from_lua, attribute_to_lua, cframe_from_lua, cframe_to_lua, vec3_from_lua, vec3_to_lua};

/// A Lua-visible reference to one scene node. Cheap to clone; every clone
/// shares the same underlying tree.
#[derive(Clone)]
pub struct NodeHandle {
    pub id: NodeId,
    pub tree: Arc<RwLock<SceneTree>>,
}

impl NodeHandle {
    pub fn new(id: NodeId, tree: Arc<RwLock<SceneTree>>) -> Self {
        Self { id, tree }
    }

    fn alive_or_err(&self) -> mlua::Result<()> {
        if self.tree.read().is_alive(self.id) {
            Ok(())
        } else {
            Err(mlua::Error::RuntimeError(format!("{} is no longer alive", self.id)))
        }
    }
}

fn part_not_found(id: NodeId) -> mlua::Error {
    mlua::Error::RuntimeError(format!("{id} is not a Part"))
}

impl UserData for NodeHandle {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("Name", |_, this, ()| {
            this.alive_or_err()?;
            Ok(this.tree.read().get(this.id).map(|n| n.name.clone()).unwrap_or_default())
        });

        methods.add_method("ClassName", |_, this, ()| {
            this.alive_or_err()?;
            Ok(this
                .tree
                .read()
                .get(this.id)
                .map(|n| n.class_name().to_owned())
                .unwrap_or_default())
        });

        methods.add_method("GetId", |_, this, ()| Ok(this.id.to_raw()));

        methods.add_method("Parent", |_, this, ()| {
            this.alive_or_err()?;
            let tree = this.tree.read();
            Ok(tree
                .get(this.id)
                .and_then(|n| n.parent)
                .map(|parent| NodeHandle::new(parent, this.tree.clone())))
        });

        methods.add_method("GetChildren", |_, this, ()| {
            this.alive_or_err()?;
            let tree = this.tree.read();
            Ok(tree
                .children(this.id)
                .iter()
                .map(|&c| NodeHandle::new(c, this.tree.clone()))
                .collect::<Vec<_>>())
        });

        methods.add_method("FindFirstChild", |_, this, name: String| {
            this.alive_or_err()?;
            let tree = this.tree.read();
            Ok(tree
                .children(this.id)
                .iter()
                .find(|&&c| tree.get(c).map(|n| n.name == name).unwrap_or(false))
                .map(|&c| NodeHandle::new(c, this.tree.clone())))
        });

        methods.add_method("GetAttribute", |lua, this, name: String| {
            this.alive_or_err()?;
            let tree = this.tree.read();
            match tree.get(this.id).and_then(|n| n.get_attribute(&name)) {
                Some(value) => attribute_to_lua(lua, value),
                None => Ok(Value::Nil),
            }
        });

        methods.add_method("SetAttribute", |_, this, (name, value): (String, Value)| {
            this.alive_or_err()?;
            let attr = attribute_from_lua(&value).map_err(script_err_to_lua)?;
            let mut tree = this.tree.write();
            if let Some(node) = tree.get_mut(this.id) {
                node.set_attribute(name, attr);
            }
            Ok(())
        });

        methods.add_method("Destroy", |_, this, ()| {
            this.tree.write().despawn(this.id).ok();
            Ok(())
        });

        // -- Part properties --------------------------------------------------

        methods.add_method("GetCFrame", |lua, this, ()| {
            this.alive_or_err()?;
            let tree = this.tree.read();
            let part = with_part(&tree, this.id)?;
            cframe_to_lua(lua, part.cframe)
        });

        methods.add_method("SetCFrame", |_, this, value: Value| {
            let cframe = cframe_from_lua(&value).map_err(script_err_to_lua)?;
            let mut tree = this.tree.write();
            let part = with_part_mut(&mut tree, this.id)?;
            part.set_cframe(cframe);
            Ok(())
        });

        methods.add_method("GetSize", |lua, this, ()| {
            let tree = this.tree.read();
            let part = with_part(&tree, this.id)?;
            vec3_to_lua(lua, part.size)
        });

        methods.add_method("SetSize", |_, this, value: Value| {
            let size = vec3_from_lua(&value).map_err(script_err_to_lua)?;
            let mut tree = this.tree.write();
            let part = with_part_mut(&mut tree, this.id)?;
            part.set_size(size);
            Ok(())
        });

        methods.add_method("GetVelocity", |lua, this, ()| {
            let tree = this.tree.read();
            let part = with_part(&tree, this.id)?;
            vec3_to_lua(lua, part.velocity)
        });

        methods.add_method("SetVelocity", |_, this, value: Value| {
            let velocity = vec3_from_lua(&value).map_err(script_err_to_lua)?;
            let mut tree = this.tree.write();
            let part = with_part_mut(&mut tree, this.id)?;
            part.set_velocity(velocity);
            Ok(())
        });

        methods.add_method("GetAnchored", |_, this, ()| {
            let tree = this.tree.read();
            Ok(with_part(&tree, this.id)?.anchored)
        });

        methods.add_method("SetAnchored", |_, this, anchored: bool| {
            let mut tree = this.tree.write();
            with_part_mut(&mut tree, this.id)?.set_anchored(anchored);
            Ok(())
        });

        methods.add_method("GetCanCollide", |_, this, ()| {
            let tree = this.tree.read();
            Ok(with_part(&tree, this.id)?.can_collide)
        });

        methods.add_method("SetCanCollide", |_, this, can_collide: bool| {
            let mut tree = this.tree.write();
            with_part_mut(&mut tree, this.id)?.set_can_collide(can_collide);
            Ok(())
        });

        methods.add_method("SetShape", |_, this, shape: String| {
            let shape = parse_shape(&shape).map_err(script_err_to_lua)?;
            let mut tree = this.tree.write();
            with_part_mut(&mut tree, this.id)?.set_shape(shape);
            Ok(())
        });

        // -- Humanoid properties ------------------------------------------------

        methods.add_method("GetHealth", |_, this, ()| {
            let tree = this.tree.read();
            let node = tree.get(this.id).ok_or_else(|| part_not_found(this.id))?;
            let humanoid = node.kind.as_humanoid().ok_or_else(|| part_not_found(this.id))?;
            Ok(humanoid.health)
        });

        methods.add_method("ApplyHealthDelta", |_, this, delta: f64| {
            let mut tree = this.tree.write();
            let node = tree.get_mut(this.id).ok_or_else(|| part_not_found(this.id))?;
            let humanoid = node.kind.as_humanoid_mut().ok_or_else(|| part_not_found(this.id))?;
            Ok(humanoid.apply_health_delta(delta))
        });

        methods.add_method("MoveTo", |_, this, value: Value| {
            let target = vec3_from_lua(&value).map_err(script_err_to_lua)?;
            let mut tree = this.tree.write();
            let node = tree.get_mut(this.id).ok_or_else(|| part_not_found(this.id))?;
            let humanoid = node.kind.as_humanoid_mut().ok_or_else(|| part_not_found(this.id))?;
            humanoid.request_move_to(target);
            Ok(())
        });

        methods.add_method("Jump", |_, this, ()| {
            let mut tree = this.tree.write();
            let node = tree.get_mut(this.id).ok_or_else(|| part_not_found(this.id))?;
            let humanoid = node.kind.as_humanoid_mut().ok_or_else(|| part_not_found(this.id))?;
            humanoid.request_jump();
            Ok(())
        });

        // -- Player properties --------------------------------------------------

        methods.add_method("GetAgentId", |_, this, ()| {
            let tree = this.tree.read();
            let node = tree.get(this.id).ok_or_else(|| part_not_found(this.id))?;
            let player = node.kind.as_player().ok_or_else(|| part_not_found(this.id))?;
            Ok(player.agent_id.clone())
        });

        methods.add_method("GetCharacter", |_, this, ()| {
            let tree = this.tree.read();
            let node = tree.get(this.id).ok_or_else(|| part_not_found(this.id))?;
            let player = node.kind.as_player().ok_or_else(|| part_not_found(this.id))?;
            Ok(player.character_root.map(|c| NodeHandle::new(c, this.tree.clone())))
        });

        methods.add_method("Kick", |_, this, message: String| {
            let mut tree = this.tree.write();
            let node = tree.get_mut(this.id).ok_or_else(|| part_not_found(this.id))?;
            let player = node.kind.as_player_mut().ok_or_else(|| part_not_found(this.id))?;
            player.queue_kick(atrium_tree::prelude::KickReason::Script(message));
            Ok(())
        });

        // -- Signals --------------------------------------------------------

        methods.add_method(
            "Connect",
            |lua, this, (signal_name, callback): (String, mlua::Function)| {
                this.alive_or_err()?;
                let lua_clone = lua.clone();
                let tree_clone = this.tree.clone();
                let mut tree = this.tree.write();
                let node = tree.get_mut(this.id).ok_or_else(|| part_not_found(this.id))?;
                let conn = node.signal_mut(&signal_name).connect(move |args| {
                    let lua_args: Vec<Value> = args
                        .iter()
                        .map(|a| signal_arg_to_lua(&lua_clone, &tree_clone, a))
                        .collect::<mlua::Result<_>>()
                        .map_err(|e| e.to_string())?;
                    callback
                        .call::<()>(mlua::MultiValue::from_vec(lua_args))
                        .map_err(|e| e.to_string())
                });
                drop(tree);
                Ok(SignalConnection {
                    tree: this.tree.clone(),
                    node: this.id,
                    signal: signal_name,
                    connection: conn,
                })
            },
        );
    }
}

/// A live connection to a node's signal, returned by `NodeHandle::Connect`.
/// Scripts call `:Disconnect()` on it to stop receiving that signal.
pub struct SignalConnection {
    tree: Arc<RwLock<SceneTree>>,
    node: NodeId,
    signal: String,
    connection: Connection,
}

impl UserData for SignalConnection {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("Disconnect", |_, this, ()| {
            let mut tree = this.tree.write();
            if let Some(node) = tree.get_mut(this.node) {
                node.signal_mut(&this.signal).disconnect(this.connection);
            }
            Ok(())
        });
    }
}

fn signal_arg_to_lua(lua: &Lua, tree: &Arc<RwLock<SceneTree>>, arg: &SignalArg) -> mlua::Result<Value> {
    match arg {
        SignalArg::Node(id) => {
            let handle = NodeHandle::new(*id, tree.clone());
            Ok(Value::UserData(lua.create_userdata(handle)?))
        }
        SignalArg::Number(n) => Ok(Value::Number(*n)),
        SignalArg::Text(s) => Ok(Value::String(lua.create_string(s)?)),
        SignalArg::Position(v) => vec3_to_lua(lua, *v),
    }
}

fn with_part<'a>(tree: &'a SceneTree, id: NodeId) -> mlua::Result<&'a PartData> {
    tree.get(id)
        .and_then(|n| n.kind.as_part())
        .ok_or_else(|| part_not_found(id))
}

fn with_part_mut<'a>(tree: &'a mut SceneTree, id: NodeId) -> mlua::Result<&'a mut PartData> {
    tree.get_mut(id)
        .and_then(|n| n.kind.as_part_mut())
        .ok_or_else(|| part_not_found(id))
}

fn parse_shape(name: &str) -> Result<PartShape, ScriptError> {
    match name {
        "Box" => Ok(PartShape::Box),
        "Ball" => Ok(PartShape::Ball),
        "Cylinder" => Ok(PartShape::Cylinder),
        "Wedge" => Ok(PartShape::Wedge),
        other => Err(ScriptError::ValueError(format!("unknown part shape '{other}'"))),
    }
}

fn script_err_to_lua(err: ScriptError) -> mlua::Error {
    mlua::Error::RuntimeError(err.to_string())
}

/// Build a fresh Part node under `parent`, matching the factory described in
/// §4.2 ("construction of new nodes via a factory that records them in the
/// tree and, for Parts, schedules physics creation"). Physics creation
/// itself happens in the tick pipeline's sync step (step 3), driven by
/// `SceneTree::physics_tracked_ids`.
pub fn spawn_part(
    tree: &Arc<RwLock<SceneTree>>,
    parent: NodeId,
    name: &str,
    shape: PartShape,
    size: atrium_tree::prelude::Vec3,
    cframe: atrium_tree::prelude::CFrame,
) -> Result<NodeHandle, ScriptError> {
    let mut guard = tree.write();
    let id = guard
        .spawn(parent, name, NodeKind::Part(PartData::new(shape, size, cframe)))
        .map_err(|e| ScriptError::ValueError(e.to_string()))?;
    drop(guard);
    Ok(NodeHandle::new(id, tree.clone()))
}
