//! The polymorphic scene node (§3).
//!
//! Every node -- regardless of class -- carries an id, a name, a parent
//! pointer, an ordered child list, string-keyed attributes, and a set of
//! named signals. Class-specific state lives in [`NodeKind`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::humanoid::HumanoidData;
use crate::node_id::NodeId;
use crate::part::PartData;
use crate::player::PlayerData;
use crate::signal::Signal;
use crate::value::{AttributeValue, Color};

/// A point or spot light, kept minimal -- enough for spectator lighting
/// (§4.5 observation builder: "lights, lighting globals").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LightKind {
    Point,
    Spot,
    Directional,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightData {
    pub kind: LightKind,
    pub color: Color,
    pub brightness: f64,
    pub range: f64,
}

impl Default for LightData {
    fn default() -> Self {
        Self {
            kind: LightKind::Point,
            color: Color::WHITE,
            brightness: 1.0,
            range: 16.0,
        }
    }
}

/// Class-specific payload. `Model` and `Folder` are pure grouping nodes and
/// carry no extra state beyond the common [`Node`] fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Part(PartData),
    Humanoid(HumanoidData),
    Player(PlayerData),
    Model,
    Folder,
    Light(LightData),
    /// A named service singleton (`Workspace`, `RunService`, `Players`,
    /// `PersistenceService`, ...). Holds only its service name; behavior
    /// lives in `atrium-script`'s service registry.
    Service(String),
}

impl NodeKind {
    pub fn class_name(&self) -> &'static str {
        match self {
            NodeKind::Part(_) => "Part",
            NodeKind::Humanoid(_) => "Humanoid",
            NodeKind::Player(_) => "Player",
            NodeKind::Model => "Model",
            NodeKind::Folder => "Folder",
            NodeKind::Light(_) => "Light",
            NodeKind::Service(_) => "Service",
        }
    }

    pub fn as_part(&self) -> Option<&PartData> {
        match self {
            NodeKind::Part(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_part_mut(&mut self) -> Option<&mut PartData> {
        match self {
            NodeKind::Part(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_humanoid(&self) -> Option<&HumanoidData> {
        match self {
            NodeKind::Humanoid(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_humanoid_mut(&mut self) -> Option<&mut HumanoidData> {
        match self {
            NodeKind::Humanoid(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_player(&self) -> Option<&PlayerData> {
        match self {
            NodeKind::Player(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut PlayerData> {
        match self {
            NodeKind::Player(p) => Some(p),
            _ => None,
        }
    }
}

/// A scene node. Owned by a [`crate::tree::SceneTree`], which is the sole
/// authority on parent/child wiring; `parent`/`children` here reflect that
/// bookkeeping and must never be mutated directly outside the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub attributes: HashMap<String, AttributeValue>,
    #[serde(skip)]
    pub signals: HashMap<String, Signal>,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(id: NodeId, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id,
            name: name.into(),
            parent: None,
            children: Vec::new(),
            attributes: HashMap::new(),
            signals: HashMap::new(),
            kind,
        }
    }

    pub fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.attributes.insert(key.into(), value);
    }

    pub fn get_attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Look up a named signal, creating it (empty) on first access -- this
    /// matches Roblox-style `instance.Touched` returning a stable signal
    /// object the first time it's read, not only after something connects.
    pub fn signal_mut(&mut self, name: &str) -> &mut Signal {
        self.signals.entry(name.to_owned()).or_default()
    }
}
