//! atrium-tree -- the per-instance scene tree.
//!
//! Every running instance owns one [`SceneTree`]: a generational-id arena of
//! [`Node`]s linked by explicit parent/children edges, rooted at a `game`
//! node whose `Workspace` child is the boundary that decides whether a part
//! is physics-tracked. This crate only holds data and tree topology; the
//! physics step, script host, and tick pipeline that act on it live in
//! their own crates.

#![deny(unsafe_code)]

pub mod cframe;
pub mod error;
pub mod humanoid;
pub mod node;
pub mod node_id;
pub mod part;
pub mod player;
pub mod signal;
pub mod tree;
pub mod value;

pub mod prelude {
    pub use crate::cframe::{CFrame, Rotation, Vec3};
    pub use crate::error::TreeError;
    pub use crate::humanoid::HumanoidData;
    pub use crate::node::{LightData, LightKind, Node, NodeKind};
    pub use crate::node_id::{NodeId, NodeIdAllocator};
    pub use crate::part::{PartData, PartShape};
    pub use crate::player::{KickReason, PlayerData};
    pub use crate::signal::{Connection, FireOutcome, Signal, SignalArg};
    pub use crate::tree::SceneTree;
    pub use crate::value::{AttributeValue, Color};
}
