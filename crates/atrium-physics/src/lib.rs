//! atrium-physics -- the 3D rigid-body simulation backing one instance's
//! Workspace (§4.1).
//!
//! [`world::PhysicsWorld`] wraps a rapier3d pipeline keyed by
//! [`atrium_tree::prelude::NodeId`] instead of rapier handles, and
//! [`character::CharacterWorld`] layers kinematic character movement on top
//! using the same collider set.

#![deny(unsafe_code)]

pub mod character;
pub mod convert;
pub mod error;
pub mod shape;
pub mod world;

pub mod prelude {
    pub use crate::character::{CharacterMoveResult, CharacterWorld};
    pub use crate::error::PhysicsError;
    pub use crate::world::{ContactDelta, ContactPair, PhysicsWorld, RaycastHit};
}
