//! Error type for `atrium-physics`.
//!
//! Operations on an unknown or stale [`NodeId`](atrium_tree::prelude::NodeId)
//! are no-ops, not errors (§4.1) -- this type exists only for the rare case
//! where stepping the simulation itself cannot proceed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PhysicsError {
    #[error("timestep must be positive, got {0}")]
    InvalidTimestep(f64),
}
