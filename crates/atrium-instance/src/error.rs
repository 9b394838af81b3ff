//! Error type for `atrium-instance` (§7: `EngineFatal`).
//!
//! Anything raised here tears down the instance -- script faults never reach
//! this type, they're contained inside [`atrium_script::prelude::ScriptHost`]
//! and surfaced as [`atrium_tree::prelude::FireOutcome::Faulted`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("physics step failed: {0}")]
    Physics(#[from] atrium_physics::prelude::PhysicsError),

    #[error("script host construction failed: {0}")]
    Script(#[from] atrium_script::prelude::ScriptError),

    #[error("scene tree invariant violated: {0}")]
    TreeInvariant(String),

    #[error("engine core panicked during tick stage '{stage}'")]
    EnginePanic { stage: &'static str },

    #[error("blueprint has no players service or workspace")]
    MissingWellKnownNode,
}
