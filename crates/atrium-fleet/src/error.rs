//! Top-level error type for the fleet controller (§7).
//!
//! Every error kind named in the error-handling design collapses into one of
//! these variants; lower crates' errors convert in via `#[from]` rather than
//! being matched on directly by callers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FleetError {
    /// Lost a capacity race against another joiner -- recoverable, the
    /// caller should retry against a different (or freshly created)
    /// instance.
    #[error("lost the capacity race joining instance {instance_id}")]
    CapacityRace { instance_id: String },

    /// The instance an agent was routed to no longer exists (finished and
    /// GC'd, or never existed) -- recoverable, the caller should re-resolve.
    #[error("instance {instance_id} is gone")]
    InstanceGone { instance_id: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A blueprint script callback faulted. Contained at the instance level
    /// (§4.2); surfaced here only for logging/telemetry, never terminal.
    #[error("script fault in instance {instance_id}: {message}")]
    ScriptFault { instance_id: String, message: String },

    /// An instance's engine core panicked or its physics step failed; the
    /// instance has transitioned to `Finished` and cannot be joined again.
    #[error("instance {instance_id} suffered an engine fault: {source}")]
    EngineFatal {
        instance_id: String,
        #[source]
        source: atrium_instance::prelude::InstanceError,
    },

    /// The persistence backend is unreachable; gameplay continues against
    /// the in-memory cache, but durability is degraded.
    #[error("persistence degraded: {0}")]
    PersistenceUnavailable(String),

    #[error("blueprint error: {0}")]
    Blueprint(#[from] atrium_blueprint::prelude::BlueprintError),

    #[error("instance construction failed: {0}")]
    Instance(#[from] atrium_instance::prelude::InstanceError),

    /// Admission retries against `InstanceFull`/`CapacityRace` exhausted
    /// `max_join_retries` (§5: "admission retries are bounded... exhaustion
    /// maps to a ServiceBusy response").
    #[error("service busy, all candidate instances are full")]
    ServiceBusy,
}
