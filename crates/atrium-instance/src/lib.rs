//! Atrium Engine -- single game-instance runtime.
//!
//! An [`instance::Instance`] owns one blueprint's running world: a scene
//! tree, a physics world, a character-movement world, and a script host,
//! driven by the fixed eleven-step tick pipeline. This crate knows nothing
//! about other instances, admission, or matchmaking -- that's `atrium-fleet`
//! one layer up. It also builds agent/spectator observations on request and
//! queues inbound agent actions for the next tick.

#![deny(unsafe_code)]

pub mod action;
pub mod diagnostics;
pub mod error;
pub mod instance;
pub mod observation;
pub mod state;

pub mod prelude {
    pub use crate::action::{AgentAction, ActionQueue};
    pub use crate::diagnostics::TickDiagnostics;
    pub use crate::error::InstanceError;
    pub use crate::instance::Instance;
    pub use crate::observation::{
        parse_asset_url, rewrite_asset_url, AgentObservation, EntityView, LightView,
        ObservationCache, PlayerSummary, SpectatorDelta, SpectatorSnapshot,
    };
    pub use crate::state::InstanceState;
}
