//! atrium-script -- the embedded Luau script host (§4.2).
//!
//! Each running instance owns one [`host::ScriptHost`], wrapping a Luau VM
//! around the instance's shared [`atrium_tree::prelude::SceneTree`]. Scripts
//! see the tree through [`node_api::NodeHandle`] userdata, query services by
//! name (`get_service`), and connect to signals that the tick pipeline fires
//! at fixed points (`fire_pre_physics`, `fire_post_physics`, `fire_signal`).

#![deny(unsafe_code)]

pub mod budget;
pub mod config;
pub mod error;
pub mod host;
pub mod node_api;
pub mod services;
pub mod value_bridge;

pub mod prelude {
    pub use crate::budget::InstructionBudget;
    pub use crate::config::ScriptConfig;
    pub use crate::error::ScriptError;
    pub use crate::host::ScriptHost;
    pub use crate::node_api::{spawn_part, NodeHandle, SignalConnection};
    pub use crate::services::{DataStoreHandle, PersistenceServiceHandle};
}
