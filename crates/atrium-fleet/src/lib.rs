//! Atrium Engine -- fleet controller.
//!
//! A [`fleet::Fleet`] owns every running [`atrium_instance::prelude::Instance`]
//! across every blueprint: admission (`try_join`), matchmaking
//! (`find_or_create_instance`, `spectate_default`/`spectate_player`), garbage
//! collection of empty instances, and the parallel per-tick dispatch loop.
//! `atrium-server` is the only thing above this crate; it never reaches into
//! an instance directly.

#![deny(unsafe_code)]

pub mod admission;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fleet;
pub mod ids;

pub mod prelude {
    pub use crate::config::FleetConfig;
    pub use crate::error::FleetError;
    pub use crate::fleet::Fleet;
    pub use crate::ids::InstanceIdAllocator;
}
