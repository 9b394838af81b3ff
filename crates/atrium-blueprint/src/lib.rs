//! atrium-blueprint -- the blueprint loader and config cache (§6).
//!
//! A blueprint is a directory: `world.toml` plus an entry script plus an
//! `assets/` tree. [`cache::BlueprintCache`] loads one once per process and
//! hands the fleet controller an [`cache::BlueprintConfig`] it can clone
//! cheaply for every `find_or_create_instance` call.

#![deny(unsafe_code)]

pub mod assets;
pub mod cache;
pub mod config;
pub mod error;

pub mod prelude {
    pub use crate::assets::{scan_assets, AssetEntry};
    pub use crate::cache::{BlueprintCache, BlueprintConfig};
    pub use crate::config::WorldConfig;
    pub use crate::error::BlueprintError;
}
