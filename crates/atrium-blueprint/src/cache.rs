//! Blueprint config cache (§4.6 `blueprint_config_cache`).
//!
//! Parsed once per blueprint id, then reused by every `find_or_create_instance`
//! call -- re-reading `world.toml` on every admission would put disk I/O on
//! the hot join path.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use crate::assets::{scan_assets, AssetEntry};
use crate::config::WorldConfig;
use crate::error::BlueprintError;

/// Everything the fleet controller needs to create an instance of one
/// blueprint: its parsed config, its entry script source, and its asset list.
#[derive(Debug, Clone)]
pub struct BlueprintConfig {
    pub blueprint_id: String,
    pub world: WorldConfig,
    pub entry_script_source: String,
    pub assets: Vec<AssetEntry>,
    pub asset_version: u64,
}

impl BlueprintConfig {
    fn load(blueprint_id: &str, blueprint_dir: &Path) -> Result<Self, BlueprintError> {
        let world = WorldConfig::load(blueprint_dir)?;
        let script_path = world.entry_script_path(blueprint_dir);
        let entry_script_source = fs::read_to_string(&script_path).map_err(|e| BlueprintError::Io {
            path: script_path,
            source: e,
        })?;
        let assets = scan_assets(blueprint_dir);
        Ok(Self {
            blueprint_id: blueprint_id.to_owned(),
            world,
            entry_script_source,
            asset_version: 1,
            assets,
        })
    }
}

/// Maps `blueprint_id -> BlueprintConfig`, loading each blueprint from disk
/// at most once. `blueprints_root/<blueprint_id>/` is the on-disk layout.
pub struct BlueprintCache {
    blueprints_root: PathBuf,
    entries: DashMap<String, Arc<BlueprintConfig>>,
}

impl BlueprintCache {
    pub fn new(blueprints_root: impl Into<PathBuf>) -> Self {
        Self {
            blueprints_root: blueprints_root.into(),
            entries: DashMap::new(),
        }
    }

    /// The directory one blueprint's files live under (§6 on-disk layout).
    /// Used for serving files a blueprint carries verbatim, like `skill.md`,
    /// that aren't part of the parsed [`BlueprintConfig`].
    pub fn blueprint_dir(&self, blueprint_id: &str) -> PathBuf {
        self.blueprints_root.join(blueprint_id)
    }

    /// Return the cached config for `blueprint_id`, loading it from disk on
    /// first access.
    pub fn get_or_load(&self, blueprint_id: &str) -> Result<Arc<BlueprintConfig>, BlueprintError> {
        if let Some(existing) = self.entries.get(blueprint_id) {
            return Ok(existing.clone());
        }
        let dir = self.blueprints_root.join(blueprint_id);
        if !dir.is_dir() {
            return Err(BlueprintError::NotFound(dir));
        }
        let config = Arc::new(BlueprintConfig::load(blueprint_id, &dir)?);
        self.entries.insert(blueprint_id.to_owned(), config.clone());
        tracing::debug!(blueprint_id, "blueprint config cached");
        Ok(config)
    }

    /// Drop a cached entry so the next `get_or_load` re-reads from disk.
    /// Used by tooling that hot-reloads a blueprint's script during
    /// development; not on any request path.
    pub fn invalidate(&self, blueprint_id: &str) {
        self.entries.remove(blueprint_id);
    }
}
