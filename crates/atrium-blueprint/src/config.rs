//! `world.toml` parsing (§6: "`world.toml`: `name`, `max_players`, optional
//! `description`, and `[scripts] main`").

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::BlueprintError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptsConfig {
    pub main: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    pub name: String,
    pub max_players: i64,
    #[serde(default)]
    pub description: Option<String>,
    pub scripts: ScriptsConfig,
}

impl WorldConfig {
    /// Parse and validate `<blueprint_dir>/world.toml`, including that
    /// `max_players > 0` and the entry script named in `[scripts] main`
    /// actually exists on disk.
    pub fn load(blueprint_dir: &Path) -> Result<Self, BlueprintError> {
        let path = blueprint_dir.join("world.toml");
        if !path.exists() {
            return Err(BlueprintError::MissingWorldToml(path));
        }
        let raw = fs::read_to_string(&path).map_err(|e| BlueprintError::Io {
            path: path.clone(),
            source: e,
        })?;
        let config: WorldConfig =
            toml::from_str(&raw).map_err(|e| BlueprintError::InvalidWorldToml { path: path.clone(), source: e })?;

        if config.max_players <= 0 {
            return Err(BlueprintError::InvalidMaxPlayers { path, value: config.max_players });
        }

        let script_path = blueprint_dir.join(&config.scripts.main);
        if !script_path.exists() {
            return Err(BlueprintError::MissingEntryScript {
                script: config.scripts.main.clone(),
                path: script_path,
            });
        }

        Ok(config)
    }

    pub fn entry_script_path(&self, blueprint_dir: &Path) -> PathBuf {
        blueprint_dir.join(&self.scripts.main)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_blueprint(dir: &Path, toml: &str, script: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("world.toml"), toml).unwrap();
        let mut f = fs::File::create(dir.join(script)).unwrap();
        f.write_all(b"-- entry").unwrap();
    }

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("atrium-blueprint-test-{name}-{}", std::process::id()))
    }

    #[test]
    fn loads_a_valid_world_toml() {
        let dir = temp_dir("valid");
        write_blueprint(
            &dir,
            "name = \"Arena\"\nmax_players = 8\n\n[scripts]\nmain = \"main.luau\"\n",
            "main.luau",
        );
        let config = WorldConfig::load(&dir).unwrap();
        assert_eq!(config.name, "Arena");
        assert_eq!(config.max_players, 8);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn rejects_zero_max_players() {
        let dir = temp_dir("zero-players");
        write_blueprint(
            &dir,
            "name = \"Arena\"\nmax_players = 0\n\n[scripts]\nmain = \"main.luau\"\n",
            "main.luau",
        );
        let result = WorldConfig::load(&dir);
        assert!(matches!(result, Err(BlueprintError::InvalidMaxPlayers { .. })));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn rejects_missing_entry_script() {
        let dir = temp_dir("missing-script");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("world.toml"),
            "name = \"Arena\"\nmax_players = 8\n\n[scripts]\nmain = \"missing.luau\"\n",
        )
        .unwrap();
        let result = WorldConfig::load(&dir);
        assert!(matches!(result, Err(BlueprintError::MissingEntryScript { .. })));
        fs::remove_dir_all(&dir).ok();
    }
}
