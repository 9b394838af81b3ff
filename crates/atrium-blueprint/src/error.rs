//! Errors produced while loading a blueprint (§6 on-disk layout).

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BlueprintError {
    #[error("blueprint directory not found: {0}")]
    NotFound(PathBuf),

    #[error("world.toml missing at {0}")]
    MissingWorldToml(PathBuf),

    #[error("world.toml at {path} failed to parse: {source}")]
    InvalidWorldToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("world.toml at {path} has max_players={value}, must be > 0")]
    InvalidMaxPlayers { path: PathBuf, value: i64 },

    #[error("entry script '{script}' referenced by world.toml not found at {path}")]
    MissingEntryScript { script: String, path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
