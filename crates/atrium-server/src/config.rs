//! Process-wide runtime configuration (§5, §6).
//!
//! Loaded from environment variables rather than a CLI, since this binary
//! runs one per deployment with no per-invocation arguments to vary -- the
//! same plain-struct-with-`Default` shape the rest of the workspace uses for
//! configuration (`FleetConfig`, `ScriptConfig`), just populated from
//! `std::env` instead of literal defaults.

use std::path::PathBuf;
use std::time::Duration;

use atrium_fleet::prelude::FleetConfig;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub bind_addr: String,
    pub blueprints_root: PathBuf,
    pub persistence_dir: Option<PathBuf>,
    pub tick_hz: f64,
    pub empty_timeout: Duration,
    pub afk_timeout: Duration,
    pub gc_interval: Duration,
    pub flush_interval: Duration,
    pub max_join_retries: u8,
    pub asset_cdn_base: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:7777".to_owned(),
            blueprints_root: PathBuf::from("blueprints"),
            persistence_dir: Some(PathBuf::from("data")),
            tick_hz: 60.0,
            empty_timeout: Duration::from_secs(60),
            afk_timeout: Duration::from_secs(300),
            gc_interval: Duration::from_secs(10),
            flush_interval: Duration::from_secs(30),
            max_join_retries: 4,
            asset_cdn_base: String::new(),
        }
    }
}

/// Error produced by a malformed environment variable. Fatal at startup
/// (exit code 2, §6) -- there is no sane fallback for a value the operator
/// explicitly set wrong.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {name} has an invalid value {value:?}: {reason}")]
    InvalidValue { name: &'static str, value: String, reason: String },
}

impl RuntimeConfig {
    /// Build config from `ATRIUM_*` environment variables, falling back to
    /// [`Default`] for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("ATRIUM_BIND_ADDR") {
            config.bind_addr = v;
        }
        if let Ok(v) = std::env::var("ATRIUM_BLUEPRINTS_ROOT") {
            config.blueprints_root = PathBuf::from(v);
        }
        match std::env::var("ATRIUM_PERSISTENCE_DIR") {
            Ok(v) if v.is_empty() => config.persistence_dir = None,
            Ok(v) => config.persistence_dir = Some(PathBuf::from(v)),
            Err(_) => {}
        }
        if let Ok(v) = std::env::var("ATRIUM_TICK_HZ") {
            config.tick_hz = parse_env("ATRIUM_TICK_HZ", &v)?;
            if config.tick_hz <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    name: "ATRIUM_TICK_HZ",
                    value: v,
                    reason: "must be positive".to_owned(),
                });
            }
        }
        if let Ok(v) = std::env::var("ATRIUM_EMPTY_TIMEOUT_SECS") {
            config.empty_timeout = Duration::from_secs_f64(parse_env("ATRIUM_EMPTY_TIMEOUT_SECS", &v)?);
        }
        if let Ok(v) = std::env::var("ATRIUM_AFK_TIMEOUT_SECS") {
            config.afk_timeout = Duration::from_secs_f64(parse_env("ATRIUM_AFK_TIMEOUT_SECS", &v)?);
        }
        if let Ok(v) = std::env::var("ATRIUM_GC_INTERVAL_SECS") {
            config.gc_interval = Duration::from_secs_f64(parse_env("ATRIUM_GC_INTERVAL_SECS", &v)?);
        }
        if let Ok(v) = std::env::var("ATRIUM_FLUSH_INTERVAL_SECS") {
            config.flush_interval = Duration::from_secs_f64(parse_env("ATRIUM_FLUSH_INTERVAL_SECS", &v)?);
        }
        if let Ok(v) = std::env::var("ATRIUM_MAX_JOIN_RETRIES") {
            config.max_join_retries = parse_env("ATRIUM_MAX_JOIN_RETRIES", &v)?;
        }
        if let Ok(v) = std::env::var("ATRIUM_ASSET_CDN_BASE") {
            config.asset_cdn_base = v;
        }

        Ok(config)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_hz)
    }

    pub fn fleet_config(&self) -> FleetConfig {
        FleetConfig {
            tick_period: self.tick_period(),
            empty_timeout: self.empty_timeout,
            afk_timeout: self.afk_timeout,
            gc_interval: self.gc_interval,
            max_join_retries: self.max_join_retries,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: value.to_owned(),
        reason: "failed to parse".to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_produce_a_sixty_hertz_tick_period() {
        let config = RuntimeConfig::default();
        assert!((config.tick_period().as_secs_f64() - 1.0 / 60.0).abs() < 1e-9);
    }
}
