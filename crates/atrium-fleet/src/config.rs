//! Fleet-wide tunables (§5, §4.8). Mirrors the plain-struct-with-`Default`
//! shape used throughout this workspace for configuration (e.g.
//! [`atrium_script::prelude::ScriptConfig`]) rather than a builder.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub tick_period: Duration,
    /// How long an instance may sit with zero players before GC destroys it
    /// (§4.6 `empty_since`).
    pub empty_timeout: Duration,
    /// How long an agent may submit no actions before being kicked (§4.8
    /// "AFK eviction").
    pub afk_timeout: Duration,
    /// How often the GC sweep runs.
    pub gc_interval: Duration,
    /// Bounded retries for `try_join` racing a capacity check (§5).
    pub max_join_retries: u8,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs_f64(1.0 / 60.0),
            empty_timeout: Duration::from_secs(60),
            afk_timeout: Duration::from_secs(300),
            gc_interval: Duration::from_secs(10),
            max_join_retries: 4,
        }
    }
}
