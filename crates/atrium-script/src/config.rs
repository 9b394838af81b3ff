//! Script host configuration (§4.2, §12 fuel-style budget).

/// Configuration for one instance's script host.
///
/// Mirrors the shape of a fuel budget: a per-callback instruction cap that
/// resets before every signal fire, and a fault-tolerance threshold before a
/// misbehaving callback is permanently disconnected.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ScriptConfig {
    /// Luau instructions a single callback invocation may execute before it
    /// is interrupted. Default: 2,000,000.
    pub instruction_budget_per_callback: u64,

    /// Consecutive faults (budget cutoff or runtime error) a callback may
    /// accumulate before it is disconnected. Matches
    /// [`atrium_tree::signal::MAX_CONSECUTIVE_FAULTS`]. Default: 3.
    pub max_consecutive_faults: u8,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            instruction_budget_per_callback: 2_000_000,
            max_consecutive_faults: 3,
        }
    }
}
