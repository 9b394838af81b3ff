//! Errors produced by script host operations (§4.2, §7).

/// Errors produced by loading or running a blueprint's scripts.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// The main script's source could not be compiled.
    #[error("script compilation failed: {0}")]
    CompileError(String),

    /// A script attribute, argument, or return value had the wrong shape.
    #[error("script value error: {0}")]
    ValueError(String),

    /// A callback was cut off by its per-callback instruction budget.
    #[error("callback exceeded its instruction budget ({budget} instructions)")]
    BudgetExceeded { budget: u64 },

    /// A callback raised a Lua error (runtime fault, not a budget cutoff).
    #[error("callback faulted: {0}")]
    CallbackFault(String),

    /// A general Lua runtime error outside of a tracked callback (e.g. the
    /// one-shot load of the main chunk).
    #[error("script runtime error: {0}")]
    Runtime(String),
}

impl From<mlua::Error> for ScriptError {
    fn from(err: mlua::Error) -> Self {
        ScriptError::Runtime(err.to_string())
    }
}
