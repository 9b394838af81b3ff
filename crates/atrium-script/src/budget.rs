//! Per-callback instruction budget (§12, mirroring a fuel meter).
//!
//! Luau has no fuel counter like Wasmtime's, so the same effect is built on
//! top of a debug hook: every [`CHECK_INTERVAL`] instructions the hook adds
//! to a shared counter and bails with an error once the counter passes the
//! configured budget. [`InstructionBudget::reset`] is called before every
//! callback invocation so the budget applies per-call, not cumulatively.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use mlua::{HookTriggers, Lua};

/// Instructions between hook invocations. Smaller means tighter budget
/// enforcement at a higher overhead cost; 10,000 keeps overhead low while
/// still catching runaway loops well before they hang a tick.
const CHECK_INTERVAL: u32 = 10_000;

#[derive(Clone)]
pub struct InstructionBudget {
    consumed: Arc<AtomicU64>,
    budget: u64,
}

impl InstructionBudget {
    /// Install the hook on `lua`, returning a handle used to reset the
    /// counter before each tracked callback.
    pub fn install(lua: &Lua, budget: u64) -> mlua::Result<Self> {
        let consumed = Arc::new(AtomicU64::new(0));
        let this = Self { consumed: consumed.clone(), budget };

        lua.set_hook(
            HookTriggers::new().every_nth_instruction(CHECK_INTERVAL),
            move |_lua, _debug| {
                let total = consumed.fetch_add(CHECK_INTERVAL as u64, Ordering::Relaxed) + CHECK_INTERVAL as u64;
                if total > budget {
                    return Err(mlua::Error::RuntimeError(format!(
                        "instruction budget of {budget} exceeded"
                    )));
                }
                Ok(mlua::VmState::Continue)
            },
        );
        Ok(this)
    }

    /// Reset the consumed counter to zero. Call this immediately before
    /// invoking a callback so its budget doesn't inherit spend from the
    /// previous one.
    pub fn reset(&self) {
        self.consumed.store(0, Ordering::Relaxed);
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tight_budget_aborts_a_busy_loop() {
        let lua = Lua::new();
        let budget = InstructionBudget::install(&lua, 1_000).unwrap();
        budget.reset();
        let result: mlua::Result<()> = lua.load("local x = 0 for i = 1, 10000000 do x = x + i end").exec();
        assert!(result.is_err(), "busy loop should be interrupted by the instruction budget");
    }

    #[test]
    fn reset_allows_a_fresh_budget_for_the_next_call() {
        let lua = Lua::new();
        let budget = InstructionBudget::install(&lua, 50_000_000).unwrap();
        budget.reset();
        let result: mlua::Result<()> = lua.load("local x = 0 for i = 1, 100 do x = x + i end").exec();
        assert!(result.is_ok());
        budget.reset();
        let result2: mlua::Result<()> = lua.load("local x = 0 for i = 1, 100 do x = x + i end").exec();
        assert!(result2.is_ok());
    }
}
