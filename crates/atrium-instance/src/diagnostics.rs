//! Per-tick timing diagnostics (§5 "instance tick overrun is reported").
//!
//! Mirrors the shape of a fixed-timestep engine's per-system timing report,
//! just keyed by pipeline stage name instead of system name.

use std::time::Duration;

/// Wall-clock timing for one completed tick, stage by stage in pipeline
/// order. `overrun` is `total_time` minus the configured tick period, clamped
/// to zero -- positive means this tick ran long; §5 says that's logged, not
/// fatal.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    pub tick: u64,
    pub stage_times: Vec<(&'static str, Duration)>,
    pub total_time: Duration,
    pub overrun: Duration,
}

impl TickDiagnostics {
    pub fn record(&mut self, stage: &'static str, elapsed: Duration) {
        self.stage_times.push((stage, elapsed));
    }

    pub fn finish(&mut self, tick: u64, tick_period: Duration) {
        self.tick = tick;
        self.total_time = self.stage_times.iter().map(|(_, d)| *d).sum();
        self.overrun = self.total_time.saturating_sub(tick_period);
        if self.overrun > Duration::ZERO {
            tracing::warn!(
                tick,
                total_ms = self.total_time.as_secs_f64() * 1000.0,
                overrun_ms = self.overrun.as_secs_f64() * 1000.0,
                "tick overran its period"
            );
        }
    }
}
