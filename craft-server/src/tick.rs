//! Fixed-rate scheduler driving the game loop at 20Hz. Keeps its own
//! deadline rather than sleeping a flat 50ms every iteration, so a slow
//! tick doesn't compound into permanent drift.

use std::time::{Duration, Instant};

pub const TICK_PERIOD: Duration = Duration::from_millis(1000 / 20);

pub struct TickScheduler {
    next_deadline: Instant,
    tick_count: u64,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self {
            next_deadline: Instant::now() + TICK_PERIOD,
            tick_count: 0,
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Blocks until the next tick is due, then returns how overdue it was
    /// (zero if we were early). Always advances the deadline by one period,
    /// even if several periods have already elapsed, so a long stall is
    /// absorbed as one slow tick rather than a burst of catch-up ticks.
    pub fn wait_for_next_tick(&mut self) -> Duration {
        let now = Instant::now();
        if now < self.next_deadline {
            std::thread::sleep(self.next_deadline - now);
        }
        let overrun = Instant::now().saturating_duration_since(self.next_deadline);
        self.next_deadline += TICK_PERIOD;
        self.tick_count += 1;
        overrun
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `step` and turns a panic into a logged error rather than bringing
/// down the tick thread, so a bug in one subsystem can't stall the others.
pub fn run_isolated(name: &str, step: impl FnOnce()) {
    if let Err(payload) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(step)) {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_owned());
        tracing::error!(subsystem = name, %message, "tick subsystem panicked");
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wait_for_next_tick_advances_the_deadline() {
        let mut scheduler = TickScheduler::new();
        scheduler.wait_for_next_tick();
        assert_eq!(scheduler.tick_count(), 1);
        scheduler.wait_for_next_tick();
        assert_eq!(scheduler.tick_count(), 2);
    }

    #[test]
    fn run_isolated_survives_a_panicking_step() {
        let mut ran_after = false;
        run_isolated("test", || panic!("boom"));
        ran_after = true;
        assert!(ran_after);
    }
}
