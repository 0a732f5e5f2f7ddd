// src/pipeline/clock.rs

use std::time::Duration;

use tokio::time::Instant;

/// Arrival counter unit: elapsed time divided by the clock resolution.
pub type Tick = u64;

/// Monotonic tick source anchored at construction time.
///
/// Built on `tokio::time::Instant`, so tests running with paused time see
/// ticks advance exactly as the runtime clock is advanced.
#[derive(Debug, Clone, Copy)]
pub struct TickClock {
    origin: Instant,
    resolution: Duration,
}

impl TickClock {
    /// `resolution` is clamped to at least one nanosecond.
    pub fn new(resolution: Duration) -> Self {
        Self {
            origin: Instant::now(),
            resolution: resolution.max(Duration::from_nanos(1)),
        }
    }

    pub fn resolution(&self) -> Duration {
        self.resolution
    }

    /// Current tick.
    pub fn now(&self) -> Tick {
        self.ticks_in(self.origin.elapsed())
    }

    /// Whole ticks contained in `d` (rounded down).
    pub fn ticks_in(&self, d: Duration) -> Tick {
        (d.as_nanos() / self.resolution.as_nanos()) as Tick
    }

    /// Wall time spanned by `ticks`.
    pub fn duration_of(&self, ticks: Tick) -> Duration {
        self.resolution.saturating_mul(ticks.min(u32::MAX as u64) as u32)
    }
}
