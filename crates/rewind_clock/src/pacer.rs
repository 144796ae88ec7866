//! Deadline arithmetic for the tick loop.
//!
//! Kept free of threads so the drift correction can be tested with synthetic
//! instants.

use std::time::{Duration, Instant};

/// Longest tick the clock will schedule, whatever the speed.
pub(crate) const MAX_TICK: Duration = Duration::from_secs(3600);

/// Duration of one tick at `rate` ticks per second scaled by `|speed|`.
pub(crate) fn tick_duration(rate: f64, speed: f64) -> Duration {
    let secs = 1.0 / (rate * speed.abs());
    Duration::try_from_secs_f64(secs)
        .unwrap_or(MAX_TICK)
        .min(MAX_TICK)
}

fn shift(instant: Instant, secs: f64) -> Instant {
    let offset = Duration::from_secs_f64(secs.abs());
    if secs >= 0.0 {
        instant + offset
    } else {
        instant.checked_sub(offset).unwrap_or(instant)
    }
}

fn signed_secs(later: Instant, earlier: Instant) -> f64 {
    if later >= earlier {
        (later - earlier).as_secs_f64()
    } else {
        -(earlier - later).as_secs_f64()
    }
}

/// Tracks the last emitted tick and the drift carried into the next one.
#[derive(Debug, Default)]
pub(crate) struct Pacer {
    /// Wake time of the last tick. `None` right after a start or a pause.
    last_tick: Option<Instant>,
    /// Signed seconds between the intended deadline of the last tick and the
    /// time it actually fired. Negative when the tick was late.
    drift: f64,
}

impl Pacer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Forget the baseline so the next tick fires immediately.
    pub(crate) fn reset(&mut self) {
        self.last_tick = None;
        self.drift = 0.0;
    }

    /// When the next tick is due, or `None` if it is due now.
    pub(crate) fn deadline(&self, tick: Duration) -> Option<Instant> {
        let last = self.last_tick?;
        let limit = tick.as_secs_f64();
        Some(shift(last + tick, self.drift.clamp(-limit, limit)))
    }

    /// Record a tick fired at `woke`.
    pub(crate) fn mark_tick(&mut self, woke: Instant, tick: Duration) {
        self.drift = match self.deadline(tick) {
            Some(intended) => {
                let limit = tick.as_secs_f64();
                signed_secs(intended, woke).clamp(-limit, limit)
            }
            None => 0.0,
        };
        self.last_tick = Some(woke);
    }
}
