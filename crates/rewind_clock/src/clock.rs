//! Frame clock running on a dedicated thread.

use crate::error::Result;
use crate::pacer::{tick_duration, Pacer};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Rate used when the caller supplies a non-positive one.
pub const DEFAULT_RATE: f64 = 60.0;

/// Upper bound for any single wait of the tick loop, including while paused.
pub const MAX_WAIT: Duration = Duration::from_secs(5);

/// Replace a non-positive or non-finite rate with [`DEFAULT_RATE`].
pub fn normalize_rate(rate: f64) -> f64 {
    if rate.is_finite() && rate > 0.0 {
        rate
    } else {
        DEFAULT_RATE
    }
}

/// Receives the ticks emitted by a [`FrameClock`].
///
/// Both methods run on the clock thread and should return well within one
/// tick duration.
pub trait ClockCallback: Send + Sync {
    /// The next step is forward.
    fn on_advance(&self);

    /// The next step is backward.
    fn on_rewind(&self);
}

#[derive(Debug)]
struct ClockState {
    speed: f64,
    stopping: bool,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<ClockState>,
    wake: Condvar,
}

/// Fixed-rate scheduler with a signed speed factor.
///
/// - `speed == 0`: paused, nothing is emitted
/// - `speed > 0`: `on_advance` at `rate * speed` ticks per second
/// - `speed < 0`: `on_rewind` at `rate * |speed|` ticks per second
///
/// The clock starts paused.
pub struct FrameClock {
    rate: f64,
    shared: Arc<Shared>,
    callback: Arc<dyn ClockCallback>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl FrameClock {
    /// Create a stopped clock ticking at `rate` per second.
    pub fn new(callback: Arc<dyn ClockCallback>, rate: f64) -> Self {
        let normalized = normalize_rate(rate);
        if normalized != rate {
            tracing::warn!(rate, "invalid clock rate, using {DEFAULT_RATE}");
        }
        let rate = normalized;

        Self {
            rate,
            shared: Arc::new(Shared {
                state: Mutex::new(ClockState {
                    speed: 0.0,
                    stopping: false,
                }),
                wake: Condvar::new(),
            }),
            callback,
            thread: Mutex::new(None),
        }
    }

    /// Target rate in ticks per second at speed 1.0.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Whether the tick thread is alive.
    pub fn is_running(&self) -> bool {
        self.thread.lock().is_some()
    }

    /// Spawn the tick thread. Does nothing if it is already running.
    pub fn start(&self) -> Result<()> {
        let mut thread = self.thread.lock();
        if thread.is_some() {
            return Ok(());
        }

        self.shared.state.lock().stopping = false;

        let shared = Arc::clone(&self.shared);
        let callback = Arc::clone(&self.callback);
        let rate = self.rate;
        let handle = thread::Builder::new()
            .name("frame-clock".to_string())
            .spawn(move || run(&shared, callback.as_ref(), rate))?;
        *thread = Some(handle);

        tracing::debug!(rate, "frame clock started");
        Ok(())
    }

    /// Stop the tick thread and wait for it to exit.
    ///
    /// Returns promptly even while paused. Calling this from inside a
    /// callback only requests the stop.
    pub fn stop(&self) {
        let Some(handle) = self.thread.lock().take() else {
            return;
        };

        self.shared.state.lock().stopping = true;
        self.shared.wake.notify_all();

        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            tracing::warn!("frame clock thread panicked");
        }

        tracing::debug!("frame clock stopped");
    }

    /// Set the signed speed factor. Takes effect at the next wake, which
    /// happens immediately.
    pub fn set_speed(&self, speed: f64) {
        let speed = if speed.is_finite() { speed } else { 0.0 };
        self.shared.state.lock().speed = speed;
        self.shared.wake.notify_all();

        tracing::trace!(speed, "clock speed changed");
    }

    /// The last speed factor set.
    pub fn speed(&self) -> f64 {
        self.shared.state.lock().speed
    }

    /// Shorthand for `set_speed(0.0)`.
    pub fn pause_async(&self) {
        self.set_speed(0.0);
    }
}

impl Drop for FrameClock {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for FrameClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameClock")
            .field("rate", &self.rate)
            .field("speed", &self.speed())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

fn run(shared: &Shared, callback: &dyn ClockCallback, rate: f64) {
    let mut pacer = Pacer::new();
    let mut state = shared.state.lock();

    loop {
        if state.stopping {
            break;
        }

        let speed = state.speed;
        if speed == 0.0 {
            pacer.reset();
            shared.wake.wait_for(&mut state, MAX_WAIT);
            continue;
        }

        let tick = tick_duration(rate, speed);
        let now = Instant::now();
        if let Some(deadline) = pacer.deadline(tick) {
            if now < deadline {
                // Re-checked after every wake, the speed may have changed
                shared.wake.wait_for(&mut state, (deadline - now).min(MAX_WAIT));
                continue;
            }
        }

        pacer.mark_tick(now, tick);
        MutexGuard::unlocked(&mut state, || {
            if speed > 0.0 {
                callback.on_advance();
            } else {
                callback.on_rewind();
            }
        });
    }
}
