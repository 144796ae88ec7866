//! Playback controller.
//!
//! Bridges [`FrameClock`] ticks to a [`SimulationCore`] and mirrors every step
//! into the rewind history.
//!
//! # Locking
//!
//! The core and the playback state (history buffer plus statistics) each sit
//! behind their own mutex. Whenever both are needed the core is locked first.
//! Savestate I/O never runs under the state lock: the history buffer is lent
//! out of the state for the duration, and ticks that arrive meanwhile skip
//! the history step.

use crate::config::{frame_capacity, PlaybackConfig};
use crate::error::{PlayerError, Result};
use crate::savestate::{SavestateReader, SavestateStore, SavestateWriter};
use crate::simulation::SimulationCore;
use crate::stats::PlaybackStats;
use parking_lot::Mutex;
use rewind_clock::{normalize_rate, ClockCallback, FrameClock};
use rewind_history::{HistoryBuffer, HistoryKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct PlaybackState {
    history: Option<Box<dyn HistoryBuffer>>,
    /// The history is currently lent to a savestate operation.
    lent: bool,
    rewind_enabled: bool,
    capacity: usize,
    total_frames: u64,
    stats: PlaybackStats,
}

impl PlaybackState {
    fn update_stats(&mut self, rate: f64) {
        if let Some(history) = self.history.as_deref() {
            self.stats = PlaybackStats::from_history(history, rate);
        }
    }
}

struct Inner {
    core: Mutex<Box<dyn SimulationCore>>,
    state: Mutex<PlaybackState>,
    store: Arc<dyn SavestateStore>,
    core_name: String,
    state_size: usize,
    rate: f64,
    history_kind: HistoryKind,
    rewind_factor: f64,
}

impl Inner {
    fn can_seek(&self) -> bool {
        self.state_size != 0
    }

    fn advance(&self) {
        let mut core = self.core.lock();
        core.run_frame();

        let mut guard = self.state.lock();
        let state = &mut *guard;
        if let Some(history) = state.history.as_mut() {
            match core.serialize(history.begin_frame()) {
                Ok(()) => history.submit_frame(),
                Err(err) => tracing::debug!(%err, "frame not recorded"),
            }
        }
        state.total_frames += 1;
        state.update_stats(self.rate);
    }

    fn rewind(&self) {
        let mut core = self.core.lock();
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if let Some(history) = state.history.as_mut() {
                let moved = history.rewind_frames(1);
                // At the oldest frame the core is pinned there
                if let Some(frame) = history.current_frame() {
                    if let Err(err) = core.deserialize(frame) {
                        tracing::warn!(%err, "failed to restore rewound frame");
                    }
                }
                state.total_frames = state.total_frames.saturating_sub(moved as u64);
            }
            state.update_stats(self.rate);
        }

        core.run_frame();
    }

    fn seek_frames(&self, offset: i64) -> i64 {
        let mut core = self.core.lock();
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(history) = state.history.as_mut() else {
            return 0;
        };

        let distance = offset.unsigned_abs() as usize;
        let moved = if offset > 0 {
            history.advance_frames(distance) as i64
        } else {
            -(history.rewind_frames(distance) as i64)
        };

        if moved != 0 {
            if let Some(frame) = history.current_frame() {
                if let Err(err) = core.deserialize(frame) {
                    tracing::warn!(%err, "failed to restore seeked frame");
                }
            }
        }
        state.total_frames = state.total_frames.saturating_add_signed(moved);
        state.update_stats(self.rate);
        moved
    }

    /// Take the history out of the shared state, or build a transient one.
    ///
    /// The second value is `true` when the buffer was lent and must be
    /// handed back through [`return_history`](Self::return_history).
    fn borrow_history(&self) -> (Box<dyn HistoryBuffer>, bool, u64) {
        let mut state = self.state.lock();
        let total_frames = state.total_frames;
        match state.history.take() {
            Some(history) => {
                state.lent = true;
                (history, true, total_frames)
            }
            None => (
                self.history_kind.create_with(self.state_size, 1),
                false,
                total_frames,
            ),
        }
    }

    fn return_history(&self, mut history: Box<dyn HistoryBuffer>) {
        let mut state = self.state.lock();
        state.lent = false;

        if !state.rewind_enabled {
            tracing::debug!("rewind disabled while lent, dropping history");
            return;
        }
        if history.max_frame_count() != state.capacity {
            history.set_max_frame_count(state.capacity);
        }
        state.history = Some(history);
        state.update_stats(self.rate);
    }

    fn write_savestate(
        &self,
        history: &mut dyn HistoryBuffer,
        total_frames: u64,
    ) -> Result<PathBuf> {
        if history.current_frame().is_none() {
            let mut core = self.core.lock();
            core.serialize(history.begin_frame())?;
            history.submit_frame();
        }
        let state = history
            .current_frame()
            .ok_or_else(|| PlayerError::Transaction("no state to save".to_string()))?;

        let mut writer = self.store.writer();
        let result = commit_savestate(writer.as_mut(), &self.core_name, total_frames, state);
        if result.is_err() {
            writer.clean_up_transaction();
        }
        result
    }

    fn read_savestate(
        &self,
        reader: &mut dyn SavestateReader,
        history: &mut dyn HistoryBuffer,
    ) -> Result<()> {
        let frame = history.begin_frame();
        reader.read_save(frame)?;
        self.core.lock().deserialize(frame)?;
        history.submit_frame();
        Ok(())
    }
}

fn commit_savestate(
    writer: &mut dyn SavestateWriter,
    core: &str,
    total_frames: u64,
    state: &[u8],
) -> Result<PathBuf> {
    writer.initialize(core, total_frames)?;
    writer.write_save(state)?;
    writer.write_thumb()?;
    writer.commit()?;
    Ok(writer.path().to_path_buf())
}

impl ClockCallback for Inner {
    fn on_advance(&self) {
        self.advance();
    }

    fn on_rewind(&self) {
        self.rewind();
    }
}

/// Rewindable playback of a [`SimulationCore`].
///
/// The controller owns a [`FrameClock`] whose ticks step the core forward or
/// backward, and a history buffer recording one serialized state per forward
/// step. Cores without serialization support are played in real time only.
///
/// # Example
///
/// ```ignore
/// let controller = PlaybackController::new(core, store, &PlaybackConfig::default());
/// controller.start()?;
/// controller.set_speed(1.0);
///
/// // Later: rewind at a quarter of the requested speed
/// controller.set_speed(-1.0);
///
/// // Jump back five seconds
/// controller.seek_time_ms(controller.played_time_ms().saturating_sub(5_000));
/// ```
pub struct PlaybackController {
    inner: Arc<Inner>,
    clock: FrameClock,
}

impl PlaybackController {
    /// Create a paused controller. Call [`start`](Self::start) to spawn the
    /// clock thread.
    pub fn new(
        core: Box<dyn SimulationCore>,
        store: Arc<dyn SavestateStore>,
        config: &PlaybackConfig,
    ) -> Self {
        let rate = normalize_rate(config.rate);
        let state_size = core.serialize_size();
        let core_name = core.name().to_string();

        let inner = Arc::new(Inner {
            core: Mutex::new(core),
            state: Mutex::new(PlaybackState {
                history: None,
                lent: false,
                rewind_enabled: false,
                capacity: 0,
                total_frames: 0,
                stats: PlaybackStats::default(),
            }),
            store,
            core_name,
            state_size,
            rate,
            history_kind: config.history,
            rewind_factor: config.rewind_factor.abs(),
        });
        let clock = FrameClock::new(inner.clone(), rate);

        let controller = Self { inner, clock };
        if state_size == 0 {
            tracing::info!("core has no serializable state, rewind unavailable");
        } else {
            controller.update_configuration(config.rewind_enabled, config.rewind_window_secs);
        }
        controller
    }

    /// Spawn the clock thread. Playback stays paused until a speed is set.
    pub fn start(&self) -> Result<()> {
        self.clock.start()?;
        Ok(())
    }

    /// Stop the clock thread.
    pub fn stop(&self) {
        self.clock.stop();
    }

    pub fn rate(&self) -> f64 {
        self.inner.rate
    }

    /// Pausing needs rewind support.
    pub fn can_pause(&self) -> bool {
        self.inner.can_seek()
    }

    pub fn can_seek(&self) -> bool {
        self.inner.can_seek()
    }

    /// Set the playback speed.
    ///
    /// Positive speeds are passed to the clock unchanged. Negative speeds are
    /// scaled by the rewind factor; without rewind support they pause.
    pub fn set_speed(&self, speed: f64) {
        let speed = if speed < 0.0 {
            if self.can_seek() {
                speed * self.inner.rewind_factor
            } else {
                tracing::debug!(speed, "rewind unavailable, pausing");
                0.0
            }
        } else {
            speed
        };
        self.clock.set_speed(speed);
    }

    /// The speed the clock is currently running at.
    pub fn speed(&self) -> f64 {
        self.clock.speed()
    }

    pub fn pause_async(&self) {
        self.clock.pause_async();
    }

    /// Step forward one frame by hand, as a forward tick would.
    pub fn frame_advance(&self) {
        self.inner.advance();
    }

    /// Step backward one frame by hand, as a rewind tick would.
    pub fn frame_rewind(&self) {
        self.inner.rewind();
    }

    /// Move to `target_ms` within the retained history.
    ///
    /// Targets outside the history are clamped to its bounds. The previous
    /// speed is restored afterwards, so a paused controller stays paused.
    pub fn seek_time_ms(&self, target_ms: u64) {
        if !self.can_seek() {
            return;
        }

        let current_ms = self.played_time_ms();
        let offset =
            ((target_ms as f64 - current_ms as f64) / 1000.0 * self.inner.rate).round() as i64;
        if offset == 0 {
            return;
        }

        let speed = self.clock.speed();
        self.clock.pause_async();
        let moved = self.inner.seek_frames(offset);
        self.clock.set_speed(speed);

        tracing::debug!(target_ms, offset, moved, "seek");
    }

    /// Persist the current state.
    ///
    /// Returns the path of the new savestate.
    pub fn create_savestate(&self) -> Result<PathBuf> {
        if !self.can_seek() {
            return Err(PlayerError::Unsupported);
        }

        let (mut history, lent, total_frames) = self.inner.borrow_history();
        let result = self.inner.write_savestate(history.as_mut(), total_frames);
        if lent {
            self.inner.return_history(history);
        }

        match &result {
            Ok(path) => tracing::info!(path = %path.display(), total_frames, "savestate created"),
            Err(err) => tracing::warn!(%err, "failed to create savestate"),
        }
        result
    }

    /// Restore the savestate at `path` into the core.
    pub fn load_savestate(&self, path: &Path) -> Result<()> {
        if !self.can_seek() {
            return Err(PlayerError::Unsupported);
        }

        let mut reader = self.inner.store.reader();
        reader.initialize(path, &self.inner.core_name)?;

        let (mut history, lent, _) = self.inner.borrow_history();
        let result = self.inner.read_savestate(reader.as_mut(), history.as_mut());
        if lent {
            self.inner.return_history(history);
        }

        match &result {
            Ok(()) => {
                let mut state = self.inner.state.lock();
                state.total_frames = reader.frame_count();
                state.update_stats(self.inner.rate);
                tracing::info!(path = %path.display(), "savestate loaded");
            }
            Err(err) => tracing::warn!(path = %path.display(), %err, "failed to load savestate"),
        }
        result
    }

    /// Apply new rewind settings.
    ///
    /// The history keeps `max(10, window_secs) * rate` frames. Disabling
    /// rewind discards the history.
    pub fn update_configuration(&self, rewind_enabled: bool, window_secs: u32) {
        if !self.can_seek() {
            return;
        }

        let capacity = frame_capacity(window_secs, self.inner.rate);
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        state.rewind_enabled = rewind_enabled;
        state.capacity = capacity;

        if !rewind_enabled {
            state.history = None;
            state.stats = PlaybackStats::default();
            tracing::info!("rewind disabled");
            return;
        }

        match state.history.as_mut() {
            Some(history) => history.set_max_frame_count(capacity),
            // Applied when the lent history comes back
            None if state.lent => {}
            None => {
                state.history = Some(
                    self.inner
                        .history_kind
                        .create_with(self.inner.state_size, capacity),
                );
            }
        }
        state.update_stats(self.inner.rate);

        tracing::info!(
            window_secs,
            capacity,
            kind = ?self.inner.history_kind,
            "rewind configured"
        );
    }

    /// Snapshot of the playback statistics.
    pub fn stats(&self) -> PlaybackStats {
        self.inner.state.lock().stats
    }

    pub fn played_time_ms(&self) -> u64 {
        self.stats().played_time_ms
    }

    pub fn total_time_ms(&self) -> u64 {
        self.stats().total_time_ms
    }

    pub fn cache_time_ms(&self) -> u64 {
        self.stats().cache_time_ms
    }

    /// Logical frame counter.
    pub fn total_frames(&self) -> u64 {
        self.inner.state.lock().total_frames
    }

    /// Run `f` with exclusive access to the core.
    pub fn with_core<R>(&self, f: impl FnOnce(&mut dyn SimulationCore) -> R) -> R {
        let mut core = self.inner.core.lock();
        f(core.as_mut())
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("core", &self.inner.core_name)
            .field("clock", &self.clock)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
