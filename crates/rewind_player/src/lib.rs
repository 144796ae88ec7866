//! Rewind Player
//!
//! Rewindable, seekable playback for deterministic simulation cores.
//!
//! - [`PlaybackController`] - drives a [`SimulationCore`] from a frame clock
//!   and records a bounded history for rewind and seeking
//! - [`savestate`] - persistence traits and the [`DirectoryStore`]
//! - [`PlaybackConfig`] - rate and rewind settings, loadable from TOML
//! - [`testing`] - a deterministic core and an in-memory store for tests
//!
//! # Example
//!
//! ```rust
//! use rewind_player::testing::{CounterCore, MemoryStore};
//! use rewind_player::{PlaybackConfig, PlaybackController};
//! use std::sync::Arc;
//!
//! let controller = PlaybackController::new(
//!     Box::new(CounterCore::new(16)),
//!     Arc::new(MemoryStore::new()),
//!     &PlaybackConfig::default(),
//! );
//!
//! for _ in 0..120 {
//!     controller.frame_advance();
//! }
//! assert_eq!(controller.played_time_ms(), 1983);
//!
//! controller.seek_time_ms(1000);
//! assert_eq!(controller.played_time_ms(), 1000);
//! assert_eq!(controller.cache_time_ms(), 983);
//! ```

pub mod config;
mod controller;
pub mod error;
pub mod savestate;
pub mod simulation;
mod stats;
pub mod testing;

pub use config::{PlaybackConfig, MIN_REWIND_WINDOW_SECS};
pub use controller::PlaybackController;
pub use error::{CoreError, PlayerError, Result};
pub use rewind_history::HistoryKind;
pub use savestate::{DirectoryStore, SavestateReader, SavestateStore, SavestateWriter};
pub use simulation::SimulationCore;
pub use stats::PlaybackStats;
