//! Player error types

use rewind_clock::ClockError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by a simulation core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The state buffer does not match the core's serialized size
    #[error("State buffer is {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    /// The core refused to produce or accept a state
    #[error("Core rejected state: {0}")]
    Rejected(String),
}

/// Playback errors
#[derive(Error, Debug)]
pub enum PlayerError {
    /// The core cannot serialize its state, so savestates and seeking are off
    #[error("Core does not support savestates")]
    Unsupported,

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Clock(#[from] ClockError),

    /// Savestate is missing from the index
    #[error("Savestate not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Stored state does not fit the running core
    #[error("Savestate holds {actual} bytes, core expects {expected}")]
    StateSize { expected: usize, actual: usize },

    /// Savestate writer was used out of order
    #[error("Savestate transaction error: {0}")]
    Transaction(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Savestate index error: {0}")]
    Index(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result type for player operations
pub type Result<T> = std::result::Result<T, PlayerError>;
