//! Clock error types

use thiserror::Error;

/// Frame clock errors
#[derive(Error, Debug)]
pub enum ClockError {
    /// The tick thread could not be spawned
    #[error("Failed to spawn clock thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Result type for clock operations
pub type Result<T> = std::result::Result<T, ClockError>;
