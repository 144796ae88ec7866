//! Interface to the simulation being played back.

use crate::error::CoreError;

/// A deterministic simulation stepped one frame at a time.
///
/// A core that returns `0` from [`serialize_size`](Self::serialize_size) is
/// played in real time only: no rewind, no seeking, no savestates.
pub trait SimulationCore: Send {
    /// Identifier recorded in savestate metadata.
    fn name(&self) -> &str {
        "core"
    }

    /// Execute one simulation step.
    fn run_frame(&mut self);

    /// Size in bytes of a serialized state. Zero disables rewind.
    fn serialize_size(&self) -> usize;

    /// Write the current state into `buffer`, which is exactly
    /// `serialize_size()` bytes long.
    fn serialize(&mut self, buffer: &mut [u8]) -> Result<(), CoreError>;

    /// Restore a state previously produced by [`serialize`](Self::serialize).
    fn deserialize(&mut self, buffer: &[u8]) -> Result<(), CoreError>;
}
