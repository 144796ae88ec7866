//! Savestate persistence.
//!
//! The controller only talks to the traits in this module. Writers follow a
//! transaction: `initialize`, `write_save`, `write_thumb`, then `commit`; on
//! any failure the controller calls `clean_up_transaction` instead.
//!
//! [`DirectoryStore`] is the bundled implementation.

mod directory;

pub use directory::{DirectoryStore, SavestateEntry};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Metadata recorded alongside a savestate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavestateMeta {
    /// Name of the core that produced the state.
    pub core: String,
    /// Logical frame counter when the state was taken.
    pub frame_count: u64,
    /// Serialized state size in bytes.
    pub state_size: usize,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_ms: u64,
}

/// Writes one savestate.
pub trait SavestateWriter {
    /// Begin a new savestate for `core` at `frame_count`.
    fn initialize(&mut self, core: &str, frame_count: u64) -> Result<()>;

    /// Write the serialized state.
    fn write_save(&mut self, state: &[u8]) -> Result<()>;

    /// Write a preview image, if the implementation keeps one.
    fn write_thumb(&mut self) -> Result<()>;

    /// Make the savestate durable and visible.
    fn commit(&mut self) -> Result<()>;

    /// Discard whatever a failed transaction left behind.
    fn clean_up_transaction(&mut self);

    /// Where the savestate lives once committed.
    fn path(&self) -> &Path;
}

/// Reads one savestate.
pub trait SavestateReader {
    /// Open the savestate at `path` for `core`.
    fn initialize(&mut self, path: &Path, core: &str) -> Result<()>;

    /// Copy the serialized state into `state`.
    fn read_save(&mut self, state: &mut [u8]) -> Result<()>;

    /// Frame counter recorded when the state was taken.
    fn frame_count(&self) -> u64;
}

/// Hands out readers and writers for one savestate location.
pub trait SavestateStore: Send + Sync {
    fn writer(&self) -> Box<dyn SavestateWriter>;

    fn reader(&self) -> Box<dyn SavestateReader>;
}
