//! Rewind History
//!
//! A fixed-capacity log of serialized simulation states that can be walked
//! backward and forward from a cursor.
//!
//! # Strategies
//!
//! - **Raw** ([`RawHistory`]): every frame is an independent copy.
//!   `O(capacity * frame_size)` memory, constant work per frame.
//! - **Delta pair** ([`DeltaHistory`]): only the current frame is kept whole,
//!   neighbours are stored as sparse XOR deltas. Less memory, more CPU.
//!
//! Both implement [`HistoryBuffer`] and behave identically from the outside.
//!
//! # Example
//!
//! ```rust
//! use rewind_history::{HistoryBuffer, HistoryKind};
//!
//! let mut history = HistoryKind::Raw.create();
//! history.init(4, 3);
//!
//! for value in 0u8..3 {
//!     history.begin_frame().fill(value);
//!     history.submit_frame();
//! }
//! assert_eq!(history.past_frames_available(), 2);
//!
//! history.rewind_frames(1);
//! assert_eq!(history.current_frame(), Some(&[1u8; 4][..]));
//! assert_eq!(history.future_frames_available(), 1);
//! ```

use serde::{Deserialize, Serialize};

mod delta;
mod raw;

pub use delta::DeltaHistory;
pub use raw::RawHistory;

/// A bounded history of serialized frames with a movable cursor.
///
/// Frames behind the cursor are "past", frames ahead of it are "future".
/// `past + future + 1 <= max_frame_count()` holds whenever a current frame
/// exists. Appending at capacity evicts the oldest frame; it never blocks and
/// never fails.
pub trait HistoryBuffer: Send {
    /// Reinitialize storage, discarding all retained frames.
    ///
    /// `capacity` is clamped to at least one frame.
    fn init(&mut self, frame_size: usize, capacity: usize);

    /// Resize the capacity in place.
    ///
    /// When shrinking below the retained frame count, the oldest past frames
    /// are dropped first, then the newest future frames.
    fn set_max_frame_count(&mut self, capacity: usize);

    /// Scratch region of exactly `frame_size()` bytes for the next frame.
    fn begin_frame(&mut self) -> &mut [u8];

    /// Commit the region returned by [`begin_frame`](Self::begin_frame) as the
    /// new current frame.
    ///
    /// Any future frames are discarded and the oldest frame is evicted if the
    /// buffer is full.
    fn submit_frame(&mut self);

    /// Move the cursor back by up to `count` frames. Returns frames moved.
    fn rewind_frames(&mut self, count: usize) -> usize;

    /// Move the cursor forward by up to `count` previously rewound frames.
    /// Returns frames moved.
    fn advance_frames(&mut self, count: usize) -> usize;

    /// The current frame, or `None` if nothing was submitted since `init`.
    fn current_frame(&self) -> Option<&[u8]>;

    fn past_frames_available(&self) -> usize;

    fn future_frames_available(&self) -> usize;

    fn max_frame_count(&self) -> usize;

    fn frame_size(&self) -> usize;

    /// Approximate number of bytes held for retained frames.
    fn memory_usage(&self) -> usize;
}

/// Storage strategy for a history buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    /// Independent raw copies.
    #[default]
    Raw,
    /// XOR delta pairs between adjacent frames.
    DeltaPair,
}

impl HistoryKind {
    /// Create an empty buffer of this kind. Call [`HistoryBuffer::init`]
    /// before use.
    pub fn create(self) -> Box<dyn HistoryBuffer> {
        match self {
            HistoryKind::Raw => Box::new(RawHistory::new()),
            HistoryKind::DeltaPair => Box::new(DeltaHistory::new()),
        }
    }

    /// Create and initialize a buffer of this kind.
    pub fn create_with(self, frame_size: usize, capacity: usize) -> Box<dyn HistoryBuffer> {
        let mut history = self.create();
        history.init(frame_size, capacity);
        history
    }
}
