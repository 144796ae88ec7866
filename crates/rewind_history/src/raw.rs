//! Raw copy strategy.
//!
//! Every retained frame is a full, independent copy. Buffers released by
//! eviction or by discarding the future are recycled for later submits.

use crate::HistoryBuffer;
use std::collections::VecDeque;
use std::mem;

/// History buffer storing each frame as a raw copy.
#[derive(Debug)]
pub struct RawHistory {
    frame_size: usize,
    capacity: usize,
    /// Retained frames, oldest first.
    frames: VecDeque<Box<[u8]>>,
    /// Index of the current frame in `frames`.
    cursor: usize,
    scratch: Box<[u8]>,
    /// Recycled frame buffers.
    spare: Vec<Box<[u8]>>,
}

impl RawHistory {
    /// Create an empty buffer. Call [`HistoryBuffer::init`] before use.
    pub fn new() -> Self {
        Self {
            frame_size: 0,
            capacity: 1,
            frames: VecDeque::new(),
            cursor: 0,
            scratch: Box::default(),
            spare: Vec::new(),
        }
    }

    fn take_buffer(&mut self) -> Box<[u8]> {
        self.spare
            .pop()
            .unwrap_or_else(|| vec![0; self.frame_size].into_boxed_slice())
    }

    fn trim_spare(&mut self) {
        let limit = self.capacity.saturating_sub(self.frames.len());
        self.spare.truncate(limit);
    }
}

impl Default for RawHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryBuffer for RawHistory {
    fn init(&mut self, frame_size: usize, capacity: usize) {
        self.frame_size = frame_size;
        self.capacity = capacity.max(1);
        self.frames.clear();
        self.cursor = 0;
        self.scratch = vec![0; frame_size].into_boxed_slice();
        self.spare.clear();

        tracing::debug!(
            frame_size,
            capacity = self.capacity,
            "raw history initialized"
        );
    }

    fn set_max_frame_count(&mut self, capacity: usize) {
        let capacity = capacity.max(1);

        // Oldest past frames go first
        while self.frames.len() > capacity && self.cursor > 0 {
            self.frames.pop_front();
            self.cursor -= 1;
        }
        // Then the newest future frames
        self.frames.truncate(capacity);

        self.capacity = capacity;
        self.trim_spare();

        tracing::debug!(capacity, retained = self.frames.len(), "raw history resized");
    }

    fn begin_frame(&mut self) -> &mut [u8] {
        &mut self.scratch
    }

    fn submit_frame(&mut self) {
        if !self.frames.is_empty() {
            while self.frames.len() > self.cursor + 1 {
                if let Some(frame) = self.frames.pop_back() {
                    self.spare.push(frame);
                }
            }
        }

        if self.frames.len() >= self.capacity {
            if let Some(evicted) = self.frames.pop_front() {
                self.spare.push(evicted);
            }
        }

        let next = self.take_buffer();
        let frame = mem::replace(&mut self.scratch, next);
        self.frames.push_back(frame);
        self.cursor = self.frames.len() - 1;
    }

    fn rewind_frames(&mut self, count: usize) -> usize {
        let moved = count.min(self.past_frames_available());
        self.cursor -= moved;
        moved
    }

    fn advance_frames(&mut self, count: usize) -> usize {
        let moved = count.min(self.future_frames_available());
        self.cursor += moved;
        moved
    }

    fn current_frame(&self) -> Option<&[u8]> {
        self.frames.get(self.cursor).map(|frame| &frame[..])
    }

    fn past_frames_available(&self) -> usize {
        if self.frames.is_empty() {
            0
        } else {
            self.cursor
        }
    }

    fn future_frames_available(&self) -> usize {
        if self.frames.is_empty() {
            0
        } else {
            self.frames.len() - 1 - self.cursor
        }
    }

    fn max_frame_count(&self) -> usize {
        self.capacity
    }

    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn memory_usage(&self) -> usize {
        (self.frames.len() + self.spare.len() + 1) * self.frame_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submit(history: &mut RawHistory, value: u8) {
        history.begin_frame().fill(value);
        history.submit_frame();
    }

    #[test]
    fn test_recycled_buffers_are_bounded() {
        let mut history = RawHistory::new();
        history.init(64, 4);

        for value in 0..20 {
            submit(&mut history, value);
        }

        assert_eq!(history.frames.len(), 4);
        assert!(history.frames.len() + history.spare.len() <= 5);
        assert_eq!(history.current_frame(), Some(&[19u8; 64][..]));
    }

    #[test]
    fn test_discarded_future_is_reused() {
        let mut history = RawHistory::new();
        history.init(8, 8);

        for value in 0..6 {
            submit(&mut history, value);
        }
        history.rewind_frames(4);
        submit(&mut history, 42);

        assert_eq!(history.past_frames_available(), 2);
        assert_eq!(history.future_frames_available(), 0);
        assert_eq!(history.current_frame(), Some(&[42u8; 8][..]));

        history.rewind_frames(1);
        assert_eq!(history.current_frame(), Some(&[1u8; 8][..]));
    }

    #[test]
    fn test_memory_usage_tracks_frames() {
        let mut history = RawHistory::new();
        history.init(100, 10);
        assert_eq!(history.memory_usage(), 100);

        submit(&mut history, 1);
        submit(&mut history, 2);
        assert_eq!(history.memory_usage(), 300);
    }
}
