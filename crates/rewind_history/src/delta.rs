//! Delta pair strategy.
//!
//! Only the current frame is kept whole. Each pair of adjacent retained frames
//! is linked by one sparse XOR delta; since XOR is its own inverse the same
//! delta walks the cursor in either direction.
//!
//! ```text
//! frame 0 --d0-- frame 1 --d1-- frame 2 --d2-- [current]
//! ```

use crate::HistoryBuffer;
use std::collections::VecDeque;
use std::mem;

/// One changed 32-bit word between two adjacent frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct DeltaPair {
    /// Word index into the frame. Frames are limited to 16 GiB.
    word: u32,
    xor: u32,
}

type Delta = Box<[DeltaPair]>;

fn read_word(chunk: &[u8]) -> u32 {
    let mut bytes = [0u8; 4];
    bytes[..chunk.len()].copy_from_slice(chunk);
    u32::from_le_bytes(bytes)
}

fn diff(from: &[u8], to: &[u8]) -> Delta {
    from.chunks(4)
        .zip(to.chunks(4))
        .enumerate()
        .filter_map(|(word, (a, b))| {
            let xor = read_word(a) ^ read_word(b);
            (xor != 0).then_some(DeltaPair {
                word: word as u32,
                xor,
            })
        })
        .collect()
}

fn apply(frame: &mut [u8], delta: &[DeltaPair]) {
    for pair in delta {
        let start = pair.word as usize * 4;
        let end = (start + 4).min(frame.len());
        for (byte, xor) in frame[start..end].iter_mut().zip(pair.xor.to_le_bytes()) {
            *byte ^= xor;
        }
    }
}

/// History buffer storing XOR delta pairs between adjacent frames.
#[derive(Debug)]
pub struct DeltaHistory {
    frame_size: usize,
    capacity: usize,
    current: Box<[u8]>,
    has_current: bool,
    /// `deltas[i]` links retained frame `i` and `i + 1`.
    deltas: VecDeque<Delta>,
    /// Index of the current frame among retained frames.
    cursor: usize,
    scratch: Box<[u8]>,
}

impl DeltaHistory {
    /// Create an empty buffer. Call [`HistoryBuffer::init`] before use.
    pub fn new() -> Self {
        Self {
            frame_size: 0,
            capacity: 1,
            current: Box::default(),
            has_current: false,
            deltas: VecDeque::new(),
            cursor: 0,
            scratch: Box::default(),
        }
    }

    fn retained(&self) -> usize {
        if self.has_current {
            self.deltas.len() + 1
        } else {
            0
        }
    }
}

impl Default for DeltaHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryBuffer for DeltaHistory {
    fn init(&mut self, frame_size: usize, capacity: usize) {
        self.frame_size = frame_size;
        self.capacity = capacity.max(1);
        self.current = vec![0; frame_size].into_boxed_slice();
        self.has_current = false;
        self.deltas.clear();
        self.cursor = 0;
        self.scratch = vec![0; frame_size].into_boxed_slice();

        tracing::debug!(
            frame_size,
            capacity = self.capacity,
            "delta history initialized"
        );
    }

    fn set_max_frame_count(&mut self, capacity: usize) {
        let capacity = capacity.max(1);

        while self.retained() > capacity && self.cursor > 0 {
            self.deltas.pop_front();
            self.cursor -= 1;
        }
        while self.retained() > capacity {
            self.deltas.pop_back();
        }

        self.capacity = capacity;

        tracing::debug!(capacity, retained = self.retained(), "delta history resized");
    }

    fn begin_frame(&mut self) -> &mut [u8] {
        &mut self.scratch
    }

    fn submit_frame(&mut self) {
        if self.has_current {
            self.deltas.truncate(self.cursor);
            self.deltas.push_back(diff(&self.current, &self.scratch));
            if self.retained() > self.capacity {
                self.deltas.pop_front();
            }
            self.cursor = self.deltas.len();
        } else {
            self.has_current = true;
            self.cursor = 0;
        }

        mem::swap(&mut self.current, &mut self.scratch);
    }

    fn rewind_frames(&mut self, count: usize) -> usize {
        let moved = count.min(self.past_frames_available());
        for index in (self.cursor - moved..self.cursor).rev() {
            apply(&mut self.current, &self.deltas[index]);
        }
        self.cursor -= moved;
        moved
    }

    fn advance_frames(&mut self, count: usize) -> usize {
        let moved = count.min(self.future_frames_available());
        for index in self.cursor..self.cursor + moved {
            apply(&mut self.current, &self.deltas[index]);
        }
        self.cursor += moved;
        moved
    }

    fn current_frame(&self) -> Option<&[u8]> {
        self.has_current.then_some(&self.current[..])
    }

    fn past_frames_available(&self) -> usize {
        if self.has_current {
            self.cursor
        } else {
            0
        }
    }

    fn future_frames_available(&self) -> usize {
        if self.has_current {
            self.deltas.len() - self.cursor
        } else {
            0
        }
    }

    fn max_frame_count(&self) -> usize {
        self.capacity
    }

    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn memory_usage(&self) -> usize {
        let deltas: usize = self
            .deltas
            .iter()
            .map(|delta| delta.len() * mem::size_of::<DeltaPair>())
            .sum();
        self.current.len() + self.scratch.len() + deltas
    }
}
