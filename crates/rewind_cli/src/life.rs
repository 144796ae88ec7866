//! Conway's Game of Life on a wrapping grid, used as the demo core.
//!
//! Serialized layout: generation as little-endian `u64`, then one byte per
//! cell (`0` dead, `1` alive), row-major.

use rewind_player::{CoreError, SimulationCore};

const HEADER: usize = 8;

pub struct LifeCore {
    width: usize,
    height: usize,
    cells: Vec<u8>,
    next: Vec<u8>,
    generation: u64,
}

impl LifeCore {
    /// A grid filled pseudo-randomly from `seed`, roughly one cell in three
    /// alive.
    pub fn seeded(width: usize, height: usize, seed: u64) -> Self {
        let width = width.max(3);
        let height = height.max(3);
        // xorshift64 needs a non-zero state
        let mut x = seed | 1;
        let cells = (0..width * height)
            .map(|_| {
                x ^= x << 13;
                x ^= x >> 7;
                x ^= x << 17;
                u8::from(x % 3 == 0)
            })
            .collect();

        Self {
            width,
            height,
            cells,
            next: vec![0; width * height],
            generation: 0,
        }
    }

    /// Live cells in a serialized state.
    pub fn population_of(state: &[u8]) -> usize {
        state
            .get(HEADER..)
            .map(|cells| cells.iter().filter(|cell| **cell != 0).count())
            .unwrap_or(0)
    }

    /// Generation recorded in a serialized state.
    pub fn generation_of(state: &[u8]) -> Option<u64> {
        let header: [u8; HEADER] = state.get(..HEADER)?.try_into().ok()?;
        Some(u64::from_le_bytes(header))
    }

    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    fn neighbours(&self, x: usize, y: usize) -> u8 {
        let mut count = 0;
        for dy in [self.height - 1, 0, 1] {
            for dx in [self.width - 1, 0, 1] {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = (x + dx) % self.width;
                let ny = (y + dy) % self.height;
                count += self.cells[self.index(nx, ny)];
            }
        }
        count
    }
}

impl SimulationCore for LifeCore {
    fn name(&self) -> &str {
        "life"
    }

    fn run_frame(&mut self) {
        for y in 0..self.height {
            for x in 0..self.width {
                let index = self.index(x, y);
                let alive = self.cells[index] != 0;
                self.next[index] = match (alive, self.neighbours(x, y)) {
                    (true, 2) | (_, 3) => 1,
                    _ => 0,
                };
            }
        }
        std::mem::swap(&mut self.cells, &mut self.next);
        self.generation += 1;
    }

    fn serialize_size(&self) -> usize {
        HEADER + self.cells.len()
    }

    fn serialize(&mut self, buffer: &mut [u8]) -> Result<(), CoreError> {
        if buffer.len() != self.serialize_size() {
            return Err(CoreError::SizeMismatch {
                expected: self.serialize_size(),
                actual: buffer.len(),
            });
        }
        buffer[..HEADER].copy_from_slice(&self.generation.to_le_bytes());
        buffer[HEADER..].copy_from_slice(&self.cells);
        Ok(())
    }

    fn deserialize(&mut self, buffer: &[u8]) -> Result<(), CoreError> {
        if buffer.len() != self.serialize_size() {
            return Err(CoreError::SizeMismatch {
                expected: self.serialize_size(),
                actual: buffer.len(),
            });
        }
        if buffer[HEADER..].iter().any(|cell| *cell > 1) {
            return Err(CoreError::Rejected("cell value out of range".to_string()));
        }
        self.generation = Self::generation_of(buffer).unwrap_or(0);
        self.cells.copy_from_slice(&buffer[HEADER..]);
        Ok(())
    }
}
