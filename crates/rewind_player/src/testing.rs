//! Test doubles for playback.
//!
//! - [`CounterCore`] - deterministic core whose state encodes its frame number
//! - [`MemoryStore`] - in-memory savestate store with failure injection

use crate::error::{CoreError, PlayerError, Result};
use crate::savestate::{SavestateReader, SavestateStore, SavestateWriter};
use crate::simulation::SimulationCore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

/// Shared view into a [`CounterCore`] after it has been moved into a
/// controller.
#[derive(Debug, Default)]
pub struct CoreProbe {
    frame: AtomicU64,
    runs: AtomicU64,
    fail_serialize: AtomicBool,
    fail_deserialize: AtomicBool,
}

impl CoreProbe {
    /// The core's current frame number.
    pub fn frame(&self) -> u64 {
        self.frame.load(Ordering::SeqCst)
    }

    /// Number of `run_frame` calls so far.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn set_fail_serialize(&self, fail: bool) {
        self.fail_serialize.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deserialize(&self, fail: bool) {
        self.fail_deserialize.store(fail, Ordering::SeqCst);
    }
}

/// A core that counts frames.
///
/// Its state is the frame number followed by `payload` bytes derived from
/// it, so any state can be checked for corruption.
#[derive(Debug)]
pub struct CounterCore {
    frame: u64,
    payload: usize,
    serializable: bool,
    probe: Arc<CoreProbe>,
}

impl CounterCore {
    /// A serializable core with `payload` extra state bytes.
    pub fn new(payload: usize) -> Self {
        Self {
            frame: 0,
            payload,
            serializable: true,
            probe: Arc::new(CoreProbe::default()),
        }
    }

    /// A core that reports no serializable state.
    pub fn unserializable() -> Self {
        Self {
            serializable: false,
            ..Self::new(0)
        }
    }

    pub fn probe(&self) -> Arc<CoreProbe> {
        Arc::clone(&self.probe)
    }

    /// The serialized state of a counter core at `frame`.
    pub fn state_for(frame: u64, payload: usize) -> Vec<u8> {
        let mut state = vec![0; 8 + payload];
        write_state(&mut state, frame);
        state
    }

    fn set_frame(&mut self, frame: u64) {
        self.frame = frame;
        self.probe.frame.store(frame, Ordering::SeqCst);
    }
}

fn payload_byte(frame: u64, index: usize) -> u8 {
    frame.wrapping_mul(31).wrapping_add(index as u64) as u8
}

fn write_state(state: &mut [u8], frame: u64) {
    state[..8].copy_from_slice(&frame.to_le_bytes());
    for (index, byte) in state[8..].iter_mut().enumerate() {
        *byte = payload_byte(frame, index);
    }
}

impl SimulationCore for CounterCore {
    fn name(&self) -> &str {
        "counter"
    }

    fn run_frame(&mut self) {
        self.set_frame(self.frame + 1);
        self.probe.runs.fetch_add(1, Ordering::SeqCst);
    }

    fn serialize_size(&self) -> usize {
        if self.serializable {
            8 + self.payload
        } else {
            0
        }
    }

    fn serialize(&mut self, buffer: &mut [u8]) -> std::result::Result<(), CoreError> {
        if self.probe.fail_serialize.load(Ordering::SeqCst) {
            return Err(CoreError::Rejected("serialize disabled".to_string()));
        }
        let expected = self.serialize_size();
        if expected == 0 || buffer.len() != expected {
            return Err(CoreError::SizeMismatch {
                expected,
                actual: buffer.len(),
            });
        }

        write_state(buffer, self.frame);
        Ok(())
    }

    fn deserialize(&mut self, buffer: &[u8]) -> std::result::Result<(), CoreError> {
        if self.probe.fail_deserialize.load(Ordering::SeqCst) {
            return Err(CoreError::Rejected("deserialize disabled".to_string()));
        }
        let expected = self.serialize_size();
        if expected == 0 || buffer.len() != expected {
            return Err(CoreError::SizeMismatch {
                expected,
                actual: buffer.len(),
            });
        }

        let mut frame = [0u8; 8];
        frame.copy_from_slice(&buffer[..8]);
        let frame = u64::from_le_bytes(frame);
        let intact = buffer[8..]
            .iter()
            .enumerate()
            .all(|(index, byte)| *byte == payload_byte(frame, index));
        if !intact {
            return Err(CoreError::Rejected("corrupt payload".to_string()));
        }

        self.set_frame(frame);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryStoreState {
    saves: HashMap<PathBuf, (Vec<u8>, u64)>,
    next_id: u64,
    fail_commit: bool,
    cleanups: usize,
    hold: Option<(Sender<()>, Receiver<()>)>,
}

/// Savestate store that keeps everything in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryStoreState>>,
}

/// Blocks the next savestate write until released.
#[derive(Debug)]
pub struct WriteHold {
    entered: Receiver<()>,
    release: Sender<()>,
}

impl WriteHold {
    /// Wait until a writer is blocked inside `write_save`.
    pub fn wait_entered(&self) {
        let _ = self.entered.recv();
    }

    /// Let the blocked writer continue.
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every commit fail.
    pub fn set_fail_commit(&self, fail: bool) {
        self.state.lock().fail_commit = fail;
    }

    /// Number of transactions cleaned up after a failure.
    pub fn cleanups(&self) -> usize {
        self.state.lock().cleanups
    }

    /// Number of committed savestates.
    pub fn len(&self) -> usize {
        self.state.lock().saves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block the next `write_save` until the returned hold is released.
    pub fn hold_next_write(&self) -> WriteHold {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        self.state.lock().hold = Some((entered_tx, release_rx));
        WriteHold {
            entered: entered_rx,
            release: release_tx,
        }
    }
}

impl SavestateStore for MemoryStore {
    fn writer(&self) -> Box<dyn SavestateWriter> {
        Box::new(MemoryWriter {
            store: Arc::clone(&self.state),
            path: PathBuf::new(),
            frame_count: 0,
            pending: None,
        })
    }

    fn reader(&self) -> Box<dyn SavestateReader> {
        Box::new(MemoryReader {
            store: Arc::clone(&self.state),
            save: None,
        })
    }
}

struct MemoryWriter {
    store: Arc<Mutex<MemoryStoreState>>,
    path: PathBuf,
    frame_count: u64,
    pending: Option<Vec<u8>>,
}

impl SavestateWriter for MemoryWriter {
    fn initialize(&mut self, core: &str, frame_count: u64) -> Result<()> {
        let mut store = self.store.lock();
        self.path = PathBuf::from(format!("memory/{core}/{}.sav", store.next_id));
        store.next_id += 1;
        self.frame_count = frame_count;
        Ok(())
    }

    fn write_save(&mut self, state: &[u8]) -> Result<()> {
        let hold = self.store.lock().hold.take();
        if let Some((entered, release)) = hold {
            let _ = entered.send(());
            let _ = release.recv();
        }

        self.pending = Some(state.to_vec());
        Ok(())
    }

    fn write_thumb(&mut self) -> Result<()> {
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let mut store = self.store.lock();
        if store.fail_commit {
            return Err(PlayerError::Transaction("commit failed".to_string()));
        }
        let state = self
            .pending
            .take()
            .ok_or_else(|| PlayerError::Transaction("nothing written".to_string()))?;
        store
            .saves
            .insert(self.path.clone(), (state, self.frame_count));
        Ok(())
    }

    fn clean_up_transaction(&mut self) {
        self.pending = None;
        self.store.lock().cleanups += 1;
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

struct MemoryReader {
    store: Arc<Mutex<MemoryStoreState>>,
    save: Option<(Vec<u8>, u64)>,
}

impl SavestateReader for MemoryReader {
    fn initialize(&mut self, path: &Path, _core: &str) -> Result<()> {
        let save = self
            .store
            .lock()
            .saves
            .get(path)
            .cloned()
            .ok_or_else(|| PlayerError::NotFound(path.to_path_buf()))?;
        self.save = Some(save);
        Ok(())
    }

    fn read_save(&mut self, state: &mut [u8]) -> Result<()> {
        let (data, _) = self
            .save
            .as_ref()
            .ok_or_else(|| PlayerError::Transaction("read before initialize".to_string()))?;
        if data.len() != state.len() {
            return Err(PlayerError::StateSize {
                expected: state.len(),
                actual: data.len(),
            });
        }
        state.copy_from_slice(data);
        Ok(())
    }

    fn frame_count(&self) -> u64 {
        self.save.as_ref().map(|(_, frames)| *frames).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_core_round_trip() {
        let mut core = CounterCore::new(12);
        for _ in 0..5 {
            core.run_frame();
        }

        let mut state = vec![0; core.serialize_size()];
        core.serialize(&mut state).unwrap();
        assert_eq!(state, CounterCore::state_for(5, 12));

        core.run_frame();
        core.deserialize(&state).unwrap();
        assert_eq!(core.probe().frame(), 5);
        assert_eq!(core.probe().runs(), 6);
    }

    #[test]
    fn test_counter_core_detects_corruption() {
        let mut core = CounterCore::new(4);
        let mut state = CounterCore::state_for(3, 4);
        state[10] ^= 0xFF;
        assert!(core.deserialize(&state).is_err());
    }

    #[test]
    fn test_memory_store_failure_injection() {
        let store = MemoryStore::new();
        store.set_fail_commit(true);

        let mut writer = store.writer();
        writer.initialize("counter", 1).unwrap();
        writer.write_save(&[1, 2, 3]).unwrap();
        assert!(writer.commit().is_err());
        writer.clean_up_transaction();

        assert_eq!(store.cleanups(), 1);
        assert!(store.is_empty());
    }
}
