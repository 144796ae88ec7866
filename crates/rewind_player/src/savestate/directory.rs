//! Savestates stored as files in one directory.
//!
//! Each state is a raw `.sav` file. `index.json` in the same directory is the
//! savestate database: a state only exists once its entry has been committed
//! there. Writes go to a `.tmp` file first and are renamed on commit.

use super::{SavestateMeta, SavestateReader, SavestateStore, SavestateWriter};
use crate::error::{PlayerError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const INDEX_FILE: &str = "index.json";

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// One committed savestate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavestateEntry {
    /// File name relative to the store root.
    pub file: String,
    #[serde(flatten)]
    pub meta: SavestateMeta,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SavestateIndex {
    #[serde(default)]
    entries: Vec<SavestateEntry>,
}

fn read_index(root: &Path) -> Result<SavestateIndex> {
    match fs::read_to_string(root.join(INDEX_FILE)) {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(SavestateIndex::default()),
        Err(err) => Err(err.into()),
    }
}

fn write_index(root: &Path, index: &SavestateIndex) -> Result<()> {
    let temp = root.join(format!("{INDEX_FILE}.tmp"));
    fs::write(&temp, serde_json::to_string_pretty(index)?)?;
    fs::rename(&temp, root.join(INDEX_FILE))?;
    Ok(())
}

fn file_stem(core: &str) -> String {
    let stem: String = core
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "core".to_string()
    } else {
        stem
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

fn remove_if_present(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), %err, "failed to remove savestate file");
        }
    }
}

/// Savestate store rooted at a directory.
#[derive(Clone, Debug)]
pub struct DirectoryStore {
    root: PathBuf,
    index_lock: Arc<Mutex<()>>,
}

impl DirectoryStore {
    /// Create a store. The directory is created on the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Committed savestates, oldest first.
    pub fn list(&self) -> Result<Vec<SavestateEntry>> {
        let _guard = self.index_lock.lock();
        Ok(read_index(&self.root)?.entries)
    }
}

impl SavestateStore for DirectoryStore {
    fn writer(&self) -> Box<dyn SavestateWriter> {
        Box::new(DirectoryWriter {
            root: self.root.clone(),
            index_lock: Arc::clone(&self.index_lock),
            path: PathBuf::new(),
            temp: PathBuf::new(),
            meta: None,
            written: false,
            renamed: false,
        })
    }

    fn reader(&self) -> Box<dyn SavestateReader> {
        Box::new(DirectoryReader {
            root: self.root.clone(),
            index_lock: Arc::clone(&self.index_lock),
            opened: None,
        })
    }
}

struct DirectoryWriter {
    root: PathBuf,
    index_lock: Arc<Mutex<()>>,
    path: PathBuf,
    temp: PathBuf,
    meta: Option<SavestateMeta>,
    written: bool,
    renamed: bool,
}

impl SavestateWriter for DirectoryWriter {
    fn initialize(&mut self, core: &str, frame_count: u64) -> Result<()> {
        fs::create_dir_all(&self.root)?;

        let created_ms = now_ms();
        let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let file = format!("{}-{created_ms}-{sequence}.sav", file_stem(core));
        self.temp = self.root.join(format!("{file}.tmp"));
        self.path = self.root.join(file);
        self.meta = Some(SavestateMeta {
            core: core.to_string(),
            frame_count,
            state_size: 0,
            created_ms,
        });
        Ok(())
    }

    fn write_save(&mut self, state: &[u8]) -> Result<()> {
        let meta = self
            .meta
            .as_mut()
            .ok_or_else(|| PlayerError::Transaction("write before initialize".to_string()))?;

        fs::write(&self.temp, state)?;
        meta.state_size = state.len();
        self.written = true;
        Ok(())
    }

    fn write_thumb(&mut self) -> Result<()> {
        // No video output to capture
        tracing::trace!(path = %self.path.display(), "savestate thumbnail skipped");
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let meta = match (&self.meta, self.written) {
            (Some(meta), true) => meta.clone(),
            _ => {
                return Err(PlayerError::Transaction(
                    "commit without a written state".to_string(),
                ))
            }
        };
        let file = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| PlayerError::Transaction("invalid savestate path".to_string()))?;

        let _guard = self.index_lock.lock();
        let mut index = read_index(&self.root)?;
        fs::rename(&self.temp, &self.path)?;
        self.renamed = true;
        index.entries.push(SavestateEntry { file, meta });
        write_index(&self.root, &index)?;

        tracing::debug!(path = %self.path.display(), "savestate committed");
        Ok(())
    }

    fn clean_up_transaction(&mut self) {
        remove_if_present(&self.temp);
        if self.renamed {
            remove_if_present(&self.path);
        }
        self.meta = None;
        self.written = false;
        self.renamed = false;
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

struct DirectoryReader {
    root: PathBuf,
    index_lock: Arc<Mutex<()>>,
    opened: Option<(PathBuf, SavestateEntry)>,
}

impl SavestateReader for DirectoryReader {
    fn initialize(&mut self, path: &Path, core: &str) -> Result<()> {
        let not_found = || PlayerError::NotFound(path.to_path_buf());
        if path.parent() != Some(self.root.as_path()) {
            return Err(not_found());
        }
        let file = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(not_found)?;

        let index = {
            let _guard = self.index_lock.lock();
            read_index(&self.root)?
        };
        let entry = index
            .entries
            .into_iter()
            .rfind(|entry| entry.file == file)
            .ok_or_else(not_found)?;

        if entry.meta.core != core {
            tracing::warn!(
                saved_by = %entry.meta.core,
                core,
                "savestate was written by a different core"
            );
        }

        self.opened = Some((self.root.join(&entry.file), entry));
        Ok(())
    }

    fn read_save(&mut self, state: &mut [u8]) -> Result<()> {
        let (path, _) = self
            .opened
            .as_ref()
            .ok_or_else(|| PlayerError::Transaction("read before initialize".to_string()))?;

        let data = fs::read(path)?;
        if data.len() != state.len() {
            return Err(PlayerError::StateSize {
                expected: state.len(),
                actual: data.len(),
            });
        }
        state.copy_from_slice(&data);
        Ok(())
    }

    fn frame_count(&self) -> u64 {
        self.opened
            .as_ref()
            .map(|(_, entry)| entry.meta.frame_count)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_state(store: &DirectoryStore, state: &[u8], frames: u64) -> PathBuf {
        let mut writer = store.writer();
        writer.initialize("test core", frames).unwrap();
        writer.write_save(state).unwrap();
        writer.write_thumb().unwrap();
        writer.commit().unwrap();
        writer.path().to_path_buf()
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path().join("saves"));

        let path = write_state(&store, &[1, 2, 3, 4], 42);
        assert!(path.exists());
        assert!(path.starts_with(store.root()));

        let mut reader = store.reader();
        reader.initialize(&path, "test core").unwrap();
        let mut state = [0u8; 4];
        reader.read_save(&mut state).unwrap();

        assert_eq!(state, [1, 2, 3, 4]);
        assert_eq!(reader.frame_count(), 42);
    }

    #[test]
    fn test_index_lists_commits() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path());
        assert!(store.list().unwrap().is_empty());

        let first = write_state(&store, &[0; 8], 1);
        let second = write_state(&store, &[1; 8], 2);
        assert_ne!(first, second);

        let entries = store.list().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].meta.frame_count, 1);
        assert_eq!(entries[1].meta.state_size, 8);
        assert_eq!(entries[1].meta.core, "test core");
        assert!(entries[1].file.starts_with("test_core-"));
    }

    #[test]
    fn test_clean_up_removes_partial_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path());

        let mut writer = store.writer();
        writer.initialize("core", 7).unwrap();
        writer.write_save(&[9; 16]).unwrap();
        writer.clean_up_transaction();

        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert!(leftovers.is_empty());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_commit_without_state_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path());

        let mut writer = store.writer();
        writer.initialize("core", 0).unwrap();
        assert!(matches!(
            writer.commit(),
            Err(PlayerError::Transaction(_))
        ));
    }

    #[test]
    fn test_uncommitted_state_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path());

        let mut reader = store.reader();
        let err = reader
            .initialize(&dir.path().join("missing.sav"), "core")
            .unwrap_err();
        assert!(matches!(err, PlayerError::NotFound(_)));
    }

    #[test]
    fn test_path_outside_root_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path().join("saves"));
        let path = write_state(&store, &[3; 4], 1);
        let file = path.file_name().unwrap();

        let mut reader = store.reader();
        for elsewhere in [dir.path().join(file), dir.path().join("other").join(file)] {
            let err = reader.initialize(&elsewhere, "test core").unwrap_err();
            assert!(matches!(err, PlayerError::NotFound(_)));
        }
        reader.initialize(&path, "test core").unwrap();
    }

    #[test]
    fn test_size_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path());
        let path = write_state(&store, &[5; 10], 3);

        let mut reader = store.reader();
        reader.initialize(&path, "test core").unwrap();
        let mut state = [0u8; 12];
        assert!(matches!(
            reader.read_save(&mut state),
            Err(PlayerError::StateSize {
                expected: 12,
                actual: 10
            })
        ));
    }
}
