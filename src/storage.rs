use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_PREFIX: &str = "focusflow";
pub const DATA_DIR_ENV: &str = "FOCUSFLOW_DATA_DIR";
const PROJECT_DIR: &str = ".focusflow";

/// Every key the application owns. Anything else sharing the backend is left
/// alone by [`KeyedStore::clear`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StoreKey {
    Tasks,
    Habits,
    HabitCompletions,
    MatrixTasks,
    DayPlannerEvents,
    PomodoroSettings,
    PomodoroRounds,
    QuickTasks,
}

impl StoreKey {
    pub const ALL: [StoreKey; 8] = [
        StoreKey::Tasks,
        StoreKey::Habits,
        StoreKey::HabitCompletions,
        StoreKey::MatrixTasks,
        StoreKey::DayPlannerEvents,
        StoreKey::PomodoroSettings,
        StoreKey::PomodoroRounds,
        StoreKey::QuickTasks,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            StoreKey::Tasks => "tasks",
            StoreKey::Habits => "habits",
            StoreKey::HabitCompletions => "habit_completions",
            StoreKey::MatrixTasks => "matrix_tasks",
            StoreKey::DayPlannerEvents => "day_planner_events",
            StoreKey::PomodoroSettings => "pomodoro_settings",
            StoreKey::PomodoroRounds => "pomodoro_rounds",
            StoreKey::QuickTasks => "quick_tasks",
        }
    }

    pub fn from_suffix(raw: &str) -> Option<StoreKey> {
        StoreKey::ALL.into_iter().find(|k| k.suffix() == raw)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("storage I/O error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("serializing {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[cfg(test)]
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Raw text storage underneath [`KeyedStore`].
pub trait StorageBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileBackend { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(io_err)?;
        fs::write(self.path_for(key), value).map_err(io_err)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    key: self.dir.display().to_string(),
                    source,
                })
            }
        };
        let mut keys = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// In-process backend for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: std::sync::Mutex<std::collections::BTreeMap<String, String>>,
}

#[cfg(test)]
impl MemoryBackend {
    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, std::collections::BTreeMap<String, String>>, StoreError>
    {
        self.entries
            .lock()
            .map_err(|err| StoreError::Unavailable(format!("in-memory lock poisoned: {err}")))
    }
}

#[cfg(test)]
impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}

/// Typed JSON access to the application's keys.
///
/// Loads never fail: absent or undecodable data falls back to the caller's
/// default and a warning is logged. Saves report backend failures.
#[derive(Clone)]
pub struct KeyedStore {
    backend: Arc<dyn StorageBackend>,
    prefix: String,
}

impl KeyedStore {
    pub fn new(backend: Arc<dyn StorageBackend>, prefix: impl Into<String>) -> Self {
        KeyedStore {
            backend,
            prefix: prefix.into(),
        }
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        KeyedStore::new(Arc::new(MemoryBackend::default()), DEFAULT_PREFIX)
    }

    pub fn full_key(&self, key: StoreKey) -> String {
        format!("{}_{}", self.prefix, key.suffix())
    }

    pub fn raw(&self, key: StoreKey) -> Option<String> {
        let full = self.full_key(key);
        match self.backend.get(&full) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key = %full, error = %err, "failed to read stored value");
                None
            }
        }
    }

    pub fn load<T, F>(&self, key: StoreKey, default: F) -> T
    where
        T: DeserializeOwned,
        F: FnOnce() -> T,
    {
        let Some(text) = self.raw(key) else {
            return default();
        };
        match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(
                    key = %self.full_key(key),
                    error = %err,
                    "malformed stored data, using default"
                );
                default()
            }
        }
    }

    /// Loads a JSON array record by record so one stale or hand-edited entry
    /// does not discard the whole collection.
    pub fn load_records<T: DeserializeOwned>(&self, key: StoreKey) -> Vec<T> {
        let values: Vec<serde_json::Value> = self.load(key, Vec::new);
        let total = values.len();
        let records: Vec<T> = values
            .into_iter()
            .enumerate()
            .filter_map(|(idx, value)| match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(err) => {
                    tracing::warn!(
                        key = %self.full_key(key),
                        index = idx,
                        error = %err,
                        "skipping undecodable record"
                    );
                    None
                }
            })
            .collect();
        if records.len() != total {
            tracing::debug!(
                key = %self.full_key(key),
                kept = records.len(),
                total,
                "loaded collection with skipped records"
            );
        }
        records
    }

    /// Returns `false` when the stored text was already identical.
    pub fn save<T: Serialize + ?Sized>(&self, key: StoreKey, value: &T) -> Result<bool, StoreError> {
        let full = self.full_key(key);
        let text = serde_json::to_string(value).map_err(|source| StoreError::Encode {
            key: full.clone(),
            source,
        })?;
        if self.backend.get(&full)?.as_deref() == Some(text.as_str()) {
            return Ok(false);
        }
        self.backend.set(&full, &text)?;
        tracing::debug!(key = %full, bytes = text.len(), "saved");
        Ok(true)
    }

    pub fn remove(&self, key: StoreKey) -> Result<(), StoreError> {
        self.backend.remove(&self.full_key(key))
    }

    /// Removes every key this application owns. Irreversible.
    pub fn clear(&self) -> Result<(), StoreError> {
        let owned: Vec<String> = StoreKey::ALL.iter().map(|k| self.full_key(*k)).collect();
        for key in self.backend.keys()? {
            if owned.contains(&key) {
                self.backend.remove(&key)?;
            }
        }
        tracing::info!(prefix = %self.prefix, "cleared all stores");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataScope {
    Explicit,
    Project,
    Global,
}

impl DataScope {
    pub fn label(&self) -> &'static str {
        match self {
            DataScope::Explicit => "explicit",
            DataScope::Project => "project",
            DataScope::Global => "global",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataLocation {
    pub dir: PathBuf,
    pub scope: DataScope,
}

impl DataLocation {
    pub fn open(&self, prefix: &str) -> KeyedStore {
        KeyedStore::new(Arc::new(FileBackend::new(&self.dir)), prefix)
    }
}

pub fn init_project_dir() -> Result<DataLocation> {
    let cwd = env::current_dir()?;
    let dir = cwd.join(PROJECT_DIR);
    fs::create_dir_all(&dir).context("failed to create .focusflow directory")?;
    Ok(DataLocation {
        dir,
        scope: DataScope::Project,
    })
}

pub fn locate_data_dir(explicit: Option<PathBuf>, start: &Path) -> Result<DataLocation> {
    if let Some(dir) = explicit.or_else(|| env::var_os(DATA_DIR_ENV).map(PathBuf::from)) {
        return Ok(DataLocation {
            dir,
            scope: DataScope::Explicit,
        });
    }
    if let Some(dir) = find_project_dir(start) {
        return Ok(DataLocation {
            dir,
            scope: DataScope::Project,
        });
    }
    Ok(DataLocation {
        dir: global_data_dir()?,
        scope: DataScope::Global,
    })
}

fn find_project_dir(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(PROJECT_DIR);
        if candidate.is_dir() {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}

fn global_data_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "focusflow").context("locating data directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_absent_key_returns_default() {
        let store = KeyedStore::in_memory();
        let rounds: u32 = store.load(StoreKey::PomodoroRounds, || 7);
        assert_eq!(rounds, 7);
    }

    #[test]
    fn malformed_json_falls_back_to_default() {
        let backend = Arc::new(MemoryBackend::default());
        backend.set("focusflow_habits", "{not json").unwrap();
        let store = KeyedStore::new(backend, DEFAULT_PREFIX);
        let habits: Vec<serde_json::Value> = store.load(StoreKey::Habits, Vec::new);
        assert!(habits.is_empty());
    }

    #[test]
    fn load_records_skips_only_bad_entries() {
        let backend = Arc::new(MemoryBackend::default());
        backend
            .set("focusflow_quick_tasks", r#"[1, "two", 3]"#)
            .unwrap();
        let store = KeyedStore::new(backend, DEFAULT_PREFIX);
        let numbers: Vec<u32> = store.load_records(StoreKey::QuickTasks);
        assert_eq!(numbers, vec![1, 3]);
    }

    #[test]
    fn save_skips_identical_write() {
        let store = KeyedStore::in_memory();
        assert!(store.save(StoreKey::PomodoroRounds, &3u32).unwrap());
        assert!(!store.save(StoreKey::PomodoroRounds, &3u32).unwrap());
        assert!(store.save(StoreKey::PomodoroRounds, &4u32).unwrap());
        assert_eq!(store.raw(StoreKey::PomodoroRounds).as_deref(), Some("4"));
    }

    #[test]
    fn clear_leaves_foreign_keys() {
        let backend = Arc::new(MemoryBackend::default());
        backend.set("other_app_state", "1").unwrap();
        let store = KeyedStore::new(backend.clone(), DEFAULT_PREFIX);
        store.save(StoreKey::Tasks, &Vec::<u32>::new()).unwrap();
        store.save(StoreKey::PomodoroRounds, &2u32).unwrap();
        store.clear().unwrap();
        assert_eq!(backend.keys().unwrap(), vec!["other_app_state".to_string()]);
    }

    #[test]
    fn poisoned_memory_backend_reports_unavailable() {
        let backend = Arc::new(MemoryBackend::default());
        let holder = Arc::clone(&backend);
        let _ = std::thread::spawn(move || {
            let _guard = holder.entries.lock().unwrap();
            panic!("poisoning the lock");
        })
        .join();
        let store = KeyedStore::new(backend, DEFAULT_PREFIX);
        assert!(matches!(
            store.save(StoreKey::PomodoroRounds, &1u32),
            Err(StoreError::Unavailable(_))
        ));
        let rounds: u32 = store.load(StoreKey::PomodoroRounds, || 0);
        assert_eq!(rounds, 0);
    }

    #[test]
    fn file_backend_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DataLocation {
            dir: dir.path().join("data"),
            scope: DataScope::Explicit,
        }
        .open(DEFAULT_PREFIX);
        assert!(store.raw(StoreKey::Tasks).is_none());
        store.save(StoreKey::Tasks, &vec![1, 2, 3]).unwrap();
        let loaded: Vec<u32> = store.load(StoreKey::Tasks, Vec::new);
        assert_eq!(loaded, vec![1, 2, 3]);
        assert!(dir.path().join("data/focusflow_tasks.json").exists());
        store.remove(StoreKey::Tasks).unwrap();
        store.remove(StoreKey::Tasks).unwrap();
        assert!(store.raw(StoreKey::Tasks).is_none());
    }

    #[test]
    fn project_dir_found_from_nested_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join(".focusflow")).unwrap();
        let nested = dir.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();
        let location = locate_data_dir(None, &nested);
        // the env override wins when set in the test environment
        if env::var_os(DATA_DIR_ENV).is_none() {
            let location = location.unwrap();
            assert_eq!(location.scope, DataScope::Project);
            assert_eq!(location.dir, dir.path().join(".focusflow"));
        }
    }

    #[test]
    fn store_key_suffixes_round_trip() {
        for key in StoreKey::ALL {
            assert_eq!(StoreKey::from_suffix(key.suffix()), Some(key));
        }
        assert_eq!(StoreKey::from_suffix("settings"), None);
    }
}
