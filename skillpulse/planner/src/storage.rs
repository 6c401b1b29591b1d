use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::NaiveDate;
use parking_lot::RwLock;
use thiserror::Error;

use crate::tasks::Task;

/// Prefix of every persisted day key.
pub const KEY_PREFIX: &str = "time_planner_tasks_";

/// Storage key of a date: `time_planner_tasks_YYYY-MM-DD`.
#[must_use]
pub fn day_key(date: NaiveDate) -> String {
    format!("{KEY_PREFIX}{}", date.format("%Y-%m-%d"))
}

/// Date encoded in a day key, if it is one.
#[must_use]
pub fn date_from_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key.strip_prefix(KEY_PREFIX)?, "%Y-%m-%d").ok()
}

/// Errors emitted by day storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// Stored value is not a task list.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Key with characters a file name cannot carry.
    #[error("invalid storage key `{0}`")]
    InvalidKey(String),
}

/// String key/value store holding one serialized task list per date.
pub trait DayStorage {
    /// Value stored under `key`.
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;
    /// Replaces the value under `key`.
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Removes `key`; missing keys are fine.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
    /// All keys, sorted.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

impl<T: DayStorage + ?Sized> DayStorage for Arc<T> {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).save(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        (**self).keys()
    }
}

/// Loads the task list of `date`; a missing entry is an empty day.
pub fn load_tasks<S: DayStorage + ?Sized>(
    storage: &S,
    date: NaiveDate,
) -> Result<Vec<Task>, StorageError> {
    match storage.load(&day_key(date))? {
        Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
        _ => Ok(Vec::new()),
    }
}

/// Writes the complete task list of `date`.
pub fn save_tasks<S: DayStorage + ?Sized>(
    storage: &S,
    date: NaiveDate,
    tasks: &[Task],
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(tasks)?;
    storage.save(&day_key(date), &raw)
}

/// Process-local storage, the stand-in for browser local storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStorage {
    /// Empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DayStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}

/// One `<key>.json` file per entry under a base directory.
#[derive(Debug, Clone)]
pub struct DirStorage {
    base_path: PathBuf,
}

impl DirStorage {
    /// Storage rooted at `base_path`; the directory is created on first save.
    #[must_use]
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Root directory.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(format!("{key}.json")))
    }
}

impl DayStorage for DirStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.entry_path(key)?) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.entry_path(key)?;
        fs::create_dir_all(&self.base_path)?;
        fs::write(path, value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.entry_path(key)?) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let read_dir = match fs::read_dir(&self.base_path) {
            Ok(read_dir) => read_dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut keys: Vec<String> = read_dir
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().map_or(false, |ext| ext == "json") {
                    path.file_stem()
                        .and_then(|stem| stem.to_str())
                        .map(str::to_string)
                } else {
                    None
                }
            })
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::Priority;
    use tempfile::tempdir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn key_uses_iso_date() {
        assert_eq!(day_key(date()), "time_planner_tasks_2024-01-01");
        assert_eq!(date_from_key("time_planner_tasks_2024-01-01"), Some(date()));
        assert_eq!(date_from_key("skillpulse_user"), None);
    }

    #[test]
    fn missing_day_is_empty() {
        let storage = MemoryStorage::new();
        assert!(load_tasks(&storage, date()).unwrap().is_empty());
    }

    #[test]
    fn dir_storage_persists_task_lists() {
        let dir = tempdir().unwrap();
        let storage = DirStorage::new(dir.path().join("days"));
        let mut task = Task::new(7, "Read chapter", 45, Priority::Low);
        task.assigned_slot_id = Some("7-30".into());
        save_tasks(&storage, date(), &[task.clone()]).unwrap();

        assert!(dir
            .path()
            .join("days")
            .join("time_planner_tasks_2024-01-01.json")
            .exists());
        assert_eq!(load_tasks(&storage, date()).unwrap(), vec![task]);
        assert_eq!(storage.keys().unwrap(), vec![day_key(date())]);

        storage.remove(&day_key(date())).unwrap();
        storage.remove(&day_key(date())).unwrap();
        assert!(storage.load(&day_key(date())).unwrap().is_none());
    }

    #[test]
    fn dir_storage_rejects_path_like_keys() {
        let dir = tempdir().unwrap();
        let storage = DirStorage::new(dir.path());
        assert!(matches!(
            storage.save("../escape", "[]"),
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[test]
    fn corrupt_value_is_a_serialization_error() {
        let storage = MemoryStorage::new();
        storage.save(&day_key(date()), "{not json").unwrap();
        assert!(matches!(
            load_tasks(&storage, date()),
            Err(StorageError::Serialization(_))
        ));
    }
}
