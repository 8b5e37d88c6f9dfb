use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum StoreValue {
    Flag(bool),
    Int(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEdit {
    Put(String, StoreValue),
    Remove(String),
}

impl StoreEdit {
    pub fn put_text(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Put(key.into(), StoreValue::Text(value.into()))
    }

    pub fn put_int(key: impl Into<String>, value: i64) -> Self {
        Self::Put(key.into(), StoreValue::Int(value))
    }

    pub fn put_flag(key: impl Into<String>, value: bool) -> Self {
        Self::Put(key.into(), StoreValue::Flag(value))
    }

    pub fn remove(key: impl Into<String>) -> Self {
        Self::Remove(key.into())
    }
}

/// Durable key/value storage.
///
/// `apply` must not return until the whole batch is durable; a failed batch
/// leaves the visible contents unchanged.
pub trait PersistentStore: Send + Sync {
    fn get(&self, key: &str) -> Option<StoreValue>;

    fn apply(&self, edits: Vec<StoreEdit>) -> Result<(), StorageError>;

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;

    fn get_text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            StoreValue::Text(value) => Some(value),
            StoreValue::Int(value) => Some(value.to_string()),
            StoreValue::Flag(value) => Some(value.to_string()),
        }
    }

    fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            StoreValue::Int(value) => Some(value),
            StoreValue::Text(value) => value.trim().parse().ok(),
            StoreValue::Flag(_) => None,
        }
    }

    fn get_flag(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            StoreValue::Flag(value) => Some(value),
            StoreValue::Int(value) => Some(value != 0),
            StoreValue::Text(value) => value.trim().parse().ok(),
        }
    }

    fn put(&self, edit: StoreEdit) -> Result<(), StorageError> {
        self.apply(vec![edit])
    }
}

fn apply_edits(map: &mut BTreeMap<String, StoreValue>, edits: Vec<StoreEdit>) {
    for edit in edits {
        match edit {
            StoreEdit::Put(key, value) => {
                map.insert(key, value);
            }
            StoreEdit::Remove(key) => {
                map.remove(&key);
            }
        }
    }
}

fn prefixed_keys(map: &BTreeMap<String, StoreValue>, prefix: &str) -> Vec<String> {
    map.range(prefix.to_string()..)
        .take_while(|(key, _)| key.starts_with(prefix))
        .map(|(key, _)| key.clone())
        .collect()
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<BTreeMap<String, StoreValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl PersistentStore for MemoryStore {
    fn get(&self, key: &str) -> Option<StoreValue> {
        self.values.read().get(key).cloned()
    }

    fn apply(&self, edits: Vec<StoreEdit>) -> Result<(), StorageError> {
        apply_edits(&mut self.values.write(), edits);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        prefixed_keys(&self.values.read(), prefix)
    }
}

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, StoreValue>>,
}

impl FileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|source| io_error(&path, source))?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
                }
            }
            BTreeMap::new()
        };
        tracing::debug!(path = %path.display(), keys = values.len(), "opened notification store");
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_document(&self, values: &BTreeMap<String, StoreValue>) -> Result<(), StorageError> {
        let encoded = serde_json::to_vec_pretty(values)?;
        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);

        let mut file = File::create(&tmp_path).map_err(|source| io_error(&tmp_path, source))?;
        file.write_all(&encoded)
            .and_then(|_| file.sync_all())
            .map_err(|source| io_error(&tmp_path, source))?;
        fs::rename(&tmp_path, &self.path).map_err(|source| io_error(&self.path, source))?;
        Ok(())
    }
}

impl PersistentStore for FileStore {
    fn get(&self, key: &str) -> Option<StoreValue> {
        self.values.read().get(key).cloned()
    }

    fn apply(&self, edits: Vec<StoreEdit>) -> Result<(), StorageError> {
        let mut guard = self.values.write();
        let mut next = guard.clone();
        apply_edits(&mut next, edits);
        self.write_document(&next)?;
        *guard = next;
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        prefixed_keys(&self.values.read(), prefix)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn typed_accessors_coerce_compatible_values() {
        let store = MemoryStore::new();
        store
            .apply(vec![
                StoreEdit::put_int("count", 7),
                StoreEdit::put_text("numeric", " 12 "),
                StoreEdit::put_flag("enabled", true),
            ])
            .unwrap();

        assert_eq!(store.get_int("count"), Some(7));
        assert_eq!(store.get_int("numeric"), Some(12));
        assert_eq!(store.get_text("count").as_deref(), Some("7"));
        assert_eq!(store.get_flag("enabled"), Some(true));
        assert_eq!(store.get_flag("missing"), None);
    }

    #[test]
    fn prefix_listing_stops_at_prefix_boundary() {
        let store = MemoryStore::new();
        store
            .apply(vec![
                StoreEdit::put_text("schedule.entry.1", "a"),
                StoreEdit::put_text("schedule.entry.2", "b"),
                StoreEdit::put_text("schedule.ids", "1,2"),
                StoreEdit::put_text("zzz", "c"),
            ])
            .unwrap();
        assert_eq!(
            store.keys_with_prefix("schedule.entry."),
            vec!["schedule.entry.1".to_string(), "schedule.entry.2".to_string()]
        );
    }

    #[test]
    fn file_store_survives_reopen() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("store.json");

        {
            let store = FileStore::open(&path).expect("open store");
            store
                .apply(vec![
                    StoreEdit::put_text("schedule.ids", "4,9"),
                    StoreEdit::put_int("badge.count", 3),
                    StoreEdit::put_flag("prefs.enabled", false),
                ])
                .expect("write batch");
            store.put(StoreEdit::remove("schedule.ids")).expect("remove");
        }

        let reopened = FileStore::open(&path).expect("reopen store");
        assert_eq!(reopened.get_text("schedule.ids"), None);
        assert_eq!(reopened.get_int("badge.count"), Some(3));
        assert_eq!(reopened.get_flag("prefs.enabled"), Some(false));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn file_store_failed_write_keeps_previous_view() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("store.json");
        let store = FileStore::open(&path).expect("open store");
        store.put(StoreEdit::put_int("badge.count", 1)).unwrap();

        // Replace the target with a directory so the rename fails.
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        let result = store.put(StoreEdit::put_int("badge.count", 2));
        assert!(matches!(result, Err(StorageError::Io { .. })));
        assert_eq!(store.get_int("badge.count"), Some(1));
    }
}
