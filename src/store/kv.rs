use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store contents could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl StoredValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            StoredValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StoredValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StoredValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// Read/write contract of the persisted key/value backend. Implementations
/// may block; callers on latency-sensitive paths go through `DurableState`.
pub trait KeyValueStore: Send + Sync {
    fn load_all(&self) -> Result<HashMap<String, StoredValue>, StoreError>;
    fn put(&self, key: &str, value: StoredValue) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, StoredValue>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: HashMap<String, StoredValue>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    pub fn get(&self, key: &str) -> Option<StoredValue> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl KeyValueStore for InMemoryStore {
    fn load_all(&self) -> Result<HashMap<String, StoredValue>, StoreError> {
        Ok(self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn put(&self, key: &str, value: StoredValue) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// Whole map persisted as one pretty-printed JSON object, rewritten on every put.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, StoredValue>>,
}

impl FileStore {
    /// Reads the existing file if there is one. A missing file is an empty store.
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn save(&self, entries: &HashMap<String, StoredValue>) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn load_all(&self) -> Result<HashMap<String, StoredValue>, StoreError> {
        Ok(self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn put(&self, key: &str, value: StoredValue) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value);
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}
