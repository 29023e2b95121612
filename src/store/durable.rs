use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::kv::{KeyValueStore, StoredValue};

pub const TIME_IN_BACKGROUND: &str = "time_in_background";
pub const CRASHED_IN_FOREGROUND: &str = "crashed_in_foreground";
pub const INSTALL_REFERRER: &str = "install_referrer";

enum WriteOp {
    Put(String, StoredValue),
    Remove(String),
    Flush(oneshot::Sender<()>),
}

/// Write-behind view over a `KeyValueStore`.
///
/// Reads are served from an in-memory cache, which stays authoritative for the
/// rest of the process if a write fails. Writes are queued to a single tokio
/// task, so they land in the order they were issued and never block the caller.
pub struct DurableState {
    cache: Mutex<HashMap<String, StoredValue>>,
    writes: mpsc::UnboundedSender<WriteOp>,
    failed_writes: Arc<AtomicU64>,
}

impl DurableState {
    pub fn open(store: Arc<dyn KeyValueStore>, runtime: &Handle) -> Self {
        let cache = match store.load_all() {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Durable state unreadable, starting empty: {}", e);
                HashMap::new()
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let failed_writes = Arc::new(AtomicU64::new(0));
        runtime.spawn(write_behind(store, rx, Arc::clone(&failed_writes)));

        Self {
            cache: Mutex::new(cache),
            writes: tx,
            failed_writes,
        }
    }

    pub fn get(&self, key: &str) -> Option<StoredValue> {
        self.cache().get(key).cloned()
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_i64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(str::to_string))
    }

    pub fn set(&self, key: &str, value: StoredValue) {
        let mut cache = self.cache();
        cache.insert(key.to_string(), value.clone());
        self.enqueue(WriteOp::Put(key.to_string(), value));
    }

    pub fn set_bool(&self, key: &str, value: bool) {
        self.set(key, StoredValue::Bool(value));
    }

    pub fn set_string(&self, key: &str, value: &str) {
        self.set(key, StoredValue::Text(value.to_string()));
    }

    pub fn remove(&self, key: &str) {
        let mut cache = self.cache();
        cache.remove(key);
        self.enqueue(WriteOp::Remove(key.to_string()));
    }

    /// Adds `delta_ms` to the cumulative background time and returns the new
    /// total. A corrupt stored value or an overflowing sum restarts from zero.
    pub fn add_background_time(&self, delta_ms: i64) -> i64 {
        let mut cache = self.cache();
        let current = match cache.get(TIME_IN_BACKGROUND) {
            None => 0,
            Some(StoredValue::Int(v)) if *v >= 0 => *v,
            Some(other) => {
                warn!("Corrupt {} value {:?}, resetting to 0", TIME_IN_BACKGROUND, other);
                0
            }
        };
        let total = current.checked_add(delta_ms.max(0)).unwrap_or_else(|| {
            warn!("{} overflowed, resetting to 0", TIME_IN_BACKGROUND);
            0
        });
        cache.insert(TIME_IN_BACKGROUND.to_string(), StoredValue::Int(total));
        self.enqueue(WriteOp::Put(TIME_IN_BACKGROUND.to_string(), StoredValue::Int(total)));
        total
    }

    pub fn background_time_ms(&self) -> i64 {
        self.get_i64(TIME_IN_BACKGROUND).filter(|v| *v >= 0).unwrap_or(0)
    }

    pub fn failed_writes(&self) -> u64 {
        self.failed_writes.load(Ordering::Relaxed)
    }

    /// Resolves once every write issued before this call has been attempted.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        self.enqueue(WriteOp::Flush(tx));
        let _ = rx.await;
    }

    fn enqueue(&self, op: WriteOp) {
        if self.writes.send(op).is_err() {
            warn!("Durable state writer is gone; keeping value in memory only");
        }
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, StoredValue>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn write_behind(
    store: Arc<dyn KeyValueStore>,
    mut rx: mpsc::UnboundedReceiver<WriteOp>,
    failed_writes: Arc<AtomicU64>,
) {
    while let Some(op) = rx.recv().await {
        let (key, result) = match op {
            WriteOp::Flush(done) => {
                let _ = done.send(());
                continue;
            }
            WriteOp::Put(key, value) => {
                let store = Arc::clone(&store);
                let k = key.clone();
                (key, tokio::task::spawn_blocking(move || store.put(&k, value)).await)
            }
            WriteOp::Remove(key) => {
                let store = Arc::clone(&store);
                let k = key.clone();
                (key, tokio::task::spawn_blocking(move || store.remove(&k)).await)
            }
        };

        match result {
            Ok(Ok(())) => debug!("Persisted {}", key),
            Ok(Err(e)) => {
                failed_writes.fetch_add(1, Ordering::Relaxed);
                warn!("Failed to persist {}: {}", key, e);
            }
            Err(e) => {
                failed_writes.fetch_add(1, Ordering::Relaxed);
                warn!("Persist task for {} aborted: {}", key, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::kv::{InMemoryStore, StoreError};

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn load_all(&self) -> Result<HashMap<String, StoredValue>, StoreError> {
            Ok(HashMap::new())
        }
        fn put(&self, _key: &str, _value: StoredValue) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk full")))
        }
        fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn writes_reach_backing_store() {
        let backing = Arc::new(InMemoryStore::new());
        let state = DurableState::open(backing.clone(), &Handle::current());
        state.set_bool(CRASHED_IN_FOREGROUND, true);
        assert_eq!(state.add_background_time(250), 250);
        assert_eq!(state.add_background_time(750), 1_000);
        state.flush().await;

        assert_eq!(backing.get(CRASHED_IN_FOREGROUND), Some(StoredValue::Bool(true)));
        assert_eq!(backing.get(TIME_IN_BACKGROUND), Some(StoredValue::Int(1_000)));
    }

    #[tokio::test]
    async fn corrupt_background_time_resets() {
        let mut seed = HashMap::new();
        seed.insert(TIME_IN_BACKGROUND.to_string(), StoredValue::Text("garbage".into()));
        let state = DurableState::open(Arc::new(InMemoryStore::with_entries(seed)), &Handle::current());
        assert_eq!(state.background_time_ms(), 0);
        assert_eq!(state.add_background_time(40), 40);
    }

    #[tokio::test]
    async fn overflow_resets_instead_of_failing() {
        let mut seed = HashMap::new();
        seed.insert(TIME_IN_BACKGROUND.to_string(), StoredValue::Int(i64::MAX - 1));
        let state = DurableState::open(Arc::new(InMemoryStore::with_entries(seed)), &Handle::current());
        assert_eq!(state.add_background_time(10), 0);
    }

    #[tokio::test]
    async fn failed_write_keeps_memory_value() {
        let state = DurableState::open(Arc::new(BrokenStore), &Handle::current());
        assert_eq!(state.add_background_time(500), 500);
        state.flush().await;
        assert_eq!(state.failed_writes(), 1);
        assert_eq!(state.background_time_ms(), 500);
    }
}
