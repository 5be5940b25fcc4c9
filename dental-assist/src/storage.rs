use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::debounce::Debouncer;
use crate::error::StorageError;

/// Prefix applied to every key written through [`LocalStorage`].
pub const STORAGE_PREFIX: &str = "iamigos_";

/// Default byte quota for a store.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Keys the assistant persists.
pub mod keys {
    pub const CHAT_HISTORY: &str = "chat_history";
    pub const REIMBURSEMENT_HISTORY: &str = "reimbursement_history";
    pub const REIMBURSEMENT_FORM_DATA: &str = "reimbursement_form_data";
    pub const SESSION_ATTRIBUTES: &str = "session_attributes";
    pub const USER_ID: &str = "user_id";
}

/// Raw string key-value backend
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set_item(&self, key: &str, value: String) -> Result<(), StorageError>;
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

/// Fails when writing `value` under `key` would push the total over `quota`.
fn check_quota(
    entries: &DashMap<String, String>,
    quota: Option<usize>,
    key: &str,
    value: &str,
) -> Result<(), StorageError> {
    let Some(quota) = quota else {
        return Ok(());
    };
    let current: usize = entries
        .iter()
        .filter(|e| e.key() != key)
        .map(|e| entry_size(e.key(), e.value()))
        .sum();
    let needed = current + entry_size(key, value);
    if needed > quota {
        return Err(StorageError::QuotaExceeded {
            key: key.to_string(),
            needed,
            quota,
        });
    }
    Ok(())
}

/// In-memory implementation of KeyValueStore
pub struct InMemoryKeyValueStore {
    entries: Arc<DashMap<String, String>>,
    quota: Option<usize>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            quota: None,
        }
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            quota: Some(quota),
        }
    }
}

impl Default for InMemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).map(|entry| entry.clone()))
    }

    async fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
        check_quota(&self.entries, self.quota, key, &value)?;
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Store kept in memory and mirrored to a single JSON file.
///
/// Writes update memory immediately; the file is rewritten once per burst of
/// writes. Call [`JsonFileStore::flush`] before shutdown to persist anything
/// still pending.
pub struct JsonFileStore {
    path: PathBuf,
    entries: Arc<DashMap<String, String>>,
    quota: Option<usize>,
    flusher: Debouncer,
    write_lock: Arc<Mutex<()>>,
}

const FLUSH_DELAY: Duration = Duration::from_millis(250);

impl JsonFileStore {
    /// Load `path` if it exists. An unreadable or corrupt file is logged and
    /// the store starts empty.
    pub async fn open(path: impl AsRef<Path>, quota: Option<usize>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = DashMap::new();

        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(map) => {
                    for (key, value) in map {
                        entries.insert(key, value);
                    }
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Discarding corrupt store file"),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Store file not found, starting empty");
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to read store file"),
        }

        Self {
            path,
            entries: Arc::new(entries),
            quota,
            flusher: Debouncer::new(FLUSH_DELAY),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current contents to disk now.
    pub async fn flush(&self) -> Result<(), StorageError> {
        self.flusher.cancel();
        write_snapshot(&self.path, &self.entries, &self.write_lock).await
    }

    fn schedule_flush(&self) {
        let path = self.path.clone();
        let entries = self.entries.clone();
        let write_lock = self.write_lock.clone();
        self.flusher.call(async move {
            // Detached so cancelling the timer never aborts a write halfway.
            tokio::spawn(async move {
                if let Err(e) = write_snapshot(&path, &entries, &write_lock).await {
                    error!(path = %path.display(), error = %e, "Failed to flush store file");
                }
            });
        });
    }
}

/// Snapshots are taken under `write_lock`, so the last writer always holds the
/// newest contents and only one write touches the temp file at a time.
async fn write_snapshot(
    path: &Path,
    entries: &DashMap<String, String>,
    write_lock: &Mutex<()>,
) -> Result<(), StorageError> {
    let _guard = write_lock.lock().await;
    let snapshot: BTreeMap<String, String> = entries
        .iter()
        .map(|e| (e.key().clone(), e.value().clone()))
        .collect();
    let body = serde_json::to_vec_pretty(&snapshot)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, body).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).map(|entry| entry.clone()))
    }

    async fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
        check_quota(&self.entries, self.quota, key, &value)?;
        self.entries.insert(key.to_string(), value);
        self.schedule_flush();
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        if self.entries.remove(key).is_some() {
            self.schedule_flush();
        }
        Ok(())
    }
}

/// JSON wrapper over a [`KeyValueStore`] that never fails.
///
/// Every key is namespaced with [`STORAGE_PREFIX`]. Storage and parse errors
/// are logged; reads fall back to the caller's default and writes report
/// `false`.
#[derive(Clone)]
pub struct LocalStorage {
    backend: Arc<dyn KeyValueStore>,
    prefix: String,
}

impl LocalStorage {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            prefix: STORAGE_PREFIX.to_string(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryKeyValueStore::new()))
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                error!(key = %key, error = %e, "Failed to serialize value for storage");
                return false;
            }
        };
        match self.backend.set_item(&self.full_key(key), raw).await {
            Ok(()) => true,
            Err(e) => {
                error!(key = %key, error = %e, "Failed to write to storage");
                false
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let raw = match self.backend.get_item(&self.full_key(key)).await {
            Ok(Some(raw)) if !raw.is_empty() => raw,
            Ok(_) => return default,
            Err(e) => {
                error!(key = %key, error = %e, "Failed to read from storage");
                return default;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                error!(key = %key, error = %e, "Stored value could not be parsed");
                default
            }
        }
    }

    pub async fn get_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        self.get(key, T::default()).await
    }

    pub async fn remove(&self, key: &str) -> bool {
        match self.backend.remove_item(&self.full_key(key)).await {
            Ok(()) => true,
            Err(e) => {
                error!(key = %key, error = %e, "Failed to remove from storage");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Draft {
        name: String,
        tags: Vec<String>,
        nested: BTreeMap<String, u32>,
    }

    fn draft() -> Draft {
        Draft {
            name: "Maria".into(),
            tags: vec!["premium".into(), "ortodontia".into()],
            nested: BTreeMap::from([("a".to_string(), 1), ("b".to_string(), 2)]),
        }
    }

    #[tokio::test]
    async fn round_trip_is_deep_equal() {
        let storage = LocalStorage::in_memory();
        assert!(storage.set("draft", &draft()).await);
        let back: Option<Draft> = storage.get("draft", None).await;
        assert_eq!(back, Some(draft()));
    }

    #[tokio::test]
    async fn missing_key_returns_default() {
        let storage = LocalStorage::in_memory();
        let value: Vec<String> = storage.get("nothing", vec!["fallback".into()]).await;
        assert_eq!(value, vec!["fallback".to_string()]);
    }

    #[tokio::test]
    async fn corrupted_value_returns_default() {
        let backend = Arc::new(InMemoryKeyValueStore::new());
        backend
            .set_item("iamigos_draft", "{not json".to_string())
            .await
            .unwrap();
        let storage = LocalStorage::new(backend);

        let value: Vec<u32> = storage.get("draft", vec![7]).await;
        assert_eq!(value, vec![7]);
    }

    #[tokio::test]
    async fn keys_are_prefixed() {
        let backend = Arc::new(InMemoryKeyValueStore::new());
        let storage = LocalStorage::new(backend.clone());
        storage.set(keys::USER_ID, "user_1").await;

        assert_eq!(
            backend.get_item("iamigos_user_id").await.unwrap().as_deref(),
            Some("\"user_1\"")
        );
        assert!(storage.remove(keys::USER_ID).await);
        assert!(backend.get_item("iamigos_user_id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn quota_failure_is_swallowed_and_keeps_previous_value() {
        let storage = LocalStorage::new(Arc::new(InMemoryKeyValueStore::with_quota(64)));
        assert!(storage.set("k", "small").await);
        assert!(!storage.set("k", &"x".repeat(100)).await);

        let value: String = storage.get("k", String::new()).await;
        assert_eq!(value, "small");
    }

    #[tokio::test]
    async fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = Arc::new(JsonFileStore::open(&path, None).await);
        let storage = LocalStorage::new(store.clone());
        storage.set("draft", &draft()).await;
        store.flush().await.unwrap();

        let reopened = LocalStorage::new(Arc::new(JsonFileStore::open(&path, None).await));
        let back: Option<Draft> = reopened.get("draft", None).await;
        assert_eq!(back, Some(draft()));
    }

    #[tokio::test]
    async fn overlapping_flushes_leave_the_latest_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = Arc::new(JsonFileStore::open(&path, None).await);

        for i in 0..20 {
            store.set_item("iamigos_n", i.to_string()).await.unwrap();
            if i % 5 == 0 {
                tokio::time::sleep(FLUSH_DELAY + Duration::from_millis(20)).await;
            }
        }
        let (first, second) = tokio::join!(store.flush(), store.flush());
        first.unwrap();
        second.unwrap();
        tokio::time::sleep(FLUSH_DELAY * 2).await;

        let reopened = JsonFileStore::open(&path, None).await;
        assert_eq!(
            reopened.get_item("iamigos_n").await.unwrap().as_deref(),
            Some("19")
        );
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        tokio::fs::write(&path, "[[[").await.unwrap();

        let store = JsonFileStore::open(&path, None).await;
        assert!(store.get_item("iamigos_draft").await.unwrap().is_none());
    }
}
