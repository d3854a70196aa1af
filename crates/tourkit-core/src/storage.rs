#![forbid(unsafe_code)]

//! Local key-value persistence.
//!
//! Everything the engine persists across reloads (dismissed highlight ids,
//! session identity, the analytics backlog) is an opaque JSON blob under a
//! fixed key namespace. Backends are pluggable: [`MemoryStorage`] for tests
//! and ephemeral sessions, [`FileStorage`] for hosts with a filesystem. A
//! browser host would implement [`StorageBackend`] over localStorage.
//!
//! # Design Invariants
//!
//! 1. **Graceful degradation**: storage failures never panic; typed loads
//!    fall back to `Default::default()` with a warning.
//! 2. **Atomic writes**: file storage uses a write-rename pattern so a
//!    crash mid-write can't corrupt previously persisted state.
//! 3. **Corrupt blobs are empty blobs**: an unparseable value decodes as
//!    the default, never as an error crossing the engine boundary.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Fixed namespace prefixed to every persisted key.
pub const KEY_NAMESPACE: &str = "tourkit";

/// Persisted key: set of dismissed highlight ids.
pub const KEY_DISMISSED_HIGHLIGHTS: &str = "dismissed_highlights";
/// Persisted key: set of read announcement ids.
pub const KEY_READ_ANNOUNCEMENTS: &str = "read_announcements";
/// Persisted key: session identity blob.
pub const KEY_SESSION: &str = "session";
/// Persisted key: pending analytics event backlog.
pub const KEY_EVENT_BACKLOG: &str = "event_backlog";

/// Build the namespaced form of a key (`tourkit::{key}`).
#[must_use]
pub fn scoped_key(key: &str) -> String {
    format!("{KEY_NAMESPACE}::{key}")
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error during file operations.
    Io(std::io::Error),
    /// JSON encode/decode failure.
    Serialization(String),
    /// Backend state is inconsistent (poisoned lock, bad file format).
    Corruption(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {e}"),
            StorageError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            StorageError::Corruption(msg) => write!(f, "storage corruption: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

/// Pluggable key-value persistence backend.
///
/// Values are opaque JSON. Implementations must make `put` atomic with
/// respect to crashes (all-or-nothing per key).
pub trait StorageBackend {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Fetch the blob stored under `key`, if any.
    fn get(&self, key: &str) -> StorageResult<Option<Value>>;

    /// Store `value` under `key`, replacing any previous blob.
    fn put(&self, key: &str, value: Value) -> StorageResult<()>;

    /// Remove the blob under `key`. Removing a missing key is a no-op.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Check if the backend is available and functional.
    fn is_available(&self) -> bool {
        true
    }
}

/// Load and decode a persisted value, falling back to the default.
///
/// Missing keys, backend failures, and corrupt blobs all decode as
/// `T::default()`; failures are logged, never propagated. This is the only
/// read path the engine uses for its own state.
#[must_use]
pub fn load_json<T: DeserializeOwned + Default>(backend: &dyn StorageBackend, key: &str) -> T {
    let scoped = scoped_key(key);
    match backend.get(&scoped) {
        Ok(Some(value)) => match serde_json::from_value(value) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(key = %scoped, error = %e, "corrupt persisted blob, using default");
                T::default()
            }
        },
        Ok(None) => T::default(),
        Err(e) => {
            tracing::warn!(key = %scoped, error = %e, "storage read failed, using default");
            T::default()
        }
    }
}

/// Encode and persist a value under a namespaced key.
pub fn store_json<T: Serialize>(
    backend: &dyn StorageBackend,
    key: &str,
    value: &T,
) -> StorageResult<()> {
    let encoded = serde_json::to_value(value)
        .map_err(|e| StorageError::Serialization(format!("failed to encode {key}: {e}")))?;
    backend.put(&scoped_key(key), encoded)
}

// ---------------------------------------------------------------------------
// Memory storage
// ---------------------------------------------------------------------------

/// In-memory backend for testing and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, Value>>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().map(|d| d.len()).unwrap_or(0)
    }

    /// Check if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageBackend for MemoryStorage {
    fn name(&self) -> &str {
        "MemoryStorage"
    }

    fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        let guard = self
            .data
            .read()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        Ok(guard.get(key).cloned())
    }

    fn put(&self, key: &str, value: Value) -> StorageResult<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        guard.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        guard.remove(key);
        Ok(())
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("keys", &self.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// File storage
// ---------------------------------------------------------------------------

mod file_storage {
    use super::*;
    use serde::Deserialize;
    use std::fs::{self, File};
    use std::io::{BufReader, BufWriter, Write};
    use std::path::{Path, PathBuf};

    /// On-disk format: a single JSON document holding every key.
    #[derive(Serialize, Deserialize)]
    struct StateFile {
        /// Format version for future migrations.
        format_version: u32,
        entries: HashMap<String, Value>,
    }

    impl StateFile {
        const FORMAT_VERSION: u32 = 1;

        fn new() -> Self {
            Self {
                format_version: Self::FORMAT_VERSION,
                entries: HashMap::new(),
            }
        }
    }

    /// File-backed storage: one JSON file, atomic write-rename updates.
    ///
    /// Each `put`/`remove` is a read-modify-write of the whole file:
    /// 1. Read and parse the current file (corrupt or missing = empty).
    /// 2. Apply the change in memory.
    /// 3. Write to `{path}.tmp`, flush, sync, rename over `{path}`.
    pub struct FileStorage {
        path: PathBuf,
    }

    impl FileStorage {
        /// Create file storage at the given path. The file is created on
        /// first write.
        #[must_use]
        pub fn new(path: impl AsRef<Path>) -> Self {
            Self {
                path: path.as_ref().to_path_buf(),
            }
        }

        fn temp_path(&self) -> PathBuf {
            let mut tmp = self.path.clone();
            tmp.set_extension("json.tmp");
            tmp
        }

        /// Read the current file, treating a missing or corrupt file as
        /// empty rather than failing.
        fn read_entries(&self) -> HashMap<String, Value> {
            if !self.path.exists() {
                return HashMap::new();
            }
            let file = match File::open(&self.path) {
                Ok(f) => f,
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "failed to open state file, treating as empty");
                    return HashMap::new();
                }
            };
            let state: StateFile = match serde_json::from_reader(BufReader::new(file)) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "corrupt state file, treating as empty");
                    return HashMap::new();
                }
            };
            if state.format_version != StateFile::FORMAT_VERSION {
                tracing::warn!(
                    stored = state.format_version,
                    expected = StateFile::FORMAT_VERSION,
                    "state file format version mismatch, ignoring stored state"
                );
                return HashMap::new();
            }
            state.entries
        }

        fn write_entries(&self, entries: HashMap<String, Value>) -> StorageResult<()> {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }

            let state = StateFile {
                format_version: StateFile::FORMAT_VERSION,
                entries,
            };

            let tmp_path = self.temp_path();
            {
                let file = File::create(&tmp_path)?;
                let mut writer = BufWriter::new(file);
                serde_json::to_writer(&mut writer, &state).map_err(|e| {
                    StorageError::Serialization(format!("failed to serialize state: {e}"))
                })?;
                writer.flush()?;
                writer.get_ref().sync_all()?;
            }
            fs::rename(&tmp_path, &self.path)?;
            Ok(())
        }
    }

    impl StorageBackend for FileStorage {
        fn name(&self) -> &str {
            "FileStorage"
        }

        fn get(&self, key: &str) -> StorageResult<Option<Value>> {
            Ok(self.read_entries().remove(key))
        }

        fn put(&self, key: &str, value: Value) -> StorageResult<()> {
            let mut entries = self.read_entries();
            entries.insert(key.to_string(), value);
            self.write_entries(entries)
        }

        fn remove(&self, key: &str) -> StorageResult<()> {
            let mut entries = self.read_entries();
            if entries.remove(key).is_none() {
                return Ok(());
            }
            self.write_entries(entries)
        }

        fn is_available(&self) -> bool {
            if let Some(parent) = self.path.parent() {
                if !parent.exists() {
                    return fs::create_dir_all(parent).is_ok();
                }
                let probe = parent.join(".tourkit_write_probe");
                if fs::write(&probe, b"probe").is_ok() {
                    let _ = fs::remove_file(&probe);
                    return true;
                }
            }
            false
        }
    }

    impl fmt::Debug for FileStorage {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("FileStorage")
                .field("path", &self.path)
                .finish()
        }
    }
}

pub use file_storage::FileStorage;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        assert!(storage.get("k").unwrap().is_none());

        storage.put("k", serde_json::json!({"a": 1})).unwrap();
        assert_eq!(storage.get("k").unwrap(), Some(serde_json::json!({"a": 1})));

        storage.remove("k").unwrap();
        assert!(storage.get("k").unwrap().is_none());
    }

    #[test]
    fn scoped_key_uses_namespace() {
        assert_eq!(scoped_key("session"), "tourkit::session");
    }

    #[test]
    fn load_json_missing_is_default() {
        let storage = MemoryStorage::new();
        let ids: BTreeSet<String> = load_json(&storage, KEY_DISMISSED_HIGHLIGHTS);
        assert!(ids.is_empty());
    }

    #[test]
    fn load_json_corrupt_is_default() {
        let storage = MemoryStorage::new();
        storage
            .put(
                &scoped_key(KEY_DISMISSED_HIGHLIGHTS),
                serde_json::json!("not a set"),
            )
            .unwrap();
        let ids: BTreeSet<String> = load_json(&storage, KEY_DISMISSED_HIGHLIGHTS);
        assert!(ids.is_empty());
    }

    #[test]
    fn store_then_load_round_trips() {
        let storage = MemoryStorage::new();
        let mut ids = BTreeSet::new();
        ids.insert("h1".to_string());
        ids.insert("h2".to_string());

        store_json(&storage, KEY_DISMISSED_HIGHLIGHTS, &ids).unwrap();
        let loaded: BTreeSet<String> = load_json(&storage, KEY_DISMISSED_HIGHLIGHTS);
        assert_eq!(loaded, ids);
    }
}

#[cfg(test)]
mod file_storage_tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_storage_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");
        let storage = FileStorage::new(&path);

        storage.put("a", serde_json::json!([1, 2, 3])).unwrap();
        assert!(path.exists());
        assert_eq!(storage.get("a").unwrap(), Some(serde_json::json!([1, 2, 3])));
    }

    #[test]
    fn file_storage_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let storage = FileStorage::new(tmp.path().join("missing.json"));
        assert!(storage.get("a").unwrap().is_none());
    }

    #[test]
    fn file_storage_corrupt_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let storage = FileStorage::new(&path);
        assert!(storage.get("a").unwrap().is_none());

        // A write replaces the corrupt file with a valid one.
        storage.put("a", serde_json::json!(true)).unwrap();
        assert_eq!(storage.get("a").unwrap(), Some(serde_json::json!(true)));
    }

    #[test]
    fn file_storage_creates_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("deep").join("state.json");
        let storage = FileStorage::new(&path);
        storage.put("k", serde_json::json!(1)).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn file_storage_remove_missing_is_noop() {
        let tmp = TempDir::new().unwrap();
        let storage = FileStorage::new(tmp.path().join("state.json"));
        storage.remove("nope").unwrap();
    }

    #[test]
    fn file_storage_preserves_other_keys_on_put() {
        let tmp = TempDir::new().unwrap();
        let storage = FileStorage::new(tmp.path().join("state.json"));
        storage.put("a", serde_json::json!(1)).unwrap();
        storage.put("b", serde_json::json!(2)).unwrap();
        assert_eq!(storage.get("a").unwrap(), Some(serde_json::json!(1)));
        assert_eq!(storage.get("b").unwrap(), Some(serde_json::json!(2)));
    }
}
