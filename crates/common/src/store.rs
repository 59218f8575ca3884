//! Persistent key/value stores for cached fixture results
//!
//! The store outlives a single test process: results written during one run
//! are read back by the next one. Nothing here evicts entries; a stale cache
//! is dropped with [`CacheStore::clear`] or bypassed by turning caching off.

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{CacheBackend, SuiteConfig};
use crate::Result;

/// Key/value store addressed by cache key strings
pub trait CacheStore: Send + Sync {
    /// Read a value. A missing key is `Ok(None)`.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &Value) -> Result<()>;

    /// Remove one key, returning whether it existed
    fn remove(&self, key: &str) -> Result<bool>;

    /// Remove every entry, returning how many were dropped
    fn clear(&self) -> Result<usize>;

    /// All stored keys, sorted
    fn keys(&self) -> Result<Vec<String>>;
}

/// Open the store selected by the configuration
pub fn open_store(config: &SuiteConfig) -> Result<Arc<dyn CacheStore>> {
    let store: Arc<dyn CacheStore> = match config.cache_backend {
        CacheBackend::File => Arc::new(FileCacheStore::new(&config.cache_dir)?),
        CacheBackend::Sqlite => Arc::new(SqliteCacheStore::open(config.cache_dir.join("cache.db"))?),
    };
    Ok(store)
}

/// Stored form of one file-store entry. The key travels with the value
/// because the file name is only its digest.
#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    key: String,
    value: Value,
}

/// One JSON file per key under `<root>/v/`, named by the SHA-256 of the key
/// and sharded by the first two hex digits. Any string is a valid key. Safe
/// to share between worker processes.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    root: PathBuf,
}

impl FileCacheStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        std::fs::create_dir_all(root.join("v"))?;
        std::fs::create_dir_all(root.join("tmp"))?;

        info!("Initialized fixture cache at {:?}", root);

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn values_dir(&self) -> PathBuf {
        self.root.join("v")
    }

    /// SHA-256 of a key, hex encoded
    pub fn digest(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Path where the value for `key` is stored
    pub fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Self::digest(key);
        self.values_dir()
            .join(&digest[..2])
            .join(format!("{}.json", digest))
    }

    fn read_entry(path: &Path) -> Result<Option<FileEntry>> {
        match std::fs::read(path) {
            Ok(content) => Ok(Some(serde_json::from_slice(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl CacheStore for FileCacheStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let entry = Self::read_entry(&self.entry_path(key))?;
        Ok(entry.filter(|entry| entry.key == key).map(|entry| entry.value))
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        let path = self.entry_path(key);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let entry = FileEntry {
            key: key.to_string(),
            value: value.clone(),
        };

        // Unique temp name: two workers may write the same key at once.
        let tmp_path = self
            .root
            .join("tmp")
            .join(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        std::fs::write(&tmp_path, serde_json::to_vec_pretty(&entry)?)?;
        std::fs::rename(&tmp_path, &path)?;

        debug!("Stored cache entry {}", key);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        match std::fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&self) -> Result<usize> {
        let removed = self.keys()?.len();
        let values_dir = self.values_dir();
        if values_dir.exists() {
            std::fs::remove_dir_all(&values_dir)?;
        }
        std::fs::create_dir_all(&values_dir)?;

        info!("Cleared {} cache entries from {:?}", removed, self.root);
        Ok(removed)
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();

        for entry in walkdir::WalkDir::new(self.values_dir())
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            match Self::read_entry(entry.path()) {
                Ok(Some(stored)) => keys.push(stored.key),
                Ok(None) => {}
                Err(e) => warn!("Skipping cache file {:?}: {}", entry.path(), e),
            }
        }

        keys.sort();
        Ok(keys)
    }
}

/// SQLite-backed store, for runs where many workers hit the cache at once
#[derive(Clone)]
pub struct SqliteCacheStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCacheStore {
    /// Open or create the database at path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;

        info!("Opened fixture cache database at {:?}", path.as_ref());
        Ok(store)
    }

    /// Open in-memory database (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

impl CacheStore for SqliteCacheStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let conn = self.conn.lock();
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM cache_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO cache_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, raw, Utc::now().timestamp()],
        )?;

        debug!("Stored cache entry {}", key);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    fn clear(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM cache_entries", [])?;
        info!("Cleared {} cache entries", removed);
        Ok(removed)
    }

    fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT key FROM cache_entries ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

/// In-process store that also counts reads and writes
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<BTreeMap<String, Value>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get` calls served so far
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `set` calls served so far
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.entries.lock().remove(key).is_some())
    }

    fn clear(&self) -> Result<usize> {
        let mut entries = self.entries.lock();
        let removed = entries.len();
        entries.clear();
        Ok(removed)
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.lock().keys().cloned().collect())
    }
}
