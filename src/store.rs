use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

pub const PROFILE_KEY: &str = "profile";
pub const PROGRESS_KEY: &str = "progress";
pub const CUSTOM_WORKOUTS_KEY: &str = "custom_workouts";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable key-value storage of whole JSON documents
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

impl<S: KvStore + ?Sized> KvStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        (**self).delete(key)
    }
}

/// Load a document, falling back to `T::default()` when it is absent,
/// unreadable or malformed. Failures are logged, never returned.
pub fn load_or_default<T, S>(store: &S, key: &str) -> T
where
    T: DeserializeOwned + Default,
    S: KvStore + ?Sized,
{
    match store.get(key) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, "stored document is malformed, using defaults: {e}");
                T::default()
            }
        },
        Ok(None) => T::default(),
        Err(e) => {
            tracing::warn!(key, "could not read stored document, using defaults: {e}");
            T::default()
        }
    }
}

/// Serialize and write a whole document in one put.
pub fn save_document<T, S>(store: &S, key: &str, value: &T) -> Result<(), StorageError>
where
    T: Serialize,
    S: KvStore + ?Sized,
{
    let raw = serde_json::to_string(value)?;
    store.put(key, &raw)
}

/// SQLite-backed store: one `kv` table, one row per document
#[derive(Debug)]
pub struct SqliteKvStore {
    conn: Mutex<Connection>,
}

impl SqliteKvStore {
    /// Open (creating parent directories and the table if needed)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        // a panic mid-statement leaves nothing half-written in sqlite
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KvStore for SqliteKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn()
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn().execute(
            r#"
            INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.conn().execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(())
    }
}

/// In-memory store for tests and `--ephemeral` runs
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    docs: Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn docs(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.docs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.docs().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.docs().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.docs().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Doc {
        count: u32,
        name: String,
    }

    fn exercise_store(store: &dyn KvStore) {
        assert_eq!(store.get("a").unwrap(), None);
        store.put("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        store.put("a", "2").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("2"));
        store.delete("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        store.delete("a").unwrap();
    }

    #[test]
    fn sqlite_store_get_put_delete() {
        exercise_store(&SqliteKvStore::open_in_memory().unwrap());
    }

    #[test]
    fn memory_store_get_put_delete() {
        exercise_store(&MemoryKvStore::new());
    }

    #[test]
    fn sqlite_store_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("ringside.db");
        {
            let store = SqliteKvStore::open(&path).unwrap();
            store.put(PROFILE_KEY, "{\"x\":1}").unwrap();
        }
        let store = SqliteKvStore::open(&path).unwrap();
        assert_eq!(store.get(PROFILE_KEY).unwrap().as_deref(), Some("{\"x\":1}"));
    }

    #[test]
    fn documents_round_trip() {
        let store = MemoryKvStore::new();
        let doc = Doc {
            count: 3,
            name: "bag".into(),
        };
        save_document(&store, "doc", &doc).unwrap();
        let loaded: Doc = load_or_default(&store, "doc");
        assert_eq!(loaded, doc);
    }

    #[test]
    fn malformed_document_loads_as_default() {
        let store = MemoryKvStore::new();
        store.put("doc", "{not json").unwrap();
        let loaded: Doc = load_or_default(&store, "doc");
        assert_eq!(loaded, Doc::default());
    }

    #[test]
    fn missing_document_loads_as_default() {
        let store = MemoryKvStore::new();
        let loaded: Doc = load_or_default(&store, "nope");
        assert_eq!(loaded, Doc::default());
    }
}
