//! # Key/Value Session Store
//!
//! The persistence port the pipeline reads at start and writes at consent
//! transitions and on completion. Values are JSON documents keyed by name.

use super::db::StudioDb;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Well-known keys
pub mod keys {
    /// Upstream project/feature data
    pub const PROJECT_DATA: &str = "project_data";
    /// Founder-cofounder agreement
    pub const AGREEMENT: &str = "agreement";
    /// Summary of the last final artifact
    pub const ARTIFACT_SUMMARY: &str = "artifact_summary";
    /// Full record of the last completed run
    pub const LAST_RUN: &str = "last_run";
}

/// Simple string key/value persistence
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Read and decode a JSON value
pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(raw) => {
            let value = serde_json::from_str(&raw)
                .with_context(|| format!("Stored value for '{}' is not valid", key))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Encode and write a JSON value
pub fn save_json<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

/// SQLite-backed store
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Create from shared StudioDb connection
    pub fn new(db: &StudioDb) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    /// List stored keys, alphabetically
    pub fn keys(&self) -> Result<Vec<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut stmt = conn.prepare("SELECT key FROM kv_store ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()
            .context("Failed to list keys")?;
        Ok(keys)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.query_row(
            "SELECT value FROM kv_store WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("Failed to read '{}'", key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.execute(
            r#"
            INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value],
        )
        .with_context(|| format!("Failed to write '{}'", key))?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// In-memory store
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tokio_test::{assert_err, assert_ok};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn test_sqlite_set_get_overwrite() {
        let db = StudioDb::open_in_memory().unwrap();
        let store = SqliteStore::new(&db);

        assert_eq!(store.get("missing").unwrap(), None);

        assert_ok!(store.set("k", "one"));
        assert_ok!(store.set("k", "two"));
        assert_eq!(store.get("k").unwrap().as_deref(), Some("two"));
        assert_eq!(store.keys().unwrap(), vec!["k".to_string()]);

        assert_ok!(store.remove("k"));
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_json_helpers() {
        let store = MemoryStore::new();
        let sample = Sample {
            name: "studio".to_string(),
            count: 3,
        };

        save_json(&store, "sample", &sample).unwrap();
        let loaded: Option<Sample> = load_json(&store, "sample").unwrap();
        assert_eq!(loaded, Some(sample));

        let missing: Option<Sample> = load_json(&store, "other").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_load_json_rejects_garbage() {
        let store = MemoryStore::new();
        store.set("sample", "{not json").unwrap();
        assert_err!(load_json::<Sample>(&store, "sample"));
    }
}
