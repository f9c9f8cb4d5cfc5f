use std::path::Path;

use chrono::Utc;
use misfortune_core::{SettingKey, SettingsBackend, StoreError};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<PersistenceError> for StoreError {
    fn from(value: PersistenceError) -> Self {
        StoreError::Backend(value.to_string())
    }
}

/// World-scoped settings in a single SQLite table, one JSON value per key.
#[derive(Debug)]
pub struct SqliteSettings {
    conn: Connection,
}

impl SqliteSettings {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        let mut store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn load(&self, key: &str) -> Result<Option<Value>, PersistenceError> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT value_json FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match payload {
            Some(raw) => Ok(Some(serde_json::from_str::<Value>(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn save(&mut self, key: &str, value: &Value) -> Result<(), PersistenceError> {
        let value_json = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO settings (key, value_json, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value_json = excluded.value_json,
                updated_at = excluded.updated_at",
            params![key, value_json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Every stored key in name order.
    pub fn entries(&self) -> Result<Vec<(String, Value)>, PersistenceError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value_json FROM settings ORDER BY key ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (key, raw) = row?;
            entries.push((key, serde_json::from_str::<Value>(&raw)?));
        }

        Ok(entries)
    }

    fn configure(&mut self) -> Result<(), PersistenceError> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(())
    }

    fn migrate(&mut self) -> Result<(), PersistenceError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )?;

        self.conn.execute(
            "INSERT OR IGNORE INTO schema_migrations(version, name, applied_at)
             VALUES(1, 'initial_v1', ?1)",
            params![Utc::now().to_rfc3339()],
        )?;

        Ok(())
    }
}

impl SettingsBackend for SqliteSettings {
    fn get(&self, key: SettingKey) -> Result<Option<Value>, StoreError> {
        Ok(self.load(key.name())?)
    }

    fn set(&mut self, key: SettingKey, value: Value) -> Result<(), StoreError> {
        Ok(self.save(key.name(), &value)?)
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.conn
            .execute_batch("PRAGMA wal_checkpoint(PASSIVE);")
            .map_err(|err| StoreError::from(PersistenceError::from(err)))
    }
}
