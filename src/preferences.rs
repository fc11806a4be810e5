use crate::errors::{AppError, AppResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const SCHEMA_SQL: &str = "CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value_json TEXT NOT NULL,
    updated_at TEXT NOT NULL
);";

const NOTIFICATIONS_ENABLED_KEY: &str = "notifications-enabled";

/// Key-value storage that survives restarts. Holds the notification preference only.
pub trait PreferenceStore: Send + Sync {
    /// `None` when the user never toggled notifications.
    fn notifications_enabled(&self) -> AppResult<Option<bool>>;

    fn set_notifications_enabled(&self, enabled: bool) -> AppResult<()>;
}

#[derive(Debug)]
pub struct SqlitePreferenceStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqlitePreferenceStore {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn read_json(&self, key: &str) -> AppResult<Option<serde_json::Value>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Internal("preferences mutex poisoned".to_string()))?;
        let raw = conn
            .query_row("SELECT value_json FROM settings WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn write_json(&self, key: &str, value: &serde_json::Value) -> AppResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Internal("preferences mutex poisoned".to_string()))?;
        conn.execute(
            "INSERT INTO settings (key, value_json, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
            params![key, serde_json::to_string(value)?, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

impl PreferenceStore for SqlitePreferenceStore {
    fn notifications_enabled(&self) -> AppResult<Option<bool>> {
        match self.read_json(NOTIFICATIONS_ENABLED_KEY)? {
            Some(value) => match value.as_bool() {
                Some(enabled) => Ok(Some(enabled)),
                None => {
                    tracing::warn!(value = %value, "ignoring malformed notification preference");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    fn set_notifications_enabled(&self, enabled: bool) -> AppResult<()> {
        self.write_json(NOTIFICATIONS_ENABLED_KEY, &serde_json::Value::Bool(enabled))
    }
}

#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    notifications_enabled: Mutex<Option<bool>>,
}

impl MemoryPreferenceStore {
    pub fn new(initial: Option<bool>) -> Self {
        Self {
            notifications_enabled: Mutex::new(initial),
        }
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn notifications_enabled(&self) -> AppResult<Option<bool>> {
        self.notifications_enabled
            .lock()
            .map(|value| *value)
            .map_err(|_| AppError::Internal("preferences mutex poisoned".to_string()))
    }

    fn set_notifications_enabled(&self, enabled: bool) -> AppResult<()> {
        let mut value = self
            .notifications_enabled
            .lock()
            .map_err(|_| AppError::Internal("preferences mutex poisoned".to_string()))?;
        *value = Some(enabled);
        Ok(())
    }
}
