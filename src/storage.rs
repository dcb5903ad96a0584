use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::{Connection, OptionalExtension, params};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::models::Conversation;
use crate::error::StorageError;

const SCHEMA_VERSION: i64 = 1;

pub fn default_db_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("com", "example", "WaConsole")?;
    Some(proj.data_dir().join("cache.sqlite"))
}

/// Cache partition for one server and login. `base_url` should already be
/// normalized (see `ApiClient::base`).
pub fn account_key(base_url: &str, email: Option<&str>) -> String {
    let email = email.unwrap_or("").trim().to_lowercase();
    format!("{}#{}", base_url.trim_end_matches('/'), email)
}

// Keeps the last successful conversation list per account so the sidebar has
// something to show before the first poll comes back.
pub struct Cache {
    conn: Connection,
}

impl Cache {
    pub fn open_default() -> Result<Self, StorageError> {
        let path = default_db_path().ok_or(StorageError::NoDataDir)?;
        Self::open(&path)
    }

    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version < SCHEMA_VERSION {
            // Pre-account caches cannot be attributed to a server; start over.
            conn.execute_batch(
                "DROP TABLE IF EXISTS conversations;
                 DROP TABLE IF EXISTS sync;",
            )?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                account TEXT NOT NULL,
                position INTEGER NOT NULL,
                id TEXT NOT NULL,
                raw_json TEXT NOT NULL,
                PRIMARY KEY (account, position)
            );
            CREATE TABLE IF NOT EXISTS sync (
                account TEXT PRIMARY KEY,
                synced_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    /// Replaces the account's cached list wholesale, preserving server order.
    pub fn replace_conversations(
        &mut self,
        account: &str,
        list: &[Conversation],
    ) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM conversations WHERE account = ?1", params![account])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO conversations (account, position, id, raw_json) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (idx, conv) in list.iter().enumerate() {
                insert.execute(params![account, idx as i64, conv.id, serde_json::to_string(conv)?])?;
            }
        }
        tx.execute(
            "INSERT INTO sync (account, synced_at) VALUES (?1, ?2)
             ON CONFLICT(account) DO UPDATE SET synced_at = excluded.synced_at",
            params![account, Utc::now()],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn conversations(&self, account: &str) -> Result<Vec<Conversation>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT raw_json FROM conversations WHERE account = ?1 ORDER BY position ASC",
        )?;
        let rows = stmt.query_map(params![account], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for raw in rows {
            out.push(serde_json::from_str(&raw?)?);
        }
        Ok(out)
    }

    pub fn last_synced_at(&self, account: &str) -> Result<Option<DateTime<Utc>>, StorageError> {
        let ts = self
            .conn
            .query_row("SELECT synced_at FROM sync WHERE account = ?1", params![account], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(ts)
    }

    /// Drops everything cached for `account`.
    pub fn forget(&mut self, account: &str) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM conversations WHERE account = ?1", params![account])?;
        tx.execute("DELETE FROM sync WHERE account = ?1", params![account])?;
        tx.commit()?;
        Ok(())
    }
}
