//! SQLite persistence for nodes and reboot flags.

mod flags;

pub use flags::FlagTable;

use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;

use rebootd_shared::errors::{RebootError, RebootResult};

/// Map a `rusqlite` result into a store error.
///
/// Any failure talking to SQLite is reported as the store being unavailable
/// so callers can tell it apart from permission or lookup errors.
macro_rules! db_err {
    ($expr:expr) => {
        $expr.map_err(|e| {
            rebootd_shared::errors::RebootError::StoreUnavailable(format!("database error: {}", e))
        })
    };
}
pub(crate) use db_err;

const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS node (
    id TEXT PRIMARY KEY NOT NULL,
    life TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS reboot_flag (
    id TEXT PRIMARY KEY NOT NULL REFERENCES node(id) ON DELETE CASCADE,
    flag INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;

/// Shared handle to the SQLite database.
///
/// Cloning is cheap; all clones serialize access through one connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> RebootResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RebootError::Storage(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = db_err!(Connection::open(path))?;
        Self::init(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> RebootResult<Self> {
        let conn = db_err!(Connection::open_in_memory())?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> RebootResult<Self> {
        db_err!(conn.pragma_update(None, "foreign_keys", "ON"))?;
        db_err!(conn.busy_timeout(std::time::Duration::from_secs(5)))?;
        db_err!(conn.execute_batch(SCHEMA))?;

        let version: Option<i64> = db_err!(conn.query_row(
            "SELECT MAX(version) FROM schema_version",
            [],
            |row| row.get(0)
        ))?;

        match version {
            None => {
                db_err!(conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?1)",
                    [SCHEMA_VERSION],
                ))?;
            }
            Some(v) if v > SCHEMA_VERSION => {
                return Err(RebootError::Storage(format!(
                    "database schema version {} is newer than supported version {}",
                    v, SCHEMA_VERSION
                )));
            }
            Some(_) => {}
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Lock the connection for the duration of the returned guard.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("db").join("rebootd.db");
        Database::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_reopen_keeps_schema_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rebootd.db");
        drop(Database::open(&path).unwrap());

        let db = Database::open(&path).unwrap();
        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_rejects_newer_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rebootd.db");
        {
            let db = Database::open(&path).unwrap();
            db.conn()
                .execute("UPDATE schema_version SET version = 99", [])
                .unwrap();
        }

        let result = Database::open(&path);
        assert!(matches!(result, Err(RebootError::Storage(_))));
    }
}
