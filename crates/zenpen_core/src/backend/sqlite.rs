//! SQLite-backed key-value store.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections for the pen store.
//! - Create the `kv_entries` table before the first read or write.
//! - Map `get`/`set` onto that table.
//!
//! # Invariants
//! - Returned backends report `PRAGMA user_version == SCHEMA_VERSION`.
//! - Files stamped by a newer build are refused, never downgraded.
//! - `set_many` commits all entries or none.
//! - The table layout is independent of the `persistenceVersion` tag
//!   stored inside it.

use super::{BackendError, BackendResult, KvBackend};
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::{Duration, Instant};

/// `PRAGMA user_version` stamped on files this build creates.
pub const SCHEMA_VERSION: u32 = 1;

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS kv_entries (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);";

const UPSERT_SQL: &str = "INSERT INTO kv_entries (key, value)
     VALUES (?1, ?2)
     ON CONFLICT(key) DO UPDATE SET value = excluded.value;";

/// Durable backend over one SQLite connection.
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    /// Opens a SQLite database file and prepares the entry table.
    ///
    /// # Side effects
    /// - Creates the file when missing.
    /// - Emits `backend_open` logging events with duration and status.
    pub fn open(path: impl AsRef<Path>) -> BackendResult<Self> {
        let started_at = Instant::now();
        info!("event=backend_open module=backend status=start mode=file");

        let conn = match Connection::open(path) {
            Ok(conn) => conn,
            Err(err) => {
                error!(
                    "event=backend_open module=backend status=error mode=file duration_ms={} error_code=db_open_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err.into());
            }
        };

        Self::bootstrap(conn, "file", started_at)
    }

    /// Opens an in-memory SQLite database and prepares the entry table.
    pub fn open_in_memory() -> BackendResult<Self> {
        let started_at = Instant::now();
        info!("event=backend_open module=backend status=start mode=memory");

        let conn = match Connection::open_in_memory() {
            Ok(conn) => conn,
            Err(err) => {
                error!(
                    "event=backend_open module=backend status=error mode=memory duration_ms={} error_code=db_open_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err.into());
            }
        };

        Self::bootstrap(conn, "memory", started_at)
    }

    /// Borrows the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn bootstrap(mut conn: Connection, mode: &str, started_at: Instant) -> BackendResult<Self> {
        match configure_connection(&mut conn) {
            Ok(()) => {
                info!(
                    "event=backend_open module=backend status=ok mode={} duration_ms={}",
                    mode,
                    started_at.elapsed().as_millis()
                );
                Ok(Self { conn })
            }
            Err(err) => {
                error!(
                    "event=backend_open module=backend status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                    mode,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }
}

fn configure_connection(conn: &mut Connection) -> BackendResult<()> {
    conn.busy_timeout(Duration::from_secs(5))?;

    let db_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if db_version > SCHEMA_VERSION {
        return Err(BackendError::UnsupportedSchemaVersion {
            db_version,
            latest_supported: SCHEMA_VERSION,
        });
    }
    if db_version == SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    tx.execute_batch(CREATE_TABLE_SQL)?;
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;
    Ok(())
}

impl KvBackend for SqliteBackend {
    fn get(&self, key: &str) -> BackendResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> BackendResult<()> {
        self.conn.execute(UPSERT_SQL, params![key, value])?;
        Ok(())
    }

    fn set_many(&mut self, entries: &[(&str, &str)]) -> BackendResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(UPSERT_SQL)?;
            for (key, value) in entries {
                stmt.execute(params![key, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
