//! Durable key-value backends the pen store persists into.
//!
//! # Responsibility
//! - Define the minimal `get`/`set` contract the pen store depends on.
//! - Provide a SQLite-backed implementation for real hosts and an
//!   in-memory implementation for tests and embedding.
//!
//! # Invariants
//! - Keys and values are UTF-8 strings; values are stored verbatim.
//! - A single `set` is atomic; `set_many` is atomic where the backend
//!   supports it (SQLite runs it in one transaction).

use std::error::Error;
use std::fmt::{Display, Formatter};

mod memory;
mod sqlite;

pub use memory::MemoryBackend;
pub use sqlite::{SqliteBackend, SCHEMA_VERSION};

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug)]
pub enum BackendError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for BackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "backend schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for BackendError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for BackendError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Synchronous string-keyed store scoped to one client.
pub trait KvBackend {
    /// Returns the stored value, or `None` when the key was never written.
    fn get(&self, key: &str) -> BackendResult<Option<String>>;

    /// Writes one entry, replacing any previous value.
    fn set(&mut self, key: &str, value: &str) -> BackendResult<()>;

    /// Writes several entries in order.
    ///
    /// The default applies `set` one entry at a time; backends with
    /// transactions override this to make the batch atomic.
    fn set_many(&mut self, entries: &[(&str, &str)]) -> BackendResult<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }
}

impl<B: KvBackend + ?Sized> KvBackend for &mut B {
    fn get(&self, key: &str) -> BackendResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> BackendResult<()> {
        (**self).set(key, value)
    }

    fn set_many(&mut self, entries: &[(&str, &str)]) -> BackendResult<()> {
        (**self).set_many(entries)
    }
}
