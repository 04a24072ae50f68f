#![allow(dead_code)]

use rusqlite::ffi;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use zenpen_core::{BackendError, BackendResult, KvBackend, MemoryBackend};

/// Backend handle that tests can keep reading (or tamper with) while a
/// store owns another handle to the same entries.
#[derive(Clone, Default)]
pub struct SharedBackend {
    inner: Rc<RefCell<MemoryBackend>>,
    writes: Rc<RefCell<usize>>,
    failing: Rc<Cell<bool>>,
}

impl SharedBackend {
    pub fn new(seed: MemoryBackend) -> Self {
        Self {
            inner: Rc::new(RefCell::new(seed)),
            writes: Rc::default(),
            failing: Rc::default(),
        }
    }

    pub fn snapshot(&self) -> MemoryBackend {
        self.inner.borrow().clone()
    }

    pub fn write_count(&self) -> usize {
        *self.writes.borrow()
    }

    pub fn overwrite(&self, key: &str, value: &str) {
        self.inner.borrow_mut().set(key, value).unwrap();
    }

    /// While enabled, every `set` fails with a disk I/O error and stores
    /// nothing.
    pub fn fail_writes(&self, enabled: bool) {
        self.failing.set(enabled);
    }
}

impl KvBackend for SharedBackend {
    fn get(&self, key: &str) -> BackendResult<Option<String>> {
        self.inner.borrow().get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> BackendResult<()> {
        if self.failing.get() {
            return Err(BackendError::Sqlite(rusqlite::Error::SqliteFailure(
                ffi::Error::new(ffi::SQLITE_IOERR),
                Some("disk I/O error".to_string()),
            )));
        }
        *self.writes.borrow_mut() += 1;
        self.inner.borrow_mut().set(key, value)
    }
}

pub fn current_backend(blob: &Value) -> MemoryBackend {
    MemoryBackend::with_entries([
        ("persistenceVersion".to_string(), "v2:pv+pens".to_string()),
        ("pensDB".to_string(), blob.to_string()),
    ])
}

pub fn stored_blob(backend: &impl KvBackend) -> Value {
    let raw = backend
        .get("pensDB")
        .unwrap()
        .expect("pensDB should be written");
    serde_json::from_str(&raw).unwrap()
}
