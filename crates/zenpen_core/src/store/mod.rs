//! Pen store: in-memory pen collection with write-through persistence.
//!
//! # Responsibility
//! - Load (and migrate) stored pens once per `init`.
//! - Serve reads from memory; flush the whole state after every mutation.
//! - Notify registered listeners when the active pen changes.
//!
//! # Invariants
//! - `pens` is never empty and `active_pen < pens.len()`.
//! - A failed flush leaves the in-memory state as it was before the call.
//! - Listeners run only after the backend write succeeded.

use crate::backend::{BackendError, KvBackend};
use crate::model::pen::{Pen, PenPropertyError, PenSummary, StoreState};
use log::{debug, error, info, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

pub mod listener;
pub mod load;

use listener::{ActivePenListener, ListenerRegistry, ListenerRegistryError};
use load::{
    encode_state, load_state, LoadPath, CURRENT_PERSISTENCE_VERSION, PENS_DB_KEY,
    PERSISTENCE_VERSION_KEY,
};

pub type StoreResult<T> = Result<T, StoreError>;

/// Pen store error.
#[derive(Debug)]
pub enum StoreError {
    /// Requested pen index is outside the collection.
    InvalidIndex { index: usize, len: usize },
    /// Current-format data could not be parsed or validated.
    DataCorruption(String),
    /// Property write rejected by the pen schema.
    Property(PenPropertyError),
    Backend(BackendError),
    Serialize(serde_json::Error),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIndex { index, len } => {
                write!(f, "pen index {index} is out of range for {len} pen(s)")
            }
            Self::DataCorruption(message) => write!(f, "stored pen data is corrupt: {message}"),
            Self::Property(err) => write!(f, "{err}"),
            Self::Backend(err) => write!(f, "{err}"),
            Self::Serialize(err) => write!(f, "failed to serialize pen state: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidIndex { .. } | Self::DataCorruption(_) => None,
            Self::Property(err) => Some(err),
            Self::Backend(err) => Some(err),
            Self::Serialize(err) => Some(err),
        }
    }
}

impl From<BackendError> for StoreError {
    fn from(value: BackendError) -> Self {
        Self::Backend(value)
    }
}

impl From<PenPropertyError> for StoreError {
    fn from(value: PenPropertyError) -> Self {
        Self::Property(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialize(value)
    }
}

/// Stateful pen manager over one key-value backend.
pub struct PenStore<B: KvBackend> {
    backend: B,
    state: StoreState,
    load_path: LoadPath,
    listeners: ListenerRegistry,
}

impl<B: KvBackend> PenStore<B> {
    /// Opens a store and runs the initial load.
    ///
    /// # Errors
    /// - `DataCorruption` when current-format data is unreadable.
    /// - `Backend` when reading or flushing fails.
    pub fn open(mut backend: B) -> StoreResult<Self> {
        let (state, load_path) = load_and_flush(&mut backend)?;
        Ok(Self {
            backend,
            state,
            load_path,
            listeners: ListenerRegistry::new(),
        })
    }

    /// Re-derives state from the backend and writes it back in current format.
    ///
    /// On error the previously loaded state is kept.
    pub fn init(&mut self) -> StoreResult<LoadPath> {
        let (state, path) = load_and_flush(&mut self.backend)?;
        self.state = state;
        self.load_path = path;
        Ok(path)
    }

    /// Registers a listener notified on every active-pen change.
    pub fn register_listener(
        &mut self,
        listener: Arc<dyn ActivePenListener>,
    ) -> Result<(), ListenerRegistryError> {
        self.listeners.register(listener)
    }

    /// Removes a listener by id.
    pub fn unregister_listener(&mut self, listener_id: &str) -> bool {
        self.listeners.unregister(listener_id)
    }

    pub fn listener_ids(&self) -> Vec<String> {
        self.listeners.listener_ids()
    }

    /// Lists pens as `(index, trimmed title)` summaries.
    pub fn pen_list(&self) -> Vec<PenSummary> {
        self.state
            .pens
            .iter()
            .enumerate()
            .map(|(index, pen)| PenSummary {
                index,
                title: pen.title(),
            })
            .collect()
    }

    pub fn pen_count(&self) -> usize {
        self.state.pens.len()
    }

    pub fn active_pen_index(&self) -> usize {
        self.state.active_pen
    }

    pub fn active_pen(&self) -> &Pen {
        &self.state.pens[self.state.active_pen]
    }

    pub fn state(&self) -> &StoreState {
        &self.state
    }

    /// Branch taken by the most recent successful `init`.
    pub fn load_path(&self) -> LoadPath {
        self.load_path
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Makes `pen_index` the active pen, flushes, then notifies listeners.
    ///
    /// # Errors
    /// - `InvalidIndex` when `pen_index >= pen_count()`; nothing changes.
    /// - Flush errors; the previous active index is restored.
    pub fn set_active_pen(&mut self, pen_index: usize) -> StoreResult<()> {
        let len = self.state.pens.len();
        if pen_index >= len {
            warn!(
                "event=active_pen_changed module=store status=error error_code=invalid_index index={} len={}",
                pen_index, len
            );
            return Err(StoreError::InvalidIndex {
                index: pen_index,
                len,
            });
        }

        let previous = self.state.active_pen;
        self.state.active_pen = pen_index;
        if let Err(err) = self.flush() {
            self.state.active_pen = previous;
            return Err(err);
        }

        info!(
            "event=active_pen_changed module=store status=ok from={} to={} listeners={}",
            previous,
            pen_index,
            self.listeners.len()
        );
        self.listeners.notify(pen_index, &self.state.pens[pen_index]);
        Ok(())
    }

    /// Reads a property of the active pen; `None` when it is not set.
    pub fn load_prop(&self, prop_name: &str) -> Option<Value> {
        self.active_pen().get(prop_name)
    }

    /// Writes a property on the active pen, stamps `date_modified`, flushes.
    ///
    /// # Errors
    /// - `Property` when the pen schema rejects the write; nothing changes.
    /// - Flush errors; the pen is restored to its previous contents.
    pub fn save_prop(&mut self, prop_name: &str, prop_value: Value) -> StoreResult<()> {
        let active = self.state.active_pen;
        let previous = self.state.pens[active].clone();

        let pen = &mut self.state.pens[active];
        if let Err(err) = pen.set(prop_name, prop_value) {
            warn!(
                "event=prop_saved module=store status=error error_code=invalid_property prop={}",
                prop_name
            );
            return Err(err.into());
        }
        pen.date_modified = Some(now_epoch_ms());

        if let Err(err) = self.flush() {
            self.state.pens[active] = previous;
            return Err(err);
        }

        debug!(
            "event=prop_saved module=store status=ok pen={} prop={}",
            active, prop_name
        );
        Ok(())
    }

    /// Appends a "New Pen" and makes it active. Returns its index.
    pub fn create_new_pen(&mut self) -> StoreResult<usize> {
        self.state.pens.push(Pen::new_blank(now_epoch_ms()));
        let new_pen_index = self.state.pens.len() - 1;

        if let Err(err) = self.set_active_pen(new_pen_index) {
            self.state.pens.pop();
            return Err(err);
        }

        info!(
            "event=pen_created module=store status=ok pen={} pens={}",
            new_pen_index,
            self.state.pens.len()
        );
        Ok(new_pen_index)
    }

    fn flush(&mut self) -> StoreResult<()> {
        flush_state(&mut self.backend, &self.state)
    }
}

fn load_and_flush<B: KvBackend>(backend: &mut B) -> StoreResult<(StoreState, LoadPath)> {
    let started_at = Instant::now();
    let (state, path) = match load_state(&*backend) {
        Ok(loaded) => loaded,
        Err(err) => {
            error!(
                "event=store_init module=store status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err);
        }
    };

    flush_state(backend, &state)?;
    info!(
        "event=store_init module=store status=ok path={} pens={} active={} duration_ms={}",
        path.as_str(),
        state.pens.len(),
        state.active_pen,
        started_at.elapsed().as_millis()
    );
    Ok((state, path))
}

fn flush_state<B: KvBackend>(backend: &mut B, state: &StoreState) -> StoreResult<()> {
    let encoded = encode_state(state)?;
    // pensDB first: a tag pointing at a missing blob reads as corruption.
    let result = backend.set_many(&[
        (PENS_DB_KEY, encoded.as_str()),
        (PERSISTENCE_VERSION_KEY, CURRENT_PERSISTENCE_VERSION),
    ]);

    match result {
        Ok(()) => {
            debug!(
                "event=store_flush module=store status=ok bytes={}",
                encoded.len()
            );
            Ok(())
        }
        Err(err) => {
            error!(
                "event=store_flush module=store status=error error_code=backend_write_failed error={}",
                err
            );
            Err(err.into())
        }
    }
}

/// Current wall-clock time as Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}
