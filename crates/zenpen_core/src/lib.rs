//! Core persistence for ZenPen.
//! Owns the pen collection, its on-disk layout and layout migration.

pub mod backend;
pub mod config;
pub mod logging;
pub mod model;
pub mod store;

pub use backend::{BackendError, BackendResult, KvBackend, MemoryBackend, SqliteBackend};
pub use config::StoreConfig;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::pen::{Pen, PenPropertyError, PenSummary, StoreState};
pub use store::listener::{ActivePenListener, ListenerRegistry, ListenerRegistryError};
pub use store::load::{decode_state, encode_state, LoadPath};
pub use store::{now_epoch_ms, PenStore, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
