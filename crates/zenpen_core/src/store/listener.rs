//! Active-pen change listeners.

use crate::model::pen::Pen;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Listener registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerRegistryError {
    InvalidListenerId(String),
    DuplicateListenerId(String),
}

impl Display for ListenerRegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidListenerId(value) => write!(f, "listener id is invalid: {value}"),
            Self::DuplicateListenerId(value) => {
                write!(f, "listener id already registered: {value}")
            }
        }
    }
}

impl Error for ListenerRegistryError {}

/// Component that reloads its view when the active pen changes.
///
/// Editor and UI views implement this; the store calls `load_state` after
/// the new active index has been written to the backend.
pub trait ActivePenListener {
    /// Stable id, unique within one store.
    fn listener_id(&self) -> &str;

    /// Refreshes from the newly active pen.
    fn load_state(&self, index: usize, pen: &Pen);
}

/// Ordered listener list; notification follows registration order.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Vec<(String, Arc<dyn ActivePenListener>)>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one listener.
    pub fn register(
        &mut self,
        listener: Arc<dyn ActivePenListener>,
    ) -> Result<(), ListenerRegistryError> {
        let listener_id = listener.listener_id().trim().to_string();
        if !is_valid_listener_id(&listener_id) {
            return Err(ListenerRegistryError::InvalidListenerId(listener_id));
        }
        if self.listeners.iter().any(|(id, _)| *id == listener_id) {
            return Err(ListenerRegistryError::DuplicateListenerId(listener_id));
        }

        self.listeners.push((listener_id, listener));
        Ok(())
    }

    /// Removes a listener by id. Returns whether one was removed.
    pub fn unregister(&mut self, listener_id: &str) -> bool {
        let normalized = listener_id.trim();
        let before = self.listeners.len();
        self.listeners.retain(|(id, _)| id != normalized);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Returns ids in registration order.
    pub fn listener_ids(&self) -> Vec<String> {
        self.listeners.iter().map(|(id, _)| id.clone()).collect()
    }

    pub(crate) fn notify(&self, index: usize, pen: &Pen) {
        for (_, listener) in &self.listeners {
            listener.load_state(index, pen);
        }
    }
}

fn is_valid_listener_id(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '.' | '_' | '-'))
}

#[cfg(test)]
mod tests {
    use super::{ActivePenListener, ListenerRegistry, ListenerRegistryError};
    use crate::model::pen::Pen;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        id: &'static str,
        seen: Mutex<Vec<usize>>,
    }

    impl Recorder {
        fn new(id: &'static str) -> Arc<Self> {
            Arc::new(Self {
                id,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl ActivePenListener for Recorder {
        fn listener_id(&self) -> &str {
            self.id
        }

        fn load_state(&self, index: usize, _pen: &Pen) {
            self.seen.lock().unwrap().push(index);
        }
    }

    #[test]
    fn register_rejects_invalid_and_duplicate_ids() {
        let mut registry = ListenerRegistry::new();
        registry.register(Recorder::new("editor")).unwrap();

        assert_eq!(
            registry.register(Recorder::new(" editor ")),
            Err(ListenerRegistryError::DuplicateListenerId("editor".to_string()))
        );
        assert_eq!(
            registry.register(Recorder::new("Bad Id")),
            Err(ListenerRegistryError::InvalidListenerId("Bad Id".to_string()))
        );
        assert_eq!(
            registry.register(Recorder::new("  ")),
            Err(ListenerRegistryError::InvalidListenerId(String::new()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn notify_reaches_every_listener_in_order() {
        let mut registry = ListenerRegistry::new();
        let editor = Recorder::new("editor");
        let ui = Recorder::new("ui");
        registry.register(editor.clone()).unwrap();
        registry.register(ui.clone()).unwrap();

        registry.notify(3, &Pen::default());

        assert_eq!(*editor.seen.lock().unwrap(), vec![3]);
        assert_eq!(*ui.seen.lock().unwrap(), vec![3]);
        assert_eq!(registry.listener_ids(), vec!["editor", "ui"]);
    }

    #[test]
    fn unregister_removes_by_id() {
        let mut registry = ListenerRegistry::new();
        registry.register(Recorder::new("ui")).unwrap();
        assert!(registry.unregister("ui"));
        assert!(!registry.unregister("ui"));
        assert!(registry.is_empty());
    }
}
