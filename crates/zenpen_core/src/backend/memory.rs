//! In-process key-value backend.

use super::{BackendResult, KvBackend};
use std::collections::BTreeMap;

/// Non-durable backend holding entries in a sorted map.
///
/// Useful for tests and for hosts that persist the entries themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryBackend {
    entries: BTreeMap<String, String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a backend pre-seeded with the given entries.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    /// Returns stored keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, key: &str) -> BackendResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> BackendResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryBackend;
    use crate::backend::KvBackend;

    #[test]
    fn seeded_entries_are_readable() {
        let backend = MemoryBackend::with_entries([("header", "Old Doc")]);
        assert_eq!(backend.get("header").unwrap().as_deref(), Some("Old Doc"));
        assert_eq!(backend.get("content").unwrap(), None);
    }

    #[test]
    fn set_many_defaults_to_sequential_sets() {
        let mut backend = MemoryBackend::new();
        backend.set_many(&[("b", "2"), ("a", "1")]).unwrap();
        assert_eq!(backend.keys(), vec!["a".to_string(), "b".to_string()]);
    }
}
