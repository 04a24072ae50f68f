//! Persisted layout and the load/migrate state machine.
//!
//! # Responsibility
//! - Decide which on-disk layout the backend holds.
//! - Build the in-memory state from current, legacy or empty storage.
//! - Encode/decode the `pensDB` blob.
//!
//! # Invariants
//! - Current-format data that fails to parse or validate is reported as
//!   corruption; it is never replaced by a fresh state.
//! - Legacy entries are only read, never removed.

use super::{StoreError, StoreResult};
use crate::backend::KvBackend;
use crate::model::pen::{coerce_non_negative_int, Pen, StoreState};
use serde::Deserialize;
use serde_json::Value;

/// Backend key holding the layout tag.
pub const PERSISTENCE_VERSION_KEY: &str = "persistenceVersion";
/// Backend key holding the serialized `{activePen, pens}` blob.
pub const PENS_DB_KEY: &str = "pensDB";
/// Layout tag written by this version.
pub const CURRENT_PERSISTENCE_VERSION: &str = "v2:pv+pens";
/// Single-document layout: title entry, presence triggers migration.
pub const LEGACY_HEADER_KEY: &str = "header";
/// Single-document layout: body entry.
pub const LEGACY_CONTENT_KEY: &str = "content";

/// Which branch `init` took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPath {
    /// Backend already held the current layout.
    Current,
    /// One pen was migrated from the single-document layout.
    Legacy,
    /// Nothing stored yet; one empty pen was created.
    Fresh,
}

impl LoadPath {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Legacy => "legacy",
            Self::Fresh => "fresh",
        }
    }
}

#[derive(Deserialize)]
struct StoredState {
    #[serde(rename = "activePen", default)]
    active_pen: Option<Value>,
    #[serde(default)]
    pens: Option<Vec<Pen>>,
}

/// Reads the backend and returns the state it describes.
///
/// Does not write; the caller flushes the result.
pub(crate) fn load_state<B: KvBackend>(backend: &B) -> StoreResult<(StoreState, LoadPath)> {
    let version = backend.get(PERSISTENCE_VERSION_KEY)?;
    if version.as_deref() == Some(CURRENT_PERSISTENCE_VERSION) {
        let raw = backend.get(PENS_DB_KEY)?.ok_or_else(|| {
            StoreError::DataCorruption(format!(
                "`{PERSISTENCE_VERSION_KEY}` is current but `{PENS_DB_KEY}` is missing"
            ))
        })?;
        return Ok((decode_state(&raw)?, LoadPath::Current));
    }

    match backend.get(LEGACY_HEADER_KEY)? {
        Some(header) if !header.is_empty() => {
            let content = backend.get(LEGACY_CONTENT_KEY)?;
            Ok((
                StoreState::single(Pen::from_legacy(header, content)),
                LoadPath::Legacy,
            ))
        }
        _ => Ok((StoreState::single(Pen::default()), LoadPath::Fresh)),
    }
}

/// Parses and validates a `pensDB` blob.
///
/// # Errors
/// - `DataCorruption` when the JSON is malformed, `pens` is missing or
///   empty, or `activePen` is not an in-range integer (numeric strings are
///   accepted).
/// - `DataCorruption` when any typed field of any pen has the wrong type;
///   fields are not dropped individually.
pub fn decode_state(raw: &str) -> StoreResult<StoreState> {
    let stored: StoredState = serde_json::from_str(raw)
        .map_err(|err| StoreError::DataCorruption(format!("`{PENS_DB_KEY}` is not valid: {err}")))?;

    let pens = match stored.pens {
        Some(pens) if !pens.is_empty() => pens,
        Some(_) => {
            return Err(StoreError::DataCorruption(
                "stored pen collection is empty".to_string(),
            ))
        }
        None => {
            return Err(StoreError::DataCorruption(
                "stored state has no `pens` field".to_string(),
            ))
        }
    };

    let active_raw = stored.active_pen.unwrap_or(Value::Null);
    let active_pen = coerce_non_negative_int(&active_raw)
        .and_then(|value| usize::try_from(value).ok())
        .ok_or_else(|| {
            StoreError::DataCorruption(format!("`activePen` is not an index: {active_raw}"))
        })?;

    if active_pen >= pens.len() {
        return Err(StoreError::DataCorruption(format!(
            "`activePen` {active_pen} is out of range for {} pen(s)",
            pens.len()
        )));
    }

    Ok(StoreState { active_pen, pens })
}

/// Serializes state into the `pensDB` blob.
pub fn encode_state(state: &StoreState) -> StoreResult<String> {
    Ok(serde_json::to_string(state)?)
}

#[cfg(test)]
mod tests {
    use super::{decode_state, encode_state, load_state, LoadPath};
    use crate::backend::MemoryBackend;
    use crate::model::pen::{Pen, StoreState};
    use crate::StoreError;
    use serde_json::json;

    #[test]
    fn empty_backend_takes_fresh_path() {
        let (state, path) = load_state(&MemoryBackend::new()).unwrap();
        assert_eq!(path, LoadPath::Fresh);
        assert_eq!(state, StoreState::single(Pen::default()));
    }

    #[test]
    fn empty_legacy_header_is_treated_as_absent() {
        let backend = MemoryBackend::with_entries([("header", ""), ("content", "orphan")]);
        let (_, path) = load_state(&backend).unwrap();
        assert_eq!(path, LoadPath::Fresh);
    }

    #[test]
    fn legacy_without_content_omits_content() {
        let backend = MemoryBackend::with_entries([("header", "Only title")]);
        let (state, path) = load_state(&backend).unwrap();
        assert_eq!(path, LoadPath::Legacy);
        assert_eq!(state.pens[0].content, None);
        assert_eq!(state.pens[0].header.as_deref(), Some("Only title"));
    }

    #[test]
    fn unknown_version_tag_falls_through_to_legacy_check() {
        let backend = MemoryBackend::with_entries([
            ("persistenceVersion", "v3:future"),
            ("header", "Old"),
        ]);
        let (_, path) = load_state(&backend).unwrap();
        assert_eq!(path, LoadPath::Legacy);
    }

    #[test]
    fn current_tag_without_blob_is_corruption() {
        let backend = MemoryBackend::with_entries([("persistenceVersion", "v2:pv+pens")]);
        let err = load_state(&backend).unwrap_err();
        assert!(matches!(err, StoreError::DataCorruption(_)));
    }

    #[test]
    fn decode_accepts_numeric_string_active_pen() {
        let raw = json!({ "activePen": "1", "pens": [{}, {}] }).to_string();
        assert_eq!(decode_state(&raw).unwrap().active_pen, 1);
    }

    #[test]
    fn decode_rejects_invalid_active_pen_values() {
        for active in [json!(2), json!(-1), json!("one"), json!(null), json!(0.5)] {
            let raw = json!({ "activePen": active.clone(), "pens": [{}, {}] }).to_string();
            let err = decode_state(&raw).unwrap_err();
            assert!(
                matches!(err, StoreError::DataCorruption(_)),
                "activePen {active} should be rejected"
            );
        }
    }

    #[test]
    fn one_mistyped_pen_field_rejects_the_whole_blob() {
        for bad_pen in [
            json!({ "header": "Ok", "date_created": 1.0e12 }),
            json!({ "header": "Ok", "targetWordCount": "" }),
        ] {
            let raw = json!({ "activePen": 0, "pens": [{}, bad_pen.clone()] }).to_string();
            let err = decode_state(&raw).unwrap_err();
            assert!(
                matches!(err, StoreError::DataCorruption(_)),
                "pen {bad_pen} should be rejected"
            );
        }
    }

    #[test]
    fn decode_rejects_empty_or_missing_pens() {
        assert!(decode_state(r#"{"activePen":0,"pens":[]}"#).is_err());
        assert!(decode_state(r#"{"activePen":0}"#).is_err());
        assert!(decode_state("not json").is_err());
    }

    #[test]
    fn encode_then_decode_preserves_structure() {
        let mut second = Pen::new_blank(1_700_000_000_000);
        second.extra.insert("theme".to_string(), json!("dark"));
        let state = StoreState {
            active_pen: 1,
            pens: vec![Pen::from_legacy("  First ", Some("body".to_string())), second],
        };

        let decoded = decode_state(&encode_state(&state).unwrap()).unwrap();
        assert_eq!(decoded, state);
    }
}
