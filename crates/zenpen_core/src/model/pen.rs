//! Pen domain model.
//!
//! # Responsibility
//! - Define the stored document record and the persisted root state.
//! - Route dynamic property reads/writes onto typed fields where known.
//!
//! # Invariants
//! - `header` is stored verbatim; trimming happens only in `title()`.
//! - `date_created` is never changed through the property API.
//! - Unknown property names live in `extra` and round-trip unchanged.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const PROP_HEADER: &str = "header";
pub const PROP_CONTENT: &str = "content";
pub const PROP_TARGET_WORD_COUNT: &str = "targetWordCount";
pub const PROP_DATE_CREATED: &str = "date_created";
pub const PROP_DATE_MODIFIED: &str = "date_modified";

/// Header given to pens created through the store.
pub const NEW_PEN_HEADER: &str = "New Pen";

/// Rejected property write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PenPropertyError {
    /// The property may only be set when the pen is created.
    Immutable(String),
    /// The value does not fit the typed field.
    InvalidValue { name: String, reason: String },
}

impl Display for PenPropertyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immutable(name) => write!(f, "property `{name}` is immutable"),
            Self::InvalidValue { name, reason } => {
                write!(f, "invalid value for property `{name}`: {reason}")
            }
        }
    }
}

impl Error for PenPropertyError {}

/// One stored document.
///
/// Every typed field is optional: a first-run pen is stored as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pen {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Word goal. Older clients stored this as text, so loads accept both.
    #[serde(
        rename = "targetWordCount",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_word_count"
    )]
    pub target_word_count: Option<u64>,
    /// Unix epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<i64>,
    /// Unix epoch milliseconds of the last property write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<i64>,
    /// Caller-defined properties outside the typed schema.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Pen {
    /// Creates the pen appended by "new pen" actions.
    ///
    /// # Invariants
    /// - `date_modified` stays unset until the first property write.
    pub fn new_blank(now_ms: i64) -> Self {
        Self {
            header: Some(NEW_PEN_HEADER.to_string()),
            content: Some(String::new()),
            target_word_count: Some(0),
            date_created: Some(now_ms),
            ..Self::default()
        }
    }

    /// Builds the single pen carried over from the pre-collection layout.
    pub fn from_legacy(header: impl Into<String>, content: Option<String>) -> Self {
        Self {
            header: Some(header.into()),
            content,
            ..Self::default()
        }
    }

    /// Display title: `header` without surrounding whitespace, or empty.
    pub fn title(&self) -> String {
        self.header.as_deref().map(str::trim).unwrap_or_default().to_string()
    }

    /// Reads one property by its stored name.
    pub fn get(&self, name: &str) -> Option<Value> {
        match name {
            PROP_HEADER => self.header.clone().map(Value::String),
            PROP_CONTENT => self.content.clone().map(Value::String),
            PROP_TARGET_WORD_COUNT => self.target_word_count.map(Value::from),
            PROP_DATE_CREATED => self.date_created.map(Value::from),
            PROP_DATE_MODIFIED => self.date_modified.map(Value::from),
            other => self.extra.get(other).cloned(),
        }
    }

    /// Writes one property by its stored name.
    ///
    /// `null` clears a typed field. Unknown names are stored as-is.
    ///
    /// # Errors
    /// - `Immutable` for `date_created`.
    /// - `InvalidValue` when a typed field receives the wrong JSON type.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), PenPropertyError> {
        match name {
            PROP_HEADER => self.header = expect_string(name, value)?,
            PROP_CONTENT => self.content = expect_string(name, value)?,
            PROP_TARGET_WORD_COUNT => {
                self.target_word_count = match value {
                    Value::Null => None,
                    other => Some(coerce_non_negative_int(&other).ok_or_else(|| {
                        invalid(name, format!("expected non-negative integer, got {other}"))
                    })?),
                }
            }
            PROP_DATE_CREATED => return Err(PenPropertyError::Immutable(name.to_string())),
            PROP_DATE_MODIFIED => {
                self.date_modified = match value {
                    Value::Null => None,
                    other => Some(other.as_i64().ok_or_else(|| {
                        invalid(name, format!("expected epoch milliseconds, got {other}"))
                    })?),
                }
            }
            other => {
                self.extra.insert(other.to_string(), value);
            }
        }
        Ok(())
    }
}

/// Lightweight projection of a pen for list views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PenSummary {
    pub index: usize,
    pub title: String,
}

/// Persisted root object.
///
/// # Invariants
/// - `pens` is never empty once loaded.
/// - `active_pen < pens.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(rename = "activePen")]
    pub active_pen: usize,
    pub pens: Vec<Pen>,
}

impl StoreState {
    /// Wraps a single pen and activates it.
    pub fn single(pen: Pen) -> Self {
        Self {
            active_pen: 0,
            pens: vec![pen],
        }
    }
}

/// Reads a non-negative integer from a JSON number or a decimal string.
pub(crate) fn coerce_non_negative_int(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn deserialize_word_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => coerce_non_negative_int(&value).map(Some).ok_or_else(|| {
            D::Error::custom(format!(
                "targetWordCount must be a non-negative integer, got {value}"
            ))
        }),
    }
}

fn expect_string(name: &str, value: Value) -> Result<Option<String>, PenPropertyError> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text)),
        other => Err(invalid(name, format!("expected string, got {other}"))),
    }
}

fn invalid(name: &str, reason: String) -> PenPropertyError {
    PenPropertyError::InvalidValue {
        name: name.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::{coerce_non_negative_int, Pen, PenPropertyError, StoreState};
    use serde_json::json;

    #[test]
    fn empty_pen_serializes_as_empty_object() {
        let encoded = serde_json::to_string(&Pen::default()).unwrap();
        assert_eq!(encoded, "{}");
    }

    #[test]
    fn title_trims_header_and_defaults_to_empty() {
        let mut pen = Pen::default();
        assert_eq!(pen.title(), "");
        pen.header = Some("  My Doc  ".to_string());
        assert_eq!(pen.title(), "My Doc");
        assert_eq!(pen.header.as_deref(), Some("  My Doc  "));
    }

    #[test]
    fn unknown_properties_land_in_extra_and_round_trip() {
        let raw = json!({
            "header": "h",
            "theme": "dark",
            "fontSize": 14
        });
        let pen: Pen = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(pen.extra.len(), 2);
        assert_eq!(pen.get("theme"), Some(json!("dark")));
        assert_eq!(serde_json::to_value(&pen).unwrap(), raw);
    }

    #[test]
    fn word_count_accepts_text_from_older_clients() {
        let pen: Pen = serde_json::from_value(json!({ "targetWordCount": "500" })).unwrap();
        assert_eq!(pen.target_word_count, Some(500));

        let err = serde_json::from_value::<Pen>(json!({ "targetWordCount": "lots" }));
        assert!(err.is_err());
    }

    #[test]
    fn set_rejects_date_created_and_type_mismatches() {
        let mut pen = Pen::new_blank(1_000);
        assert_eq!(
            pen.set("date_created", json!(5)),
            Err(PenPropertyError::Immutable("date_created".to_string()))
        );
        assert!(matches!(
            pen.set("header", json!(42)),
            Err(PenPropertyError::InvalidValue { .. })
        ));
        assert!(matches!(
            pen.set("targetWordCount", json!(-3)),
            Err(PenPropertyError::InvalidValue { .. })
        ));
        assert_eq!(pen.date_created, Some(1_000));
        assert_eq!(pen.header.as_deref(), Some("New Pen"));
    }

    #[test]
    fn set_null_clears_typed_field() {
        let mut pen = Pen::new_blank(1);
        pen.set("content", serde_json::Value::Null).unwrap();
        assert_eq!(pen.get("content"), None);
    }

    #[test]
    fn coerce_rejects_negative_and_fractional_values() {
        assert_eq!(coerce_non_negative_int(&json!(3)), Some(3));
        assert_eq!(coerce_non_negative_int(&json!(" 7 ")), Some(7));
        assert_eq!(coerce_non_negative_int(&json!(-1)), None);
        assert_eq!(coerce_non_negative_int(&json!(1.5)), None);
        assert_eq!(coerce_non_negative_int(&json!("1abc")), None);
    }

    #[test]
    fn store_state_uses_persisted_field_names() {
        let state = StoreState::single(Pen::default());
        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            json!({ "activePen": 0, "pens": [{}] })
        );
    }
}
