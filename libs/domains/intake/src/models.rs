use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

/// Field map of a stored document
pub type Fields = BTreeMap<String, FieldValue>;

/// Typed value of a document field
///
/// Mirrors the value kinds a Firestore document can hold. Conversion from
/// `serde_json::Value` is provided for fixtures and local tooling; JSON has no
/// timestamp type, so timestamps only come from the store or from a `DateTime<Utc>`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Array(Vec<FieldValue>),
    Map(Fields),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Fields> {
        match self {
            FieldValue::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl From<EmailStatus> for FieldValue {
    fn from(value: EmailStatus) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Double(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => FieldValue::String(s),
            Value::Array(items) => FieldValue::Array(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                FieldValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

/// A record read from a monitored collection
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Store-assigned id
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Build from a JSON object; anything other than an object yields no fields
    pub fn from_json(id: impl Into<String>, value: serde_json::Value) -> Self {
        let fields = match FieldValue::from(value) {
            FieldValue::Map(fields) => fields,
            _ => Fields::new(),
        };
        Self::new(id, fields)
    }

    /// Look up a dotted path such as `filiation.father.email`
    pub fn get(&self, path: &str) -> Option<&FieldValue> {
        let mut segments = path.split('.');
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            current = current.as_map()?.get(segment)?;
        }
        Some(current)
    }

    /// String value at `path`, if present and a string
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(FieldValue::as_str)
    }
}

/// Equality filter: `field_path == value`
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field_path: String,
    pub value: FieldValue,
}

impl FieldFilter {
    pub fn equal(field_path: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            field_path: field_path.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, document: &Document) -> bool {
        document.get(&self.field_path) == Some(&self.value)
    }
}

/// How a collection flags records that still need notifying
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessedMarker {
    /// Unprocessed while the field is an empty list; claimed by writing `[claimed_at]`
    EmptyList { field: String },
    /// Unprocessed while the field is `false`; claimed by writing `true`
    BooleanFlag { field: String },
}

impl ProcessedMarker {
    pub fn empty_list(field: impl Into<String>) -> Self {
        ProcessedMarker::EmptyList {
            field: field.into(),
        }
    }

    pub fn boolean_flag(field: impl Into<String>) -> Self {
        ProcessedMarker::BooleanFlag {
            field: field.into(),
        }
    }

    pub fn field(&self) -> &str {
        match self {
            ProcessedMarker::EmptyList { field } | ProcessedMarker::BooleanFlag { field } => field,
        }
    }

    /// Filter selecting records that have not been claimed yet
    pub fn unprocessed_filter(&self) -> FieldFilter {
        let sentinel = match self {
            ProcessedMarker::EmptyList { .. } => FieldValue::Array(Vec::new()),
            ProcessedMarker::BooleanFlag { .. } => FieldValue::Bool(false),
        };
        FieldFilter::equal(self.field(), sentinel)
    }

    /// Value written when a record is claimed
    pub fn claimed_value(&self, claimed_at: DateTime<Utc>) -> FieldValue {
        match self {
            ProcessedMarker::EmptyList { .. } => {
                FieldValue::Array(vec![FieldValue::Timestamp(claimed_at)])
            }
            ProcessedMarker::BooleanFlag { .. } => FieldValue::Bool(true),
        }
    }
}

/// Processing state written to a record's status field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EmailStatus {
    /// Claimed, sends in flight
    Processing,
    /// Every recipient accepted the message
    Completed,
    /// At least one recipient failed
    PartialFailure,
    /// Workflow aborted after the claim
    Failed,
}

/// Names of the status fields written back onto records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingFields {
    pub status: String,
    pub error_message: String,
    pub sent_at: String,
}

impl Default for TrackingFields {
    fn default() -> Self {
        Self {
            status: "email_status".to_string(),
            error_message: "error_message".to_string(),
            sent_at: "email_sent_at".to_string(),
        }
    }
}
