use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub const DEFAULT_ENTITIES_FIELD: &str = "requests";
pub const RESPONSE_FIELD: &str = "response";
pub const TOOL_INVOCATION_KIND: &str = "toolInvocationSerialized";
pub const PROGRESS_KIND_FRAGMENT: &str = "progressTask";
pub const NO_SUMMARY_SENTINEL: &str = "no-summary";

const REQUEST_ID_KEYS: [&str; 2] = ["requestId", "id"];
const TIMESTAMP_KEYS: [&str; 2] = ["timestamp", "requestStartTime"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PatchKind {
    Snapshot,
    Set,
    Append,
}

impl PatchKind {
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(PatchKind::Snapshot),
            1 => Some(PatchKind::Set),
            2 => Some(PatchKind::Append),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            PatchKind::Snapshot => 0,
            PatchKind::Set => 1,
            PatchKind::Append => 2,
        }
    }
}

/// One step of a record path: a mapping key or an array position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Field(String),
}

impl PathSegment {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(field) => Some(PathSegment::Field(field.clone())),
            Value::Number(number) => number
                .as_u64()
                .and_then(|index| usize::try_from(index).ok())
                .map(PathSegment::Index),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&str> {
        match self {
            PathSegment::Field(field) => Some(field.as_str()),
            PathSegment::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathSegment::Index(index) => Some(*index),
            PathSegment::Field(_) => None,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(index) => write!(f, "{index}"),
            PathSegment::Field(field) => f.write_str(field),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(field: &str) -> Self {
        PathSegment::Field(field.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PatchRecord {
    pub kind: PatchKind,
    pub path: Vec<PathSegment>,
    pub value: Value,
    /// 1-based line number of the record in the log.
    pub sequence_no: u64,
}

/// One conversational exchange reconstructed from the log.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Entity {
    pub index: usize,
    pub fields: Map<String, Value>,
    pub response: Vec<Value>,
}

impl Entity {
    pub fn empty(index: usize) -> Self {
        Self {
            index,
            fields: Map::new(),
            response: Vec::new(),
        }
    }

    /// Builds an entity from a raw object. Non-object values yield an empty
    /// entity and `false`.
    pub fn from_value(index: usize, value: Value) -> (Self, bool) {
        let Value::Object(mut fields) = value else {
            return (Self::empty(index), false);
        };
        let response = match fields.remove(RESPONSE_FIELD) {
            Some(Value::Array(parts)) => parts,
            Some(other) => {
                fields.insert(RESPONSE_FIELD.to_string(), other);
                Vec::new()
            }
            None => Vec::new(),
        };
        (
            Self {
                index,
                fields,
                response,
            },
            true,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.response.is_empty()
    }

    pub fn request_id(&self) -> Option<&str> {
        REQUEST_ID_KEYS.iter().find_map(|key| {
            self.fields
                .get(*key)
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
        })
    }

    pub fn timestamp_ms(&self) -> Option<i64> {
        TIMESTAMP_KEYS
            .iter()
            .find_map(|key| self.fields.get(*key).and_then(millis_from_value))
    }

    pub fn model_id(&self) -> Option<&str> {
        self.fields
            .get("modelId")
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn message_text(&self) -> Option<&str> {
        match self.fields.get("message")? {
            Value::String(text) => Some(text.as_str()),
            Value::Object(message) => message.get("text").and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn content_references(&self) -> Vec<&str> {
        self.fields
            .get("contentReferences")
            .and_then(Value::as_array)
            .map(|references| {
                references
                    .iter()
                    .filter_map(|reference| {
                        reference
                            .get("reference")
                            .and_then(|inner| inner.get("fsPath"))
                            .and_then(Value::as_str)
                            .filter(|path| !path.is_empty())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Walks a chain of mapping keys starting at the entity's fields.
    pub fn field_at<S: AsRef<str>>(&self, path: &[S]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.fields.get(first.as_ref())?;
        for key in rest {
            current = current.as_object()?.get(key.as_ref())?;
        }
        Some(current)
    }

    pub fn response_parts(&self) -> impl Iterator<Item = ResponsePart> + '_ {
        self.response.iter().map(ResponsePart::from_value)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "part", rename_all = "snake_case")]
pub enum ResponsePart {
    ToolInvocation(ToolInvocation),
    ProgressMarker { text: Option<String> },
    Other { kind: Option<String> },
}

impl ResponsePart {
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return ResponsePart::Other { kind: None };
        };
        let kind = object.get("kind").and_then(Value::as_str);
        match kind {
            Some(TOOL_INVOCATION_KIND) => {
                ResponsePart::ToolInvocation(ToolInvocation::from_object(object))
            }
            Some(kind) if kind.contains(PROGRESS_KIND_FRAGMENT) => ResponsePart::ProgressMarker {
                text: object.get("content").and_then(text_or_value),
            },
            other => ResponsePart::Other {
                kind: other.map(ToString::to_string),
            },
        }
    }
}

/// A serialized tool call as it appears in an entity's response.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolInvocation {
    pub tool_id: Option<String>,
    pub call_id: Option<String>,
    pub is_complete: bool,
    pub invocation_message: Option<String>,
    pub past_tense_message: Option<String>,
    pub result_details: Option<Value>,
}

impl ToolInvocation {
    fn from_object(object: &Map<String, Value>) -> Self {
        let non_empty = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
                .map(ToString::to_string)
        };
        Self {
            tool_id: non_empty("toolId"),
            call_id: non_empty("toolCallId"),
            is_complete: object
                .get("isComplete")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            invocation_message: object.get("invocationMessage").and_then(text_or_value),
            past_tense_message: object.get("pastTenseMessage").and_then(text_or_value),
            result_details: object
                .get("resultDetails")
                .filter(|details| !details.is_null())
                .cloned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum SummaryHash {
    Content(String),
    NoSummary,
}

impl SummaryHash {
    pub fn is_no_summary(&self) -> bool {
        matches!(self, SummaryHash::NoSummary)
    }
}

impl fmt::Display for SummaryHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryHash::Content(digest) => f.write_str(digest),
            SummaryHash::NoSummary => f.write_str(NO_SUMMARY_SENTINEL),
        }
    }
}

impl From<SummaryHash> for String {
    fn from(hash: SummaryHash) -> Self {
        hash.to_string()
    }
}

impl From<String> for SummaryHash {
    fn from(value: String) -> Self {
        if value == NO_SUMMARY_SENTINEL {
            SummaryHash::NoSummary
        } else {
            SummaryHash::Content(value)
        }
    }
}

/// One logically distinct compaction, after duplicate collapsing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoundaryEvent {
    pub entity_index: usize,
    pub content_hash: SummaryHash,
    pub timestamp: Option<i64>,
    pub marker: String,
    pub summary_len: Option<usize>,
}

pub fn timestamp_utc(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// `copilot/claude-sonnet-4.6` -> `claude-sonnet-4.6`
pub fn model_short_name(model_id: &str) -> &str {
    model_id.rsplit('/').next().unwrap_or(model_id)
}

fn millis_from_value(value: &Value) -> Option<i64> {
    if let Some(millis) = value.as_i64() {
        return Some(millis);
    }
    value
        .as_f64()
        .filter(|millis| millis.is_finite())
        .map(|millis| millis.trunc() as i64)
}

fn text_or_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Object(object) => object
            .get("value")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        _ => None,
    }
}
