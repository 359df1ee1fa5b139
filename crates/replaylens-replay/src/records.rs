use replaylens_core::{PatchKind, PatchRecord, PathSegment};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::fmt;
use std::iter::Enumerate;
use std::str::Lines;

use crate::ReplayError;

const PATH_KEYS: [&str; 2] = ["k", "keys"];
const VALUE_KEYS: [&str; 2] = ["v", "value"];

/// The whole log, decoded permissively: invalid UTF-8 becomes U+FFFD.
#[derive(Debug, Clone)]
pub struct PatchLog {
    text: String,
}

impl PatchLog {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let text = match String::from_utf8_lossy(bytes) {
            Cow::Borrowed(text) => text.to_string(),
            Cow::Owned(text) => text,
        };
        Self { text }
    }

    pub fn read(path: impl AsRef<std::path::Path>) -> Result<Self, ReplayError> {
        let bytes = std::fs::read(path)?;
        Ok(Self::from_bytes(&bytes))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn records(&self) -> Result<RecordStream<'_>, ReplayError> {
        RecordStream::open(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    InvalidJson(String),
    NotAnObject,
    MissingKind,
    /// `kind` is present but not a non-negative integer; holds the raw value.
    InvalidKind(String),
    UnknownKind(u64),
    LateSnapshot,
    MissingPath,
    PathNotAnArray,
    InvalidPathSegment(usize),
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::InvalidJson(err) => write!(f, "invalid json: {err}"),
            MalformedReason::NotAnObject => f.write_str("record is not an object"),
            MalformedReason::MissingKind => f.write_str("missing record kind"),
            MalformedReason::InvalidKind(raw) => write!(f, "record kind {raw} is not an integer"),
            MalformedReason::UnknownKind(kind) => write!(f, "unknown record kind {kind}"),
            MalformedReason::LateSnapshot => f.write_str("snapshot after the first record"),
            MalformedReason::MissingPath => f.write_str("mutation without a path"),
            MalformedReason::PathNotAnArray => f.write_str("record path is not an array"),
            MalformedReason::InvalidPathSegment(position) => {
                write!(f, "path segment {position} is neither a key nor an index")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecord {
    pub line_no: u64,
    pub reason: MalformedReason,
}

/// Lazy record sequence. Opening it validates the leading snapshot; the
/// remaining lines are decoded one at a time as the stream is pulled.
pub struct RecordStream<'a> {
    lines: Enumerate<Lines<'a>>,
    snapshot: PatchRecord,
    total_lines: usize,
}

impl<'a> RecordStream<'a> {
    pub fn open(text: &'a str) -> Result<Self, ReplayError> {
        let mut lines = text.lines().enumerate();
        let mut total_lines = 0usize;

        let (position, first) = loop {
            let Some((position, line)) = lines.next() else {
                return Err(ReplayError::EmptyLog);
            };
            total_lines += 1;
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                break (position, trimmed);
            }
        };

        let line_no = position as u64 + 1;
        let snapshot = match decode_line(first, line_no) {
            Ok(record) if record.kind == PatchKind::Snapshot => record,
            Ok(record) => {
                return Err(ReplayError::MissingSnapshot {
                    line_no,
                    reason: format!("first record has kind {}", record.kind.code()),
                })
            }
            Err(reason) => {
                return Err(ReplayError::MissingSnapshot {
                    line_no,
                    reason: reason.to_string(),
                })
            }
        };

        Ok(Self {
            lines,
            snapshot,
            total_lines,
        })
    }

    pub fn snapshot(&self) -> &PatchRecord {
        &self.snapshot
    }

    /// Lines consumed so far, blank ones included.
    pub fn total_lines(&self) -> usize {
        self.total_lines
    }
}

impl Iterator for RecordStream<'_> {
    type Item = Result<PatchRecord, MalformedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (position, line) = self.lines.next()?;
            self.total_lines += 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let line_no = position as u64 + 1;
            let decoded = decode_line(line, line_no).and_then(|record| {
                if record.kind == PatchKind::Snapshot {
                    Err(MalformedReason::LateSnapshot)
                } else {
                    Ok(record)
                }
            });
            return Some(decoded.map_err(|reason| MalformedRecord { line_no, reason }));
        }
    }
}

fn decode_line(line: &str, line_no: u64) -> Result<PatchRecord, MalformedReason> {
    let parsed: Value = serde_json::from_str(line)
        .map_err(|err| MalformedReason::InvalidJson(err.to_string()))?;
    let Value::Object(object) = parsed else {
        return Err(MalformedReason::NotAnObject);
    };

    let raw_kind = object.get("kind").ok_or(MalformedReason::MissingKind)?;
    let code = raw_kind
        .as_u64()
        .ok_or_else(|| MalformedReason::InvalidKind(raw_kind.to_string()))?;
    let kind = PatchKind::from_code(code).ok_or(MalformedReason::UnknownKind(code))?;

    let value = first_present(&object, &VALUE_KEYS)
        .cloned()
        .unwrap_or(Value::Null);

    let path = match first_present(&object, &PATH_KEYS) {
        Some(Value::Array(segments)) => decode_path(segments)?,
        Some(_) => return Err(MalformedReason::PathNotAnArray),
        None if kind == PatchKind::Snapshot => Vec::new(),
        None => return Err(MalformedReason::MissingPath),
    };

    Ok(PatchRecord {
        kind,
        path,
        value,
        sequence_no: line_no,
    })
}

fn decode_path(segments: &[Value]) -> Result<Vec<PathSegment>, MalformedReason> {
    segments
        .iter()
        .enumerate()
        .map(|(position, segment)| {
            PathSegment::from_value(segment).ok_or(MalformedReason::InvalidPathSegment(position))
        })
        .collect()
}

fn first_present<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| object.get(*key))
}
