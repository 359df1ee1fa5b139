use serde::Serialize;
use serde_json::Value;
use std::path::Path;

use crate::AggregateError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditKind {
    Create,
    TextEdit,
    Other(String),
}

impl EditKind {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("create") => EditKind::Create,
            Some("textEdit") => EditKind::TextEdit,
            Some(other) => EditKind::Other(other.to_string()),
            None => EditKind::Other(String::new()),
        }
    }
}

/// One entry of an editing-session timeline, keyed by the originating
/// request rather than by entity index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditOperation {
    pub position: usize,
    pub request_id: Option<String>,
    pub path: Option<String>,
    pub kind: EditKind,
    pub epoch: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EditOperationLog {
    pub operations: Vec<EditOperation>,
}

impl EditOperationLog {
    pub fn read(path: impl AsRef<Path>) -> Result<Self, AggregateError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| AggregateError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&String::from_utf8_lossy(&bytes))
    }

    /// Parses a state file. Only `timeline.operations` is read; a file
    /// without it is an empty log.
    pub fn from_json(text: &str) -> Result<Self, AggregateError> {
        let root: Value = serde_json::from_str(text)?;
        let operations = root
            .get("timeline")
            .and_then(|timeline| timeline.get("operations"))
            .and_then(Value::as_array)
            .map(|operations| {
                operations
                    .iter()
                    .enumerate()
                    .map(|(position, raw)| parse_operation(position, raw))
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self { operations })
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn for_request<'a>(
        &'a self,
        request_id: &'a str,
    ) -> impl Iterator<Item = &'a EditOperation> {
        self.operations
            .iter()
            .filter(move |operation| operation.request_id.as_deref() == Some(request_id))
    }
}

fn parse_operation(position: usize, raw: &Value) -> EditOperation {
    let non_empty = |value: Option<&Value>| {
        value
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(ToString::to_string)
    };
    let path = match raw.get("uri") {
        Some(Value::Object(uri)) => {
            non_empty(uri.get("fsPath")).or_else(|| non_empty(uri.get("path")))
        }
        other => non_empty(other),
    };
    EditOperation {
        position,
        request_id: non_empty(raw.get("requestId")),
        path,
        kind: EditKind::parse(raw.get("type").and_then(Value::as_str)),
        epoch: raw.get("epoch").and_then(Value::as_i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const STATE: &str = r#"{
        "version": 2,
        "timeline": {
            "operations": [
                {"requestId": "r1", "uri": {"fsPath": "/repo/a.rs", "path": "/repo/a.rs"}, "type": "create", "epoch": 3},
                {"requestId": "r1", "uri": {"path": "/repo/b.rs"}, "type": "textEdit", "epoch": 4},
                {"requestId": "r2", "uri": "file:///repo/c.rs", "type": "rename"},
                {"uri": {}, "type": "textEdit"}
            ]
        }
    }"#;

    #[test]
    fn reads_operations_with_uri_variants() {
        let log = EditOperationLog::from_json(STATE).expect("parse");
        assert_eq!(log.operations.len(), 4);
        assert_eq!(log.operations[0].kind, EditKind::Create);
        assert_eq!(log.operations[0].path.as_deref(), Some("/repo/a.rs"));
        assert_eq!(log.operations[1].path.as_deref(), Some("/repo/b.rs"));
        assert_eq!(log.operations[2].path.as_deref(), Some("file:///repo/c.rs"));
        assert_eq!(log.operations[2].kind, EditKind::Other("rename".to_string()));
        assert_eq!(log.operations[2].epoch, None);
        assert_eq!(log.operations[3].request_id, None);
        assert_eq!(log.operations[3].path, None);
        assert_eq!(log.for_request("r1").count(), 2);
    }

    #[test]
    fn missing_timeline_is_empty_and_bad_json_errors() {
        assert!(EditOperationLog::from_json("{}").expect("parse").is_empty());
        assert!(matches!(
            EditOperationLog::from_json("{oops"),
            Err(AggregateError::OperationLog(_))
        ));
    }

    #[test]
    fn reads_from_disk() {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(STATE.as_bytes()).expect("write");
        let log = EditOperationLog::read(file.path()).expect("read");
        assert_eq!(log.operations.len(), 4);
    }
}
