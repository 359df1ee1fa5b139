use replaylens_windows::{UnresolvedReason, WindowAssignment, WindowClassifier};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

use crate::oplog::{EditOperation, EditOperationLog};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrelatedOperation {
    pub operation: EditOperation,
    pub request_ts: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedOperation {
    pub operation: EditOperation,
    pub reason: UnresolvedReason,
}

/// Operation-log entries placed on the window timeline. Entries that could
/// not be placed are kept, never dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OperationCorrelation {
    pub by_window: BTreeMap<usize, Vec<CorrelatedOperation>>,
    pub unresolved: Vec<UnresolvedOperation>,
}

impl OperationCorrelation {
    pub fn resolved_count(&self) -> usize {
        self.by_window.values().map(Vec::len).sum()
    }
}

pub fn correlate_operations(
    log: &EditOperationLog,
    classifier: &WindowClassifier,
) -> OperationCorrelation {
    let mut correlation = OperationCorrelation::default();

    for operation in &log.operations {
        let assignment = match operation.request_id.as_deref() {
            Some(request_id) => classifier.classify_request(request_id),
            None => WindowAssignment::Unresolved(UnresolvedReason::UnknownRequestId),
        };
        match assignment {
            WindowAssignment::Window(window) => {
                let request_ts = operation
                    .request_id
                    .as_deref()
                    .and_then(|request_id| classifier.request_timestamp(request_id));
                correlation
                    .by_window
                    .entry(window)
                    .or_default()
                    .push(CorrelatedOperation {
                        operation: operation.clone(),
                        request_ts,
                    });
            }
            WindowAssignment::Unresolved(reason) => {
                correlation.unresolved.push(UnresolvedOperation {
                    operation: operation.clone(),
                    reason,
                });
            }
        }
    }

    if !correlation.unresolved.is_empty() {
        warn!(
            unresolved = correlation.unresolved.len(),
            total = log.operations.len(),
            "operation log entries could not be placed in a window"
        );
    }
    correlation
}
