use replaylens_core::{BoundaryEvent, Entity};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UnresolvedReason {
    MissingTimestamp,
    UnknownRequestId,
    BoundaryTimestampUnknown { boundary: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowAssignment {
    Window(usize),
    Unresolved(UnresolvedReason),
}

impl WindowAssignment {
    pub fn window(self) -> Option<usize> {
        match self {
            WindowAssignment::Window(number) => Some(number),
            WindowAssignment::Unresolved(_) => None,
        }
    }
}

/// Places operations that only carry a timestamp (or an originating
/// request id) into the window numbering produced by `build_windows`.
#[derive(Debug, Clone)]
pub struct WindowClassifier {
    boundary_ts: Vec<Option<i64>>,
    request_ts: HashMap<String, Option<i64>>,
}

impl WindowClassifier {
    pub fn new(entities: &[Entity], boundaries: &[BoundaryEvent]) -> Self {
        let mut request_ts = HashMap::new();
        for entity in entities {
            if let Some(request_id) = entity.request_id() {
                request_ts
                    .entry(request_id.to_string())
                    .or_insert_with(|| entity.timestamp_ms());
            }
        }
        Self {
            boundary_ts: boundaries.iter().map(|boundary| boundary.timestamp).collect(),
            request_ts,
        }
    }

    /// Window k covers `[boundary[k-1].ts, boundary[k].ts)`; anything before
    /// the first boundary is window 0.
    pub fn classify_timestamp(&self, ts: Option<i64>) -> WindowAssignment {
        let Some(ts) = ts else {
            return WindowAssignment::Unresolved(UnresolvedReason::MissingTimestamp);
        };

        let mut window = 0usize;
        for (position, boundary_ts) in self.boundary_ts.iter().enumerate() {
            match boundary_ts {
                Some(start) if ts >= *start => window = position + 1,
                Some(_) => break,
                None => {
                    return WindowAssignment::Unresolved(
                        UnresolvedReason::BoundaryTimestampUnknown { boundary: position },
                    )
                }
            }
        }
        WindowAssignment::Window(window)
    }

    pub fn classify_request(&self, request_id: &str) -> WindowAssignment {
        match self.request_ts.get(request_id) {
            Some(ts) => self.classify_timestamp(*ts),
            None => WindowAssignment::Unresolved(UnresolvedReason::UnknownRequestId),
        }
    }

    pub fn request_timestamp(&self, request_id: &str) -> Option<i64> {
        self.request_ts.get(request_id).copied().flatten()
    }

    pub fn knows_request(&self, request_id: &str) -> bool {
        self.request_ts.contains_key(request_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replaylens_core::SummaryHash;
    use serde_json::json;

    fn boundary(entity_index: usize, timestamp: Option<i64>) -> BoundaryEvent {
        BoundaryEvent {
            entity_index,
            content_hash: SummaryHash::NoSummary,
            timestamp,
            marker: "Compacted conversation".to_string(),
            summary_len: None,
        }
    }

    #[test]
    fn timestamps_fall_into_half_open_intervals() {
        let classifier =
            WindowClassifier::new(&[], &[boundary(1, Some(1_000)), boundary(3, Some(2_000))]);
        assert_eq!(classifier.classify_timestamp(Some(999)), WindowAssignment::Window(0));
        assert_eq!(classifier.classify_timestamp(Some(1_000)), WindowAssignment::Window(1));
        assert_eq!(classifier.classify_timestamp(Some(1_999)), WindowAssignment::Window(1));
        assert_eq!(classifier.classify_timestamp(Some(2_000)), WindowAssignment::Window(2));
        assert_eq!(classifier.classify_timestamp(Some(9_999)), WindowAssignment::Window(2));
    }

    #[test]
    fn no_boundaries_means_window_zero() {
        let classifier = WindowClassifier::new(&[], &[]);
        assert_eq!(classifier.classify_timestamp(Some(5)), WindowAssignment::Window(0));
    }

    #[test]
    fn null_timestamp_is_unresolved() {
        let classifier = WindowClassifier::new(&[], &[boundary(0, Some(10))]);
        assert_eq!(
            classifier.classify_timestamp(None),
            WindowAssignment::Unresolved(UnresolvedReason::MissingTimestamp)
        );
    }

    #[test]
    fn unknown_boundary_timestamp_blocks_later_positions_only() {
        let classifier =
            WindowClassifier::new(&[], &[boundary(1, Some(1_000)), boundary(2, None)]);
        assert_eq!(classifier.classify_timestamp(Some(500)), WindowAssignment::Window(0));
        assert_eq!(
            classifier.classify_timestamp(Some(1_500)),
            WindowAssignment::Unresolved(UnresolvedReason::BoundaryTimestampUnknown {
                boundary: 1
            })
        );
    }

    #[test]
    fn request_ids_resolve_through_entity_timestamps() {
        let entities = vec![
            Entity::from_value(0, json!({"requestId": "a", "timestamp": 500})).0,
            Entity::from_value(1, json!({"requestId": "b", "timestamp": 1_500})).0,
            Entity::from_value(2, json!({"requestId": "c"})).0,
        ];
        let classifier = WindowClassifier::new(&entities, &[boundary(0, Some(1_000))]);
        assert_eq!(classifier.classify_request("a"), WindowAssignment::Window(0));
        assert_eq!(classifier.classify_request("b"), WindowAssignment::Window(1));
        assert_eq!(
            classifier.classify_request("c"),
            WindowAssignment::Unresolved(UnresolvedReason::MissingTimestamp)
        );
        assert_eq!(
            classifier.classify_request("zzz"),
            WindowAssignment::Unresolved(UnresolvedReason::UnknownRequestId)
        );
        assert!(classifier.knows_request("c"));
        assert_eq!(classifier.request_timestamp("b"), Some(1_500));
    }
}
