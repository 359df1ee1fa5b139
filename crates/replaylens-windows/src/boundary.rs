use replaylens_core::{BoundaryEvent, Entity, ReplayProfile, ResponsePart, SummaryHash};
use serde::Serialize;
use serde_json::Value;
use std::hash::Hasher;
use tracing::{debug, info};
use twox_hash::XxHash64;

const SUMMARY_HASH_SEED: u64 = 0;

#[derive(Debug, Clone)]
pub struct BoundaryConfig {
    pub completion_markers: Vec<String>,
    pub summary_path: Vec<String>,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self::from(&ReplayProfile::default())
    }
}

impl BoundaryConfig {
    pub fn is_completion_marker(&self, text: &str) -> bool {
        self.completion_markers.iter().any(|marker| marker == text)
    }
}

impl From<&ReplayProfile> for BoundaryConfig {
    fn from(profile: &ReplayProfile) -> Self {
        Self {
            completion_markers: profile.completion_markers.clone(),
            summary_path: profile.summary_path.clone(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct BoundaryReport {
    pub completion_markers: usize,
    pub boundaries: usize,
    pub collapsed_duplicates: usize,
    pub markers_without_summary: usize,
    pub boundaries_missing_timestamp: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundaryScan {
    pub boundaries: Vec<BoundaryEvent>,
    pub report: BoundaryReport,
}

pub struct BoundaryDetector {
    config: BoundaryConfig,
}

impl BoundaryDetector {
    pub fn new(config: BoundaryConfig) -> Self {
        Self { config }
    }

    pub fn detect(&self, entities: &[Entity]) -> BoundaryScan {
        let mut report = BoundaryReport::default();
        let mut boundaries: Vec<BoundaryEvent> = Vec::new();
        let mut previous_hash: Option<SummaryHash> = None;

        for entity in entities {
            let Some(marker) = self.completion_marker(entity) else {
                continue;
            };
            report.completion_markers += 1;

            let summary = self.summary_text(entity);
            let content_hash = match summary {
                Some(text) => summary_hash(text),
                None => {
                    report.markers_without_summary += 1;
                    SummaryHash::NoSummary
                }
            };

            if previous_hash.as_ref() == Some(&content_hash) {
                debug!(
                    index = entity.index,
                    hash = %content_hash,
                    "collapsing repeated compaction summary"
                );
                report.collapsed_duplicates += 1;
                continue;
            }

            let timestamp = entity.timestamp_ms();
            if timestamp.is_none() {
                report.boundaries_missing_timestamp += 1;
            }
            previous_hash = Some(content_hash.clone());
            boundaries.push(BoundaryEvent {
                entity_index: entity.index,
                content_hash,
                timestamp,
                marker,
                summary_len: summary.map(str::len),
            });
        }

        report.boundaries = boundaries.len();
        info!(
            markers = report.completion_markers,
            boundaries = report.boundaries,
            collapsed = report.collapsed_duplicates,
            "boundary scan complete"
        );
        BoundaryScan { boundaries, report }
    }

    fn completion_marker(&self, entity: &Entity) -> Option<String> {
        entity.response_parts().find_map(|part| match part {
            ResponsePart::ProgressMarker { text: Some(text) }
                if self.config.is_completion_marker(&text) =>
            {
                Some(text)
            }
            _ => None,
        })
    }

    fn summary_text<'e>(&self, entity: &'e Entity) -> Option<&'e str> {
        entity
            .field_at(self.config.summary_path.as_slice())
            .and_then(Value::as_str)
    }
}

/// Stable 64-bit digest of a summary, rendered as 16 hex digits.
pub fn summary_hash(text: &str) -> SummaryHash {
    let mut hasher = XxHash64::with_seed(SUMMARY_HASH_SEED);
    hasher.write(text.as_bytes());
    SummaryHash::Content(format!("{:016x}", hasher.finish()))
}
