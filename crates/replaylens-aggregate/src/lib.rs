//! Window-level roll-ups of a replayed session, plus the cross-check
//! against an independently recorded edit timeline.

pub mod correlate;
pub mod oplog;
pub mod summary;

use chrono::{DateTime, Utc};
use replaylens_activity::{ActivityExtractor, ActivityReport, EntityActivity};
use replaylens_core::{
    model_short_name, timestamp_utc, BoundaryEvent, Diagnostics, ReplayProfile,
};
use replaylens_replay::{
    PatchLog, ReplayEngine, ReplayError, ReplayOptions, ReplayReport, ReplayedSession,
};
use replaylens_windows::{
    build_windows, BoundaryConfig, BoundaryDetector, BoundaryReport, BoundaryScan,
    WindowClassifier, WindowError,
};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tracing::info;

pub use correlate::{
    correlate_operations, CorrelatedOperation, OperationCorrelation, UnresolvedOperation,
};
pub use oplog::{EditKind, EditOperation, EditOperationLog};
pub use summary::{summarize_window, FileTrail, PathSet, PathTouch, TerminalTally, WindowSummary};

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("replay error: {0}")]
    Replay(#[from] ReplayError),
    #[error("window error: {0}")]
    Window(#[from] WindowError),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("operation log is not valid json: {0}")]
    OperationLog(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionOverview {
    pub entity_count: usize,
    pub boundary_count: usize,
    pub window_count: usize,
    pub first_ts: Option<i64>,
    pub last_ts: Option<i64>,
    pub first_time: Option<DateTime<Utc>>,
    pub last_time: Option<DateTime<Utc>>,
    /// Distinct model short names in order of first use.
    pub models: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionManifest {
    pub overview: SessionOverview,
    pub boundaries: Vec<BoundaryEvent>,
    pub windows: Vec<WindowSummary>,
    pub operations: Option<OperationCorrelation>,
    pub diagnostics: Diagnostics,
}

/// Everything computed for one log, before it is rolled up. Callers that
/// need more than the manifest (the CLI's inventory) start from here.
#[derive(Debug, Clone)]
pub struct SessionAnalysis {
    pub session: ReplayedSession,
    pub scan: BoundaryScan,
    pub activities: Vec<EntityActivity>,
    pub activity_report: ActivityReport,
}

impl SessionAnalysis {
    pub fn classifier(&self) -> WindowClassifier {
        WindowClassifier::new(&self.session.entities, &self.scan.boundaries)
    }

    pub fn manifest(
        &self,
        edits: Option<&EditOperationLog>,
    ) -> Result<SessionManifest, AggregateError> {
        let entities = &self.session.entities;
        let windows = build_windows(entities, &self.scan.boundaries)?;
        let summaries = windows
            .iter()
            .map(|window| summarize_window(window, &self.activities, edits))
            .collect::<Vec<_>>();

        let operations = edits.map(|edits| correlate_operations(edits, &self.classifier()));
        let unresolved = operations
            .as_ref()
            .map(|operations| operations.unresolved.len())
            .unwrap_or(0);

        let mut models: Vec<String> = Vec::new();
        let model_ids = self
            .activities
            .iter()
            .filter_map(|activity| activity.model_id.as_deref());
        for model in model_ids {
            let short = model_short_name(model);
            if !models.iter().any(|known| known == short) {
                models.push(short.to_string());
            }
        }

        let first_ts = windows.first().and_then(|window| window.start_ts);
        let last_ts = windows
            .iter()
            .rev()
            .find(|window| !window.is_empty())
            .and_then(|window| window.end_ts);
        let overview = SessionOverview {
            entity_count: entities.len(),
            boundary_count: self.scan.boundaries.len(),
            window_count: windows.len(),
            first_ts,
            last_ts,
            first_time: first_ts.and_then(timestamp_utc),
            last_time: last_ts.and_then(timestamp_utc),
            models,
        };

        let mut diagnostics = diagnostics_from(
            &self.session.report,
            &self.scan.report,
            &self.activity_report,
        );
        diagnostics.unresolved_operations = unresolved;

        info!(
            windows = overview.window_count,
            boundaries = overview.boundary_count,
            recovered = diagnostics.recovered_conditions(),
            "manifest assembled"
        );

        Ok(SessionManifest {
            overview,
            boundaries: self.scan.boundaries.clone(),
            windows: summaries,
            operations,
            diagnostics,
        })
    }
}

/// Runs the passes in order: replay, boundary detection, activity
/// extraction. Window building and aggregation happen in
/// [`SessionAnalysis::manifest`].
pub struct SessionAnalyzer {
    profile: ReplayProfile,
}

impl SessionAnalyzer {
    pub fn new(profile: ReplayProfile) -> Self {
        Self { profile }
    }

    pub fn analyze_file(&self, path: impl AsRef<Path>) -> Result<SessionAnalysis, AggregateError> {
        let log = PatchLog::read(path)?;
        self.analyze_log(&log)
    }

    pub fn analyze_bytes(&self, bytes: &[u8]) -> Result<SessionAnalysis, AggregateError> {
        self.analyze_log(&PatchLog::from_bytes(bytes))
    }

    pub fn analyze_log(&self, log: &PatchLog) -> Result<SessionAnalysis, AggregateError> {
        let session = ReplayEngine::new(ReplayOptions::from(&self.profile)).replay_log(log)?;
        let scan =
            BoundaryDetector::new(BoundaryConfig::from(&self.profile)).detect(&session.entities);
        let (activities, activity_report) = ActivityExtractor::new().extract_all(&session.entities);
        Ok(SessionAnalysis {
            session,
            scan,
            activities,
            activity_report,
        })
    }
}

pub fn diagnostics_from(
    replay: &ReplayReport,
    boundaries: &BoundaryReport,
    activity: &ActivityReport,
) -> Diagnostics {
    Diagnostics {
        total_lines: replay.total_lines,
        applied_records: replay.applied_records,
        malformed_lines: replay.malformed_lines,
        unapplied_records: replay.unapplied_records,
        session_records: replay.session_records,
        auto_stubbed_entities: replay.auto_stubbed_entities,
        replaced_stubs: replay.replaced_stubs,
        invalid_entities: replay.invalid_entities,
        completion_markers: boundaries.completion_markers,
        collapsed_duplicate_markers: boundaries.collapsed_duplicates,
        markers_without_summary: boundaries.markers_without_summary,
        boundaries_missing_timestamp: boundaries.boundaries_missing_timestamp,
        entities_missing_timestamp: activity.entities_missing_timestamp,
        tool_calls_without_id: activity.tool_calls_without_id,
        file_calls_without_path: activity.file_calls_without_path,
        unrecoverable_commands: activity.unrecoverable_commands,
        indeterminate_terminal_calls: activity.indeterminate_terminal_calls,
        unresolved_operations: 0,
    }
}
