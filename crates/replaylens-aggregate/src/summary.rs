use chrono::{DateTime, Utc};
use replaylens_activity::{BackgroundState, CommandText, EntityActivity, ToolCategory};
use replaylens_core::{model_short_name, timestamp_utc};
use replaylens_windows::Window;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::oplog::{EditKind, EditOperationLog};

const CREATE_TOOL_IDS: [&str; 2] = ["copilot_createFile", "copilot_createDirectory"];

/// Unique paths in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PathSet {
    paths: Vec<String>,
    #[serde(skip)]
    seen: HashSet<String>,
}

impl PathSet {
    pub fn insert(&mut self, path: &str) -> bool {
        if self.seen.insert(path.to_string()) {
            self.paths.push(path.to_string());
            true
        } else {
            false
        }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileTrail {
    pub created: PathSet,
    pub edited: PathSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathTouch {
    pub path: String,
    pub tool_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TerminalTally {
    pub foreground_confirmed: usize,
    pub background_confirmed: usize,
    pub indeterminate: usize,
}

/// Per-window roll-up. The two file trails are reported side by side and
/// never merged: `tool_call_writes` comes from the tool calls in the
/// responses, `edit_log` from the separately recorded editing timeline
/// (`None` when no such log was supplied).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowSummary {
    pub window: usize,
    pub first_index: Option<usize>,
    pub last_index: Option<usize>,
    pub entity_count: usize,
    pub start_ts: Option<i64>,
    pub end_ts: Option<i64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub model_start: Option<String>,
    pub model_end: Option<String>,
    pub tool_histogram: BTreeMap<String, usize>,
    pub tool_calls_without_id: usize,
    pub reads: Vec<PathTouch>,
    pub unique_reads: PathSet,
    pub tool_call_writes: FileTrail,
    pub edit_log: Option<FileTrail>,
    pub file_calls_without_path: usize,
    pub commands: Vec<CommandText>,
    pub unrecoverable_commands: usize,
    pub terminals: TerminalTally,
    pub context_files: PathSet,
}

pub fn summarize_window(
    window: &Window<'_>,
    activities: &[EntityActivity],
    edits: Option<&EditOperationLog>,
) -> WindowSummary {
    let members = activities.get(window.range.clone()).unwrap_or_default();

    let model_at = |activity: Option<&EntityActivity>| {
        activity
            .and_then(|activity| activity.model_id.as_deref())
            .map(|model| model_short_name(model).to_string())
    };

    let mut summary = WindowSummary {
        window: window.number,
        first_index: window.first_index(),
        last_index: window.last_index(),
        entity_count: window.len(),
        start_ts: window.start_ts,
        end_ts: window.end_ts,
        start_time: window.start_ts.and_then(timestamp_utc),
        end_time: window.end_ts.and_then(timestamp_utc),
        duration_ms: window
            .start_ts
            .zip(window.end_ts)
            .and_then(|(start, end)| end.checked_sub(start)),
        model_start: model_at(members.first()),
        model_end: model_at(members.last()),
        tool_histogram: BTreeMap::new(),
        tool_calls_without_id: 0,
        reads: Vec::new(),
        unique_reads: PathSet::default(),
        tool_call_writes: FileTrail::default(),
        edit_log: edits.map(|_| FileTrail::default()),
        file_calls_without_path: 0,
        commands: Vec::new(),
        unrecoverable_commands: 0,
        terminals: TerminalTally::default(),
        context_files: PathSet::default(),
    };

    for activity in members {
        for reference in &activity.context_files {
            summary.context_files.insert(reference);
        }
        for tool in &activity.tools {
            let Some(tool_id) = tool.tool_id.as_deref() else {
                summary.tool_calls_without_id += 1;
                continue;
            };
            *summary.tool_histogram.entry(tool_id.to_string()).or_default() += 1;

            if tool.category.is_file() && tool.path.is_none() {
                summary.file_calls_without_path += 1;
            }
            match (tool.category, tool.path.as_deref()) {
                (ToolCategory::FileRead, Some(path)) => {
                    summary.unique_reads.insert(path);
                    summary.reads.push(PathTouch {
                        path: path.to_string(),
                        tool_id: tool_id.to_string(),
                    });
                }
                (ToolCategory::FileWrite, Some(path)) if CREATE_TOOL_IDS.contains(&tool_id) => {
                    summary.tool_call_writes.created.insert(path);
                }
                (ToolCategory::FileWrite, Some(path)) => {
                    summary.tool_call_writes.edited.insert(path);
                }
                _ => {}
            }

            if let Some(terminal) = &tool.terminal {
                if terminal.command == CommandText::Unrecoverable {
                    summary.unrecoverable_commands += 1;
                }
                summary.commands.push(terminal.command.clone());
                let tally = &mut summary.terminals;
                match terminal.background {
                    BackgroundState::ForegroundConfirmed => tally.foreground_confirmed += 1,
                    BackgroundState::BackgroundConfirmed => tally.background_confirmed += 1,
                    BackgroundState::Indeterminate => tally.indeterminate += 1,
                }
            }
        }

        if let (Some(edits), Some(trail), Some(request_id)) = (
            edits,
            summary.edit_log.as_mut(),
            activity.request_id.as_deref(),
        ) {
            for operation in edits.for_request(request_id) {
                let Some(path) = operation.path.as_deref() else {
                    continue;
                };
                match operation.kind {
                    EditKind::Create => {
                        trail.created.insert(path);
                    }
                    EditKind::TextEdit => {
                        trail.edited.insert(path);
                    }
                    EditKind::Other(_) => {}
                }
            }
        }
    }

    summary
}
