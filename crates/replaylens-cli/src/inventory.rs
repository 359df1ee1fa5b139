use chrono::{DateTime, Utc};
use replaylens_activity::ToolCategory;
use replaylens_aggregate::{EditKind, EditOperationLog, SessionAnalysis};
use replaylens_windows::{build_windows, WindowAssignment, WindowError};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStat {
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Memoised filesystem lookups for one command invocation. Paths are
/// stat'ed at most once; a path that could not be stat'ed is cached as absent.
#[derive(Debug, Default)]
pub struct FileStatCache {
    entries: HashMap<PathBuf, Option<FileStat>>,
    lookups: usize,
}

impl FileStatCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stat(&mut self, path: &Path) -> Option<FileStat> {
        if let Some(cached) = self.entries.get(path) {
            return cached.clone();
        }
        self.lookups += 1;
        let stat = std::fs::metadata(path).ok().map(|metadata| FileStat {
            is_dir: metadata.is_dir(),
            size: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        });
        self.entries.insert(path.to_path_buf(), stat.clone());
        stat
    }

    pub fn lookups(&self) -> usize {
        self.lookups
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchSource {
    ToolRead,
    ToolCreate,
    ToolEdit,
    EditLogCreate,
    EditLogEdit,
    ContextFile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryEntry {
    pub path: String,
    pub sources: BTreeSet<TouchSource>,
    pub windows: BTreeSet<usize>,
    pub exists: bool,
    pub stat: Option<FileStat>,
}

#[derive(Debug, Default)]
struct Touches {
    sources: BTreeSet<TouchSource>,
    windows: BTreeSet<usize>,
}

pub fn build_inventory(
    analysis: &SessionAnalysis,
    edits: Option<&EditOperationLog>,
    cache: &mut FileStatCache,
) -> Result<Vec<InventoryEntry>, WindowError> {
    let windows = build_windows(&analysis.session.entities, &analysis.scan.boundaries)?;
    let mut touched: BTreeMap<String, Touches> = BTreeMap::new();
    let mut record = |path: &str, source: TouchSource, window: Option<usize>| {
        let touches = touched.entry(path.to_string()).or_default();
        touches.sources.insert(source);
        touches.windows.extend(window);
    };

    for window in &windows {
        for activity in analysis.activities.get(window.range.clone()).unwrap_or_default() {
            for reference in &activity.context_files {
                record(reference, TouchSource::ContextFile, Some(window.number));
            }
            for tool in &activity.tools {
                let Some(path) = tool.path.as_deref() else {
                    continue;
                };
                let source = match (tool.category, tool.tool_id.as_deref()) {
                    (ToolCategory::FileRead, _) => TouchSource::ToolRead,
                    (_, Some("copilot_createFile" | "copilot_createDirectory")) => {
                        TouchSource::ToolCreate
                    }
                    _ => TouchSource::ToolEdit,
                };
                record(path, source, Some(window.number));
            }
        }
    }

    if let Some(edits) = edits {
        let classifier = analysis.classifier();
        for operation in &edits.operations {
            let Some(path) = operation.path.as_deref() else {
                continue;
            };
            let source = match operation.kind {
                EditKind::Create => TouchSource::EditLogCreate,
                _ => TouchSource::EditLogEdit,
            };
            let window = operation
                .request_id
                .as_deref()
                .map(|request_id| classifier.classify_request(request_id))
                .and_then(WindowAssignment::window);
            record(path, source, window);
        }
    }

    Ok(touched
        .into_iter()
        .map(|(path, touches)| {
            let stat = cache.stat(Path::new(&path));
            InventoryEntry {
                exists: stat.is_some(),
                stat,
                path,
                sources: touches.sources,
                windows: touches.windows,
            }
        })
        .collect())
}
