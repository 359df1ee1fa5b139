use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    FileRead,
    FileWrite,
    ShellCommand,
    Unrecognized,
}

impl ToolCategory {
    pub fn is_file(self) -> bool {
        matches!(self, ToolCategory::FileRead | ToolCategory::FileWrite)
    }
}

/// Tool identifier to category. Every identifier appears exactly once.
pub const TOOL_CATEGORIES: [(&str, ToolCategory); 14] = [
    ("copilot_readFile", ToolCategory::FileRead),
    ("copilot_findFiles", ToolCategory::FileRead),
    ("copilot_findTextInFiles", ToolCategory::FileRead),
    ("copilot_listDirectory", ToolCategory::FileRead),
    ("copilot_getErrors", ToolCategory::FileRead),
    ("copilot_getChangedFiles", ToolCategory::FileRead),
    ("copilot_searchCodebase", ToolCategory::FileRead),
    ("copilot_createFile", ToolCategory::FileWrite),
    ("copilot_createDirectory", ToolCategory::FileWrite),
    ("copilot_replaceString", ToolCategory::FileWrite),
    ("copilot_multiReplaceString", ToolCategory::FileWrite),
    ("copilot_editFiles", ToolCategory::FileWrite),
    ("run_in_terminal", ToolCategory::ShellCommand),
    ("copilot_runInTerminal", ToolCategory::ShellCommand),
];

pub fn categorize(tool_id: Option<&str>) -> ToolCategory {
    tool_id
        .and_then(|tool_id| {
            TOOL_CATEGORIES
                .iter()
                .find(|(known, _)| *known == tool_id)
                .map(|(_, category)| *category)
        })
        .unwrap_or(ToolCategory::Unrecognized)
}

fn markdown_link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\]\(file:///([^)]+)\)").expect("valid regex"))
}

fn bare_uri_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"file:///([^\s'"]+)"#).expect("valid regex"))
}

/// Pulls a local path out of a tool's human-readable message. A markdown
/// link wins over a bare `file:///` URI anywhere in the text.
pub fn extract_file_path(message: &str) -> Option<String> {
    let encoded = [markdown_link_pattern(), bare_uri_pattern()]
        .into_iter()
        .find_map(|pattern| pattern.captures(message))
        .and_then(|captures| captures.get(1))?
        .as_str();

    let decoded = urlencoding::decode_binary(encoded.as_bytes());
    let path = String::from_utf8_lossy(&decoded).into_owned();
    Some(restore_root(path))
}

// The URI capture drops the slash after `file://`; drive-letter paths never had one.
fn restore_root(path: String) -> String {
    let mut chars = path.chars();
    let drive_letter = matches!(
        (chars.next(), chars.next()),
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic()
    );
    if drive_letter {
        path
    } else {
        format!("/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn category_table_is_disjoint() {
        let ids = TOOL_CATEGORIES
            .iter()
            .map(|(tool_id, _)| *tool_id)
            .collect::<HashSet<_>>();
        assert_eq!(ids.len(), TOOL_CATEGORIES.len());
    }

    #[test]
    fn unknown_and_missing_ids_are_unrecognized() {
        assert_eq!(categorize(Some("copilot_readFile")), ToolCategory::FileRead);
        assert_eq!(categorize(Some("copilot_editFiles")), ToolCategory::FileWrite);
        assert_eq!(categorize(Some("run_in_terminal")), ToolCategory::ShellCommand);
        assert_eq!(categorize(Some("copilot_fetchWebPage")), ToolCategory::Unrecognized);
        assert_eq!(categorize(None), ToolCategory::Unrecognized);
    }

    #[test]
    fn markdown_link_is_preferred_and_decoded() {
        let message = "Reading [](file:///c%3A/work/src/main.rs), see file:///c%3A/other.rs";
        assert_eq!(
            extract_file_path(message).as_deref(),
            Some("c:/work/src/main.rs")
        );
    }

    #[test]
    fn bare_uri_is_the_fallback() {
        let message = "Created file:///home/dev/notes%20v2.md 'done'";
        assert_eq!(
            extract_file_path(message).as_deref(),
            Some("/home/dev/notes v2.md")
        );
    }

    #[test]
    fn no_uri_means_no_path() {
        assert_eq!(extract_file_path("Searched codebase for \"parser\""), None);
        assert_eq!(extract_file_path(""), None);
    }
}
