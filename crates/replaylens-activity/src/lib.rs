pub mod terminal;
pub mod tools;

use replaylens_core::{Entity, ResponsePart, ToolInvocation};
use serde::Serialize;
use tracing::debug;

pub use terminal::{BackgroundEvidence, BackgroundState, CommandText, TerminalCall};
pub use tools::{categorize, extract_file_path, ToolCategory, TOOL_CATEGORIES};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityReport {
    pub entities: usize,
    pub tool_calls: usize,
    pub entities_missing_timestamp: usize,
    pub tool_calls_without_id: usize,
    pub file_calls_without_path: usize,
    pub unrecoverable_commands: usize,
    pub indeterminate_terminal_calls: usize,
}

impl ActivityReport {
    pub fn merge(&mut self, other: &ActivityReport) {
        self.entities += other.entities;
        self.tool_calls += other.tool_calls;
        self.entities_missing_timestamp += other.entities_missing_timestamp;
        self.tool_calls_without_id += other.tool_calls_without_id;
        self.file_calls_without_path += other.file_calls_without_path;
        self.unrecoverable_commands += other.unrecoverable_commands;
        self.indeterminate_terminal_calls += other.indeterminate_terminal_calls;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolActivity {
    pub tool_id: Option<String>,
    pub call_id: Option<String>,
    pub is_complete: bool,
    pub category: ToolCategory,
    /// Only looked for on file calls; `None` there means the message held no URI.
    pub path: Option<String>,
    pub terminal: Option<TerminalCall>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityActivity {
    pub index: usize,
    pub request_id: Option<String>,
    pub timestamp: Option<i64>,
    pub model_id: Option<String>,
    pub prompt: Option<String>,
    pub context_files: Vec<String>,
    pub tools: Vec<ToolActivity>,
}

impl EntityActivity {
    pub fn commands(&self) -> impl Iterator<Item = &CommandText> + '_ {
        self.tools
            .iter()
            .filter_map(|tool| tool.terminal.as_ref())
            .map(|terminal| &terminal.command)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ActivityExtractor;

impl ActivityExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract_all(&self, entities: &[Entity]) -> (Vec<EntityActivity>, ActivityReport) {
        let mut report = ActivityReport::default();
        let activities = entities
            .iter()
            .map(|entity| {
                let (activity, entity_report) = self.extract(entity);
                report.merge(&entity_report);
                activity
            })
            .collect();
        (activities, report)
    }

    pub fn extract(&self, entity: &Entity) -> (EntityActivity, ActivityReport) {
        let mut report = ActivityReport {
            entities: 1,
            ..ActivityReport::default()
        };

        let timestamp = entity.timestamp_ms();
        if timestamp.is_none() {
            report.entities_missing_timestamp += 1;
        }

        let tools = entity
            .response_parts()
            .filter_map(|part| match part {
                ResponsePart::ToolInvocation(invocation) => Some(invocation),
                _ => None,
            })
            .map(|invocation| tool_activity(entity.index, &invocation, &mut report))
            .collect();

        let activity = EntityActivity {
            index: entity.index,
            request_id: entity.request_id().map(ToString::to_string),
            timestamp,
            model_id: entity.model_id().map(ToString::to_string),
            prompt: entity.message_text().map(ToString::to_string),
            context_files: entity
                .content_references()
                .into_iter()
                .map(ToString::to_string)
                .collect(),
            tools,
        };
        (activity, report)
    }
}

fn tool_activity(
    entity_index: usize,
    invocation: &ToolInvocation,
    report: &mut ActivityReport,
) -> ToolActivity {
    report.tool_calls += 1;
    if invocation.tool_id.is_none() {
        report.tool_calls_without_id += 1;
    }

    let category = categorize(invocation.tool_id.as_deref());
    let path = if category.is_file() {
        let path = [&invocation.invocation_message, &invocation.past_tense_message]
            .into_iter()
            .flatten()
            .find_map(|message| extract_file_path(message));
        if path.is_none() {
            debug!(
                entity = entity_index,
                tool = ?invocation.tool_id,
                "file tool call without a recoverable path"
            );
            report.file_calls_without_path += 1;
        }
        path
    } else {
        None
    };

    let terminal = (category == ToolCategory::ShellCommand).then(|| {
        let terminal = TerminalCall::from_invocation(invocation);
        if terminal.command == CommandText::Unrecoverable {
            report.unrecoverable_commands += 1;
        }
        if terminal.background == BackgroundState::Indeterminate {
            report.indeterminate_terminal_calls += 1;
        }
        terminal
    });

    ToolActivity {
        tool_id: invocation.tool_id.clone(),
        call_id: invocation.call_id.clone(),
        is_complete: invocation.is_complete,
        category,
        path,
        terminal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(raw: serde_json::Value) -> Entity {
        Entity::from_value(3, raw).0
    }

    #[test]
    fn classifies_each_tool_call_of_an_entity() {
        let entity = entity(json!({
            "requestId": "req-3",
            "timestamp": 1_700_000_000_000i64,
            "modelId": "copilot/claude-sonnet-4",
            "message": {"text": "fix the parser"},
            "contentReferences": [{"reference": {"fsPath": "/repo/AGENTS.md"}}],
            "response": [
                {"kind": "markdownContent", "content": {"value": "ok"}},
                {
                    "kind": "toolInvocationSerialized",
                    "toolId": "copilot_readFile",
                    "toolCallId": "a",
                    "isComplete": true,
                    "invocationMessage": {"value": "Reading [](file:///repo/src/parser.rs)"}
                },
                {
                    "kind": "toolInvocationSerialized",
                    "toolId": "copilot_replaceString",
                    "toolCallId": "b",
                    "invocationMessage": "Editing",
                    "pastTenseMessage": "Edited file:///repo/src/parser.rs"
                },
                {
                    "kind": "toolInvocationSerialized",
                    "toolId": "run_in_terminal",
                    "toolCallId": "c",
                    "invocationMessage": "Running tests",
                    "resultDetails": {"input": "cargo test -p parser", "output": "ok"}
                },
                {
                    "kind": "toolInvocationSerialized",
                    "toolId": "copilot_fetchWebPage",
                    "toolCallId": "d"
                }
            ]
        }));

        let (activity, report) = ActivityExtractor::new().extract(&entity);
        assert_eq!(activity.request_id.as_deref(), Some("req-3"));
        assert_eq!(activity.prompt.as_deref(), Some("fix the parser"));
        assert_eq!(activity.context_files, vec!["/repo/AGENTS.md".to_string()]);
        assert_eq!(activity.tools.len(), 4);

        let categories = activity
            .tools
            .iter()
            .map(|tool| tool.category)
            .collect::<Vec<_>>();
        assert_eq!(
            categories,
            vec![
                ToolCategory::FileRead,
                ToolCategory::FileWrite,
                ToolCategory::ShellCommand,
                ToolCategory::Unrecognized
            ]
        );
        assert_eq!(activity.tools[0].path.as_deref(), Some("/repo/src/parser.rs"));
        assert_eq!(activity.tools[1].path.as_deref(), Some("/repo/src/parser.rs"));
        assert_eq!(
            activity.commands().collect::<Vec<_>>(),
            vec![&CommandText::Captured("cargo test -p parser".to_string())]
        );
        assert_eq!(report.tool_calls, 4);
        assert_eq!(report.file_calls_without_path, 0);
        assert_eq!(report.unrecoverable_commands, 0);
    }

    #[test]
    fn unpathed_file_calls_and_lost_commands_are_counted() {
        let entity = entity(json!({
            "response": [
                {"kind": "toolInvocationSerialized", "toolId": "copilot_findFiles", "invocationMessage": "Searching for **/*.rs"},
                {"kind": "toolInvocationSerialized", "toolId": "copilot_runInTerminal", "invocationMessage": "Running"},
                {"kind": "toolInvocationSerialized", "invocationMessage": "no id"}
            ]
        }));

        let (activity, report) = ActivityExtractor::new().extract(&entity);
        assert_eq!(activity.tools[0].path, None);
        assert_eq!(
            activity.tools[1].terminal.as_ref().map(|t| &t.command),
            Some(&CommandText::Unrecoverable)
        );
        assert_eq!(report.entities_missing_timestamp, 1);
        assert_eq!(report.file_calls_without_path, 1);
        assert_eq!(report.unrecoverable_commands, 1);
        assert_eq!(report.indeterminate_terminal_calls, 1);
        assert_eq!(report.tool_calls_without_id, 1);
    }

    #[test]
    fn reports_merge_across_entities() {
        let entities = vec![
            Entity::from_value(0, json!({"timestamp": 1})).0,
            Entity::empty(1),
        ];
        let (activities, report) = ActivityExtractor::new().extract_all(&entities);
        assert_eq!(activities.len(), 2);
        assert_eq!(report.entities, 2);
        assert_eq!(report.entities_missing_timestamp, 1);
    }
}
