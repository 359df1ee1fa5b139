use replaylens_core::ToolInvocation;
use serde::Serialize;
use serde_json::Value;

const BACKGROUND_KEYWORD: &str = "background";
const MIN_PLAIN_TERMINAL_ID_LEN: usize = 9;

/// Command text of a shell call. Only calls captured with shell integration
/// carry `resultDetails.input`; everything else is unrecoverable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "text", rename_all = "snake_case")]
pub enum CommandText {
    Captured(String),
    Unrecoverable,
}

impl CommandText {
    pub fn captured(&self) -> Option<&str> {
        match self {
            CommandText::Captured(text) => Some(text),
            CommandText::Unrecoverable => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundState {
    ForegroundConfirmed,
    BackgroundConfirmed,
    Indeterminate,
}

/// The raw signals behind a `BackgroundState`, kept so a reader can judge
/// the call themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackgroundEvidence {
    pub keyword_in_messages: bool,
    pub id_without_output: bool,
    pub output_captured: bool,
}

impl BackgroundEvidence {
    pub fn gather(invocation: &ToolInvocation) -> Self {
        let keyword_in_messages = [&invocation.invocation_message, &invocation.past_tense_message]
            .into_iter()
            .flatten()
            .any(|message| message.to_lowercase().contains(BACKGROUND_KEYWORD));

        let details = invocation.result_details.as_ref().and_then(Value::as_object);
        let output_captured = details.is_some_and(|details| details.contains_key("output"));
        let id_without_output =
            details.is_some_and(|details| details.contains_key("id")) && !output_captured;

        Self {
            keyword_in_messages,
            id_without_output,
            output_captured,
        }
    }

    /// A keyword in the messages is background; captured output with no
    /// keyword is foreground. A bare terminal id, or no signal at all,
    /// stays indeterminate.
    pub fn state(self) -> BackgroundState {
        if self.keyword_in_messages {
            BackgroundState::BackgroundConfirmed
        } else if self.output_captured {
            BackgroundState::ForegroundConfirmed
        } else {
            BackgroundState::Indeterminate
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerminalCall {
    pub command: CommandText,
    pub terminal_id: Option<String>,
    pub background: BackgroundState,
    pub evidence: BackgroundEvidence,
}

impl TerminalCall {
    pub fn from_invocation(invocation: &ToolInvocation) -> Self {
        let evidence = BackgroundEvidence::gather(invocation);
        Self {
            command: command_text(invocation.result_details.as_ref()),
            terminal_id: terminal_id(invocation.result_details.as_ref()),
            background: evidence.state(),
            evidence,
        }
    }
}

fn command_text(details: Option<&Value>) -> CommandText {
    details
        .and_then(|details| details.get("input"))
        .and_then(Value::as_str)
        .map(|input| CommandText::Captured(input.to_string()))
        .unwrap_or(CommandText::Unrecoverable)
}

fn terminal_id(details: Option<&Value>) -> Option<String> {
    match details? {
        Value::Object(details) => ["id", "terminalId"]
            .iter()
            .find_map(|key| details.get(*key))
            .and_then(|id| match id {
                Value::String(id) => Some(id.clone()),
                Value::Number(id) => Some(id.to_string()),
                _ => None,
            }),
        Value::String(id) if id.len() >= MIN_PLAIN_TERMINAL_ID_LEN => Some(id.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shell_call(invocation: &str, past: Option<&str>, details: Option<Value>) -> ToolInvocation {
        ToolInvocation {
            tool_id: Some("run_in_terminal".to_string()),
            call_id: Some("call-1".to_string()),
            is_complete: true,
            invocation_message: Some(invocation.to_string()),
            past_tense_message: past.map(ToString::to_string),
            result_details: details,
        }
    }

    #[test]
    fn captured_input_is_the_command() {
        let call = TerminalCall::from_invocation(&shell_call(
            "Running `cargo fmt`",
            None,
            Some(json!({"input": "cargo fmt", "output": ""})),
        ));
        assert_eq!(call.command, CommandText::Captured("cargo fmt".to_string()));
        assert_eq!(call.background, BackgroundState::ForegroundConfirmed);
    }

    #[test]
    fn missing_input_is_unrecoverable_not_empty() {
        let call = TerminalCall::from_invocation(&shell_call("Running command", None, None));
        assert_eq!(call.command, CommandText::Unrecoverable);
        assert_eq!(call.command.captured(), None);
        assert_eq!(call.background, BackgroundState::Indeterminate);
    }

    #[test]
    fn keyword_confirms_background() {
        let call = TerminalCall::from_invocation(&shell_call(
            "Running command",
            Some("Started Background terminal"),
            Some(json!({"id": "4f1c2a7e-terminal"})),
        ));
        assert_eq!(call.background, BackgroundState::BackgroundConfirmed);
        assert_eq!(call.terminal_id.as_deref(), Some("4f1c2a7e-terminal"));
    }

    #[test]
    fn bare_terminal_id_stays_indeterminate() {
        let call = TerminalCall::from_invocation(&shell_call(
            "Running command",
            None,
            Some(json!({"id": 42})),
        ));
        assert!(call.evidence.id_without_output);
        assert!(!call.evidence.keyword_in_messages);
        assert_eq!(call.background, BackgroundState::Indeterminate);
        assert_eq!(call.terminal_id.as_deref(), Some("42"));
    }

    #[test]
    fn terminal_id_fallbacks() {
        assert_eq!(
            terminal_id(Some(&json!({"terminalId": "t-1"}))).as_deref(),
            Some("t-1")
        );
        assert_eq!(
            terminal_id(Some(&json!("0123456789ab"))).as_deref(),
            Some("0123456789ab")
        );
        assert_eq!(terminal_id(Some(&json!("short"))), None);
        assert_eq!(terminal_id(None), None);
    }
}
