use crate::browser::BrowserSession;
use crate::dom::DomSnapshot;
use crate::errors::{ApplierError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// Structured outcome handed back to the model as an observation. Tool
/// failures are reported this way instead of raised, so one malformed step
/// never aborts the whole session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub ok: bool,
    pub content: String,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            ok: true,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            ok: false,
            content: content.into(),
        }
    }

    pub fn observation(&self) -> String {
        if self.ok {
            format!("Result: {}", self.content)
        } else {
            format!("Error: {}", self.content)
        }
    }
}

/// The actions the form-filling agent may take, parsed from the model's
/// JSON reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AgentAction {
    /// Click the interactive element at the given snapshot index.
    Click { index: usize },
    /// Type text into the element at the given snapshot index.
    TypeText { index: usize, text: String },
    /// Read the resume text for form-filling context.
    ReadCv,
    /// Upload the resume PDF to the file input at the given index.
    UploadCv { index: usize },
    /// The application has been submitted, or no further progress is
    /// possible.
    Done {
        #[serde(default)]
        summary: Option<String>,
    },
}

/// Extracts the first JSON object from a model reply, tolerating code
/// fences and chatter around it.
pub fn parse_action(raw: &str) -> Result<AgentAction> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => {
            return Err(ApplierError::Configuration(format!(
                "reply contains no JSON action object: {raw}"
            )))
        }
    };
    Ok(serde_json::from_str(json)?)
}

/// Everything a tool invocation may touch: the agent's own browser session,
/// the latest element snapshot, and the resume.
pub struct ToolContext<'a> {
    pub session: &'a BrowserSession,
    pub snapshot: &'a DomSnapshot,
    pub cv_text: &'a str,
    pub cv_path: &'a PathBuf,
    pub username: &'a str,
}

/// Executes one agent action. The boolean signals session completion.
pub fn execute(action: &AgentAction, ctx: &ToolContext<'_>) -> (ToolResult, bool) {
    match action {
        AgentAction::Click { index } => (click(ctx, *index), false),
        AgentAction::TypeText { index, text } => (type_text(ctx, *index, text), false),
        AgentAction::ReadCv => (read_cv(ctx), false),
        AgentAction::UploadCv { index } => (upload_cv(ctx, *index), false),
        AgentAction::Done { summary } => {
            info!(
                "Agent finished: {}",
                summary.as_deref().unwrap_or("no summary")
            );
            (ToolResult::success("session complete"), true)
        }
    }
}

fn click(ctx: &ToolContext<'_>, index: usize) -> ToolResult {
    let Some(element) = ctx.snapshot.get(index) else {
        return ToolResult::error(format!("No element found at index {index}"));
    };
    match ctx.session.click(&element.css_selector) {
        Ok(()) => ToolResult::success(format!("Clicked element {index} ({})", element.label)),
        Err(e) => ToolResult::error(format!("Failed to click element {index}: {e}")),
    }
}

fn type_text(ctx: &ToolContext<'_>, index: usize, text: &str) -> ToolResult {
    let Some(element) = ctx.snapshot.get(index) else {
        return ToolResult::error(format!("No element found at index {index}"));
    };
    match ctx.session.type_into(&element.css_selector, text) {
        Ok(()) => ToolResult::success(format!("Typed into element {index}")),
        Err(e) => ToolResult::error(format!("Failed to type into element {index}: {e}")),
    }
}

fn read_cv(ctx: &ToolContext<'_>) -> ToolResult {
    if ctx.cv_text.is_empty() {
        return ToolResult::error(format!(
            "Could not load CV for username {} from {}",
            ctx.username,
            ctx.cv_path.display()
        ));
    }
    ToolResult::success(ctx.cv_text.to_string())
}

fn upload_cv(ctx: &ToolContext<'_>, index: usize) -> ToolResult {
    let Some(element) = ctx.snapshot.get(index) else {
        debug!("No element found at index {index}");
        return ToolResult::error(format!("No element found at index {index}"));
    };
    if !element.is_file_input() {
        debug!("Element at index {index} is not a file upload element");
        return ToolResult::error(format!(
            "Element at index {index} is not a file upload element"
        ));
    }
    match ctx.session.set_file_input(&element.css_selector, ctx.cv_path) {
        Ok(()) => {
            let msg = format!(
                "Successfully uploaded file \"{}\" to index {index}",
                ctx.cv_path.display()
            );
            info!("{msg}");
            ToolResult::success(msg)
        }
        Err(e) => {
            debug!("Error in upload: {e}");
            ToolResult::error(format!("Failed to upload file to index {index}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json_actions() {
        let action = parse_action(r#"{"action": "click", "index": 3}"#).unwrap();
        assert_eq!(action, AgentAction::Click { index: 3 });
    }

    #[test]
    fn parses_fenced_and_padded_replies() {
        let raw = "Sure, I'll upload the resume now.\n```json\n{\"action\": \"upload_cv\", \"index\": 2}\n```";
        assert_eq!(
            parse_action(raw).unwrap(),
            AgentAction::UploadCv { index: 2 }
        );
    }

    #[test]
    fn parses_done_with_and_without_summary() {
        assert_eq!(
            parse_action(r#"{"action": "done"}"#).unwrap(),
            AgentAction::Done { summary: None }
        );
        assert_eq!(
            parse_action(r#"{"action": "done", "summary": "submitted"}"#).unwrap(),
            AgentAction::Done {
                summary: Some("submitted".to_string())
            }
        );
    }

    #[test]
    fn reply_without_json_is_an_error() {
        assert!(parse_action("I am not sure what to do").is_err());
    }

    #[test]
    fn unknown_action_name_is_an_error() {
        assert!(parse_action(r#"{"action": "self_destruct"}"#).is_err());
    }

    #[test]
    fn tool_results_render_as_observations() {
        assert_eq!(
            ToolResult::success("uploaded").observation(),
            "Result: uploaded"
        );
        assert_eq!(
            ToolResult::error("no such element").observation(),
            "Error: no such element"
        );
    }
}
