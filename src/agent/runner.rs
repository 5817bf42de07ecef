use crate::agent::llm::{ChatMessage, LlmClient};
use crate::agent::tools::{self, ToolContext};
use crate::browser::BrowserSession;
use crate::config::{DataPaths, SessionConfig};
use crate::dom;
use crate::errors::Result;
use crate::types::BrowserConfig;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

const MAX_STEPS: usize = 25;

const SYSTEM_PROMPT: &str = "\
You are a professional job applier controlling a web browser. \
On the current page, find how to apply for the job. \
1. Read the candidate's CV with read_cv. \
2. Fill the form based on the CV. \
3. Upload the CV wherever a file input asks for a resume. \
Important: if you don't have info to fill something you can just make it up.\n\
Each turn you receive the page's interactive elements as a numbered list. \
Reply with exactly one JSON object and nothing else, one of:\n\
{\"action\": \"click\", \"index\": N}\n\
{\"action\": \"type_text\", \"index\": N, \"text\": \"...\"}\n\
{\"action\": \"read_cv\"}\n\
{\"action\": \"upload_cv\", \"index\": N}\n\
{\"action\": \"done\", \"summary\": \"...\"}";

/// Loads the resume text. A missing or unreadable file degrades to an empty
/// string; the agent then runs without resume context.
pub fn load_cv(path: &Path) -> String {
    info!("Attempting to load CV from {}", path.display());
    match pdf_extract::extract_text(path) {
        Ok(text) => {
            info!("Loaded CV with {} characters", text.len());
            text
        }
        Err(e) => {
            error!("Could not read CV at {}: {e}", path.display());
            String::new()
        }
    }
}

/// One autonomous form-filling session: own browser, own LLM transcript,
/// observe-decide-act loop until the model reports done or the step cap is
/// reached.
pub struct FormAgent {
    config: SessionConfig,
    llm: LlmClient,
    cv_path: PathBuf,
}

impl FormAgent {
    /// Fails fast (before any browser work) when the LLM configuration is
    /// unusable.
    pub fn new(config: &SessionConfig, paths: &DataPaths) -> Result<Self> {
        let llm = LlmClient::from_config(config)?;
        let cv_path = paths.cv_path(&config.username);
        Ok(Self {
            config: config.clone(),
            llm,
            cv_path,
        })
    }

    pub async fn run(&self, url: &str) -> Result<()> {
        let cv_text = load_cv(&self.cv_path);

        // The form session is deliberately visible, matching how users
        // supervise external applications.
        let browser_config = BrowserConfig {
            headless: false,
            kind: self.config.browser,
            ..Default::default()
        };
        let session = BrowserSession::launch(browser_config)?;
        session.navigate(url)?;
        info!("Agent session started for {url}");

        let mut transcript: Vec<ChatMessage> = Vec::new();
        for step in 0..MAX_STEPS {
            let snapshot = dom::snapshot_from_html(&session.current_url(), &session.page_source()?);
            transcript.push(ChatMessage::user(format!(
                "Current URL: {}\nInteractive elements:\n{}",
                snapshot.url,
                snapshot.listing()
            )));

            let reply = self.llm.complete(SYSTEM_PROMPT, &transcript).await?;
            transcript.push(ChatMessage::assistant(reply.clone()));

            let action = match tools::parse_action(&reply) {
                Ok(action) => action,
                Err(e) => {
                    warn!("Step {step}: unparseable agent reply: {e}");
                    transcript.push(ChatMessage::user(format!(
                        "Error: your reply was not a valid action object ({e}). \
                         Reply with exactly one JSON action."
                    )));
                    continue;
                }
            };

            let ctx = ToolContext {
                session: &session,
                snapshot: &snapshot,
                cv_text: &cv_text,
                cv_path: &self.cv_path,
                username: &self.config.username,
            };
            let (result, done) = tools::execute(&action, &ctx);
            info!("Step {step}: {:?} -> {}", action, result.observation());
            transcript.push(ChatMessage::user(result.observation()));

            if done {
                return Ok(());
            }
        }

        warn!("Agent hit the {MAX_STEPS}-step cap without finishing on {url}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_resume_degrades_to_empty_string() {
        let text = load_cv(Path::new("/definitely/not/here/main.pdf"));
        assert_eq!(text, "");
    }

    #[test]
    fn agent_construction_fails_without_llm_settings() {
        let config = SessionConfig {
            email: String::new(),
            password: String::new(),
            filtered_job_url: String::new(),
            username: "main".to_string(),
            apply_with_ai: true,
            headless: true,
            browser: Default::default(),
            model_name: None,
            base_url: None,
            provider: None,
            api_key: None,
        };
        let paths = DataPaths::new("/tmp/data");
        assert!(FormAgent::new(&config, &paths).is_err());
    }
}
