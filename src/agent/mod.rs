pub mod llm;
pub mod runner;
pub mod tools;

pub use llm::{ChatMessage, LlmClient, Role};
pub use runner::{load_cv, FormAgent};
pub use tools::{AgentAction, ToolResult};
