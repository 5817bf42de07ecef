pub mod agent;
pub mod apply;
pub mod browser;
pub mod cli;
pub mod config;
pub mod cookies;
pub mod dom;
pub mod errors;
pub mod listing;
pub mod login;
pub mod scrape;
pub mod types;

pub use apply::{ApplyOrchestrator, ExternalApplication};
pub use browser::BrowserSession;
pub use config::{DataPaths, LlmProvider, SessionConfig, Selectors};
pub use cookies::{CookieRecord, CookieStore};
pub use errors::{ApplierError, Result};
pub use login::LoginFlow;
pub use types::{BrowserConfig, BrowserKind, Viewport};
