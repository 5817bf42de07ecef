use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApplierError {
    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("JavaScript execution failed: {0}")]
    JavaScriptFailed(String),

    #[error("Timed out waiting for {0}")]
    TimedOut(String),

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Credentials were not provided and cookie login failed")]
    MissingCredentials,

    #[error("Unsupported LLM provider: {0}")]
    UnsupportedProvider(String),

    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Browser error: {0}")]
    BrowserError(String),
}

pub type Result<T> = std::result::Result<T, ApplierError>;

// headless_chrome surfaces its failures as anyhow::Error
impl From<anyhow::Error> for ApplierError {
    fn from(err: anyhow::Error) -> Self {
        ApplierError::BrowserError(err.to_string())
    }
}
