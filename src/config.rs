use crate::errors::{ApplierError, Result};
use crate::types::BrowserKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, warn};

/// LLM backend, resolved at configuration-load time so an unknown name
/// fails before any browser work starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    AzureOpenAi,
    Google,
    Groq,
    Ollama,
    OpenAiCompatible,
}

impl LlmProvider {
    pub const ALL: [LlmProvider; 7] = [
        LlmProvider::OpenAi,
        LlmProvider::Anthropic,
        LlmProvider::Google,
        LlmProvider::Groq,
        LlmProvider::AzureOpenAi,
        LlmProvider::Ollama,
        LlmProvider::OpenAiCompatible,
    ];

    /// Providers that require an explicit base URL in the config.
    pub fn requires_base_url(&self) -> bool {
        matches!(
            self,
            LlmProvider::OpenAiCompatible | LlmProvider::AzureOpenAi
        )
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LlmProvider::OpenAi => "OpenAI",
            LlmProvider::Anthropic => "Anthropic",
            LlmProvider::AzureOpenAi => "AzureOpenAI",
            LlmProvider::Google => "Google",
            LlmProvider::Groq => "Groq",
            LlmProvider::Ollama => "Ollama",
            LlmProvider::OpenAiCompatible => "OpenAI_compatible",
        };
        f.write_str(name)
    }
}

impl FromStr for LlmProvider {
    type Err = ApplierError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "OpenAI" => Ok(LlmProvider::OpenAi),
            "Anthropic" => Ok(LlmProvider::Anthropic),
            "AzureOpenAI" => Ok(LlmProvider::AzureOpenAi),
            "Google" => Ok(LlmProvider::Google),
            "Groq" => Ok(LlmProvider::Groq),
            "Ollama" => Ok(LlmProvider::Ollama),
            "OpenAI_compatible" => Ok(LlmProvider::OpenAiCompatible),
            other => Err(ApplierError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// One user's run configuration, persisted as a record in the per-user
/// JSON config map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub email: String,
    pub password: String,
    pub filtered_job_url: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_true")]
    pub apply_with_ai: bool,
    #[serde(default = "default_true")]
    pub headless: bool,
    #[serde(default)]
    pub browser: BrowserKind,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub provider: Option<LlmProvider>,
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_username() -> String {
    "main".to_string()
}

fn default_true() -> bool {
    true
}

impl SessionConfig {
    pub fn has_credentials(&self) -> bool {
        !self.email.is_empty() && !self.password.is_empty()
    }
}

/// Site CSS selectors, kept out of the code because they are generated
/// class hashes that drift with the target site's front-end builds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub cookie_consent: String,
    pub email_field: String,
    pub email_continue: String,
    pub password_field: String,
    pub login_submit: String,
    pub fast_apply: String,
    pub normal_apply: String,
    pub apply_continue: String,
    pub reveal_more: String,
    pub offer_link: String,
    pub pagination_max_page: String,
    /// Links containing this substring are sponsored duplicates and are
    /// dropped during scraping.
    pub promo_marker: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            cookie_consent: "button.size-medium:nth-child(1)".to_string(),
            email_field: "#email".to_string(),
            email_continue: ".WelcomeForm_welcomeForm__7jIv2 > button:nth-child(2)".to_string(),
            password_field: "#password".to_string(),
            login_submit: "button.ui-library_b14qiyz3".to_string(),
            fast_apply: ".quick-apply_s1i8itcr > a:nth-child(2)".to_string(),
            normal_apply: ".quick-apply_s47rwpe > div:nth-child(1) > a:nth-child(1)".to_string(),
            apply_continue: "button.ui-library_b14qiyz3:nth-child(1)".to_string(),
            reveal_more: "div.tiles_cobg3mp[tabindex=\"0\"][role=\"button\"]".to_string(),
            offer_link: "a[data-test=\"link-offer\"]".to_string(),
            pagination_max_page: "span[data-test=\"top-pagination-max-page-number\"]"
                .to_string(),
            promo_marker: "boosterAI".to_string(),
        }
    }
}

impl Selectors {
    /// Loads selector overrides from `<data>/config/selectors.json` when the
    /// file exists, otherwise compiled-in defaults.
    pub fn load(paths: &DataPaths) -> Self {
        let path = paths.selectors_file();
        match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(selectors) => {
                    debug!("Loaded selector overrides from {}", path.display());
                    selectors
                }
                Err(e) => {
                    warn!("Ignoring malformed {}: {}", path.display(), e);
                    Selectors::default()
                }
            },
            Err(_) => Selectors::default(),
        }
    }
}

/// Filesystem conventions under the data directory.
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config").join("configs.json")
    }

    pub fn selectors_file(&self) -> PathBuf {
        self.root.join("config").join("selectors.json")
    }

    pub fn cookies_file(&self, username: &str) -> PathBuf {
        self.root
            .join("cookies")
            .join(format!("{username}_pracuj_cookies.json"))
    }

    pub fn cv_path(&self, username: &str) -> PathBuf {
        self.cv_dir().join(format!("{username}.pdf"))
    }

    pub fn cv_dir(&self) -> PathBuf {
        self.root.join("CV")
    }

    /// Creates the conventional directory layout, so the resume drop
    /// location exists before the first run ever saves anything.
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [
            self.root.join("config"),
            self.root.join("cookies"),
            self.cv_dir(),
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Per-user JSON config map keyed by username.
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open(paths: &DataPaths) -> Self {
        Self::new(paths.config_file())
    }

    pub fn load_all(&self) -> BTreeMap<String, SessionConfig> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return BTreeMap::new(),
        };
        match serde_json::from_str(&raw) {
            Ok(configs) => configs,
            Err(e) => {
                warn!("Ignoring malformed config file {}: {}", self.path.display(), e);
                BTreeMap::new()
            }
        }
    }

    pub fn save_for_user(&self, username: &str, config: &SessionConfig) -> Result<()> {
        let mut configs = self.load_all();
        configs.insert(username.to_string(), config.clone());
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&configs)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> SessionConfig {
        SessionConfig {
            email: "me@example.com".to_string(),
            password: "secret".to_string(),
            filtered_job_url: "https://www.pracuj.pl/praca/rust;kw".to_string(),
            username: "main".to_string(),
            apply_with_ai: true,
            headless: true,
            browser: BrowserKind::Chrome,
            model_name: Some("gpt-4o-mini".to_string()),
            base_url: None,
            provider: Some(LlmProvider::OpenAi),
            api_key: Some("sk-test".to_string()),
        }
    }

    #[test]
    fn unknown_provider_name_fails_fast() {
        let err = "Mistral".parse::<LlmProvider>().unwrap_err();
        assert!(matches!(err, ApplierError::UnsupportedProvider(name) if name == "Mistral"));
    }

    #[test]
    fn every_known_provider_name_parses() {
        for provider in LlmProvider::ALL {
            let parsed: LlmProvider = provider.to_string().parse().unwrap();
            assert_eq!(parsed, provider);
        }
    }

    #[test]
    fn session_config_defaults_apply_on_sparse_records() {
        let raw = r#"{
            "email": "me@example.com",
            "password": "secret",
            "filtered_job_url": "https://www.pracuj.pl/praca"
        }"#;
        let config: SessionConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.username, "main");
        assert!(config.apply_with_ai);
        assert!(config.headless);
        assert_eq!(config.browser, BrowserKind::Chrome);
        assert!(config.provider.is_none());
    }

    #[test]
    fn config_store_round_trips_per_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config").join("configs.json"));

        let mut config = sample_config();
        store.save_for_user("main", &config).unwrap();
        config.username = "alt".to_string();
        config.filtered_job_url = "https://www.pracuj.pl/praca?its=it".to_string();
        store.save_for_user("alt", &config).unwrap();

        let all = store.load_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all["main"].filtered_job_url, "https://www.pracuj.pl/praca/rust;kw");
        assert_eq!(all["alt"].filtered_job_url, "https://www.pracuj.pl/praca?its=it");
    }

    #[test]
    fn missing_or_corrupt_config_file_yields_empty_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("configs.json");
        assert!(ConfigStore::new(&path).load_all().is_empty());

        fs::write(&path, "not json").unwrap();
        assert!(ConfigStore::new(&path).load_all().is_empty());
    }

    #[test]
    fn cv_path_follows_username_convention() {
        let paths = DataPaths::new("/tmp/data");
        assert_eq!(
            paths.cv_path("main"),
            PathBuf::from("/tmp/data/CV/main.pdf")
        );
    }

    #[test]
    fn ensure_layout_creates_the_cv_drop_location() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        paths.ensure_layout().unwrap();
        assert!(dir.path().join("CV").is_dir());
        assert!(dir.path().join("config").is_dir());
        assert!(dir.path().join("cookies").is_dir());
    }

    #[test]
    fn default_selectors_carry_promo_marker() {
        let selectors = Selectors::default();
        assert_eq!(selectors.promo_marker, "boosterAI");
        assert!(selectors.offer_link.contains("link-offer"));
    }
}
