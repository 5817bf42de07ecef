use crate::config::{LlmProvider, SessionConfig};
use crate::errors::{ApplierError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const GOOGLE_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const AZURE_API_VERSION: &str = "2024-02-15-preview";
const MAX_TOKENS: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Chat-completion client dispatching over the configured provider. The
/// provider tag itself is validated when the config record is parsed; this
/// constructor only checks the fields the chosen provider needs.
pub struct LlmClient {
    provider: LlmProvider,
    model: String,
    api_key: String,
    base_url: Option<String>,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        let provider = config.provider.ok_or_else(|| {
            ApplierError::Configuration("AI apply enabled but no LLM provider set".to_string())
        })?;
        let model = config.model_name.clone().ok_or_else(|| {
            ApplierError::Configuration("AI apply enabled but no model name set".to_string())
        })?;

        if provider.requires_base_url() && config.base_url.is_none() {
            return Err(ApplierError::Configuration(format!(
                "provider {provider} requires a base URL"
            )));
        }

        let api_key = config
            .api_key
            .clone()
            .or_else(|| env_key(provider))
            .unwrap_or_default();
        if api_key.is_empty() && provider != LlmProvider::Ollama {
            return Err(ApplierError::Configuration(format!(
                "no API key configured for provider {provider}"
            )));
        }

        Ok(Self {
            provider,
            model,
            api_key,
            base_url: config.base_url.clone(),
            client: reqwest::Client::new(),
        })
    }

    /// One non-streaming completion over the transcript.
    pub async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
        debug!(provider = %self.provider, model = %self.model, "LLM completion request");
        match self.provider {
            LlmProvider::Anthropic => self.complete_anthropic(system, messages).await,
            LlmProvider::Google => self.complete_google(system, messages).await,
            _ => self.complete_openai_style(system, messages).await,
        }
    }

    fn openai_endpoint(&self) -> String {
        match self.provider {
            LlmProvider::OpenAi => OPENAI_API_URL.to_string(),
            LlmProvider::Groq => GROQ_API_URL.to_string(),
            LlmProvider::Ollama => {
                let base = self
                    .base_url
                    .clone()
                    .unwrap_or_else(|| OLLAMA_DEFAULT_URL.to_string());
                format!("{}/v1/chat/completions", base.trim_end_matches('/'))
            }
            LlmProvider::AzureOpenAi => {
                let base = self.base_url.as_deref().unwrap_or_default();
                format!(
                    "{}/chat/completions?api-version={AZURE_API_VERSION}",
                    base.trim_end_matches('/')
                )
            }
            // OpenAiCompatible and any future chat-completions endpoint
            _ => {
                let base = self.base_url.as_deref().unwrap_or_default();
                format!("{}/chat/completions", base.trim_end_matches('/'))
            }
        }
    }

    async fn complete_openai_style(
        &self,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<String> {
        let mut wire: Vec<Value> = vec![json!({"role": "system", "content": system})];
        wire.extend(
            messages
                .iter()
                .map(|m| json!({"role": m.role, "content": m.content})),
        );
        let body = json!({
            "model": self.model,
            "messages": wire,
            "max_tokens": MAX_TOKENS,
        });

        let mut request = self.client.post(self.openai_endpoint()).json(&body);
        request = if self.provider == LlmProvider::AzureOpenAi {
            request.header("api-key", &self.api_key)
        } else {
            request.header("Authorization", format!("Bearer {}", self.api_key))
        };

        let value = send(request).await?;
        value["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ApplierError::LlmRequest("no completion content in response".into()))
    }

    async fn complete_anthropic(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
        let wire: Vec<Value> = messages
            .iter()
            .map(|m| json!({"role": m.role, "content": m.content}))
            .collect();
        let body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "system": system,
            "messages": wire,
        });

        let request = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);

        let value = send(request).await?;
        value["content"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ApplierError::LlmRequest("no completion content in response".into()))
    }

    async fn complete_google(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
        let contents: Vec<Value> = messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                json!({"role": role, "parts": [{"text": m.content}]})
            })
            .collect();
        let body = json!({
            "systemInstruction": {"parts": [{"text": system}]},
            "contents": contents,
        });

        let url = format!(
            "{GOOGLE_API_URL}/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let value = send(self.client.post(url).json(&body)).await?;
        value["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ApplierError::LlmRequest("no completion content in response".into()))
    }
}

async fn send(request: reqwest::RequestBuilder) -> Result<Value> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(ApplierError::LlmRequest(format!(
            "provider returned {status}: {text}"
        )));
    }
    Ok(response.json().await?)
}

fn env_key(provider: LlmProvider) -> Option<String> {
    let var = match provider {
        LlmProvider::OpenAi | LlmProvider::OpenAiCompatible => "OPENAI_API_KEY",
        LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
        LlmProvider::AzureOpenAi => "AZURE_OPENAI_API_KEY",
        LlmProvider::Google => "GEMINI_API_KEY",
        LlmProvider::Groq => "GROQ_API_KEY",
        LlmProvider::Ollama => return None,
    };
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BrowserKind;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn compatible_config(base_url: &str) -> SessionConfig {
        SessionConfig {
            email: String::new(),
            password: String::new(),
            filtered_job_url: String::new(),
            username: "main".to_string(),
            apply_with_ai: true,
            headless: true,
            browser: BrowserKind::Chrome,
            model_name: Some("test-model".to_string()),
            base_url: Some(base_url.to_string()),
            provider: Some(LlmProvider::OpenAiCompatible),
            api_key: Some("test-key".to_string()),
        }
    }

    #[test]
    fn missing_provider_fails_before_any_browser_work() {
        let mut config = compatible_config("http://localhost");
        config.provider = None;
        assert!(LlmClient::from_config(&config).is_err());
    }

    #[test]
    fn compatible_provider_requires_base_url() {
        let mut config = compatible_config("http://localhost");
        config.base_url = None;
        assert!(LlmClient::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn openai_style_completion_round_trips() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(json!({"model": "test-model"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"action\":\"done\"}"}}]
            })))
            .mount(&server)
            .await;

        let client = LlmClient::from_config(&compatible_config(&server.uri())).unwrap();
        let reply = client
            .complete("system prompt", &[ChatMessage::user("hello")])
            .await
            .unwrap();
        assert_eq!(reply, "{\"action\":\"done\"}");
    }

    #[tokio::test]
    async fn provider_error_status_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client = LlmClient::from_config(&compatible_config(&server.uri())).unwrap();
        let err = client
            .complete("system", &[ChatMessage::user("hello")])
            .await
            .unwrap_err();
        assert!(matches!(err, ApplierError::LlmRequest(msg) if msg.contains("429")));
    }
}
