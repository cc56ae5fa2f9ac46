use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use renoquote_core::config::{LlmConfig, LlmProvider};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// A system instruction plus the user text it applies to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LlmPrompt {
    pub system: String,
    pub user: String,
}

impl LlmPrompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self { system: system.into(), user: user.into() }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &LlmPrompt) -> Result<String>;
}

#[async_trait]
impl<T> LlmClient for Arc<T>
where
    T: LlmClient + ?Sized,
{
    async fn complete(&self, prompt: &LlmPrompt) -> Result<String> {
        (**self).complete(prompt).await
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: ResponseMessage,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completion client over HTTP for the configured provider.
#[derive(Clone, Debug)]
pub struct HttpLlmClient {
    http: reqwest::Client,
    provider: LlmProvider,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        if config.provider == LlmProvider::OpenAi && config.api_key.is_none() {
            bail!("llm.api_key is required for the openai provider");
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build llm http client")?;

        Ok(Self {
            http,
            provider: config.provider,
            endpoint: endpoint_for(config.provider, config.base_url.as_deref()),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn complete_openai(&self, prompt: &LlmPrompt) -> Result<String> {
        let body = OpenAiRequest {
            model: &self.model,
            messages: messages(prompt),
            temperature: 0.0,
        };
        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.context("openai request failed")?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("openai returned {status}: {detail}");
        }

        let parsed: OpenAiResponse =
            response.json().await.context("openai response was not valid json")?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("openai response carried no message content"))
    }

    async fn complete_ollama(&self, prompt: &LlmPrompt) -> Result<String> {
        let body = OllamaRequest {
            model: &self.model,
            messages: messages(prompt),
            stream: false,
            options: OllamaOptions { temperature: 0.0 },
        };

        let response =
            self.http.post(&self.endpoint).json(&body).send().await.context("ollama request failed")?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("ollama returned {status}: {detail}");
        }

        let parsed: OllamaResponse =
            response.json().await.context("ollama response was not valid json")?;
        parsed.message.content.ok_or_else(|| anyhow!("ollama response carried no message content"))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &LlmPrompt) -> Result<String> {
        tracing::debug!(
            event_name = "llm.request",
            provider = self.provider.as_str(),
            model = %self.model,
            "sending completion request"
        );
        match self.provider {
            LlmProvider::OpenAi => self.complete_openai(prompt).await,
            LlmProvider::Ollama => self.complete_ollama(prompt).await,
        }
    }
}

fn messages(prompt: &LlmPrompt) -> Vec<ChatMessage<'_>> {
    vec![
        ChatMessage { role: "system", content: &prompt.system },
        ChatMessage { role: "user", content: &prompt.user },
    ]
}

pub fn endpoint_for(provider: LlmProvider, base_url: Option<&str>) -> String {
    let base = |default: &'static str| {
        base_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    };
    match provider {
        LlmProvider::OpenAi => format!("{}/chat/completions", base(OPENAI_BASE_URL)),
        LlmProvider::Ollama => format!("{}/api/chat", base(OLLAMA_BASE_URL)),
    }
}

#[cfg(test)]
mod tests {
    use renoquote_core::config::{LlmConfig, LlmProvider};
    use secrecy::SecretString;

    use super::{endpoint_for, messages, HttpLlmClient, LlmPrompt};

    fn config(provider: LlmProvider) -> LlmConfig {
        LlmConfig {
            enabled: true,
            provider,
            api_key: None,
            base_url: None,
            model: "test-model".to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn endpoints_follow_provider_conventions() {
        assert_eq!(
            endpoint_for(LlmProvider::OpenAi, None),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            endpoint_for(LlmProvider::OpenAi, Some("http://proxy.local/v1/")),
            "http://proxy.local/v1/chat/completions"
        );
        assert_eq!(endpoint_for(LlmProvider::Ollama, None), "http://localhost:11434/api/chat");
        assert_eq!(
            endpoint_for(LlmProvider::Ollama, Some("  ")),
            "http://localhost:11434/api/chat"
        );
    }

    #[test]
    fn openai_client_requires_api_key() {
        let error = HttpLlmClient::from_config(&config(LlmProvider::OpenAi))
            .expect_err("missing key should be rejected");
        assert!(error.to_string().contains("api_key"));

        let mut with_key = config(LlmProvider::OpenAi);
        with_key.api_key = Some(SecretString::from("sk-test".to_string()));
        let client = HttpLlmClient::from_config(&with_key).expect("client with key");
        assert_eq!(client.provider(), LlmProvider::OpenAi);
    }

    #[test]
    fn ollama_client_builds_without_key() {
        let client = HttpLlmClient::from_config(&config(LlmProvider::Ollama)).expect("client");
        assert_eq!(client.endpoint(), "http://localhost:11434/api/chat");
    }

    #[test]
    fn prompt_becomes_system_then_user_message() {
        let prompt = LlmPrompt::new("be terse", "hello");
        let messages = messages(&prompt);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, "be terse");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content, "hello");
    }
}
