//! Text generation for comment replies
//!
//! [`OpenAiGenerator`] talks to an OpenAI-compatible chat completions
//! endpoint. [`MockGenerator`] is available in all builds for integration
//! tests.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::GenerationError;

pub type GenerationResult<T> = std::result::Result<T, GenerationError>;

const MAX_TOKENS: u32 = 500;
const TEMPERATURE: f32 = 0.7;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> GenerationResult<String>;
}

/// Chat-completions client
pub struct OpenAiGenerator {
    client: Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl std::fmt::Debug for OpenAiGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiGenerator")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OpenAiGenerator {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: crate::config::DEFAULT_GENERATION_MODEL.to_string(),
            base_url: crate::config::DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }

    /// Build from the `[generation]` config section
    ///
    /// Fails with `NotConfigured` when neither the config nor `OPENAI_API_KEY`
    /// provides a key.
    pub fn from_config(config: &GenerationConfig) -> GenerationResult<Self> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            GenerationError::NotConfigured(
                "set generation.api_key or OPENAI_API_KEY".to_string(),
            )
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set a custom base URL (proxies, compatible providers, test servers)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate_text(&self, prompt: &str) -> GenerationResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api(format!("{}: {}", status, error_text)));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerationError::Parse("No choices in response".to_string()))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Generator with a canned answer, recording every prompt it receives
#[derive(Clone, Default)]
pub struct MockGenerator {
    response: Option<String>,
    error: Option<GenerationError>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockGenerator {
    pub fn replying(response: &str) -> Self {
        Self {
            response: Some(response.to_string()),
            ..Default::default()
        }
    }

    pub fn failing(error: GenerationError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate_text(&self, prompt: &str) -> GenerationResult<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        if let Some(error) = &self.error {
            return Err(error.clone());
        }

        Ok(self.response.clone().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn generator(base: &str) -> OpenAiGenerator {
        OpenAiGenerator::new(SecretString::from("sk-test".to_string())).with_base_url(base)
    }

    #[tokio::test]
    async fn test_generate_text_sends_expected_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4o-mini",
                "max_tokens": 500,
                "messages": [{"role": "user", "content": "Say hi"}]
            })))
            .with_body(
                json!({"choices": [{"message": {"role": "assistant", "content": "Hi there!"}}]})
                    .to_string(),
            )
            .create_async()
            .await;

        let text = generator(&server.url()).generate_text("Say hi").await.unwrap();
        assert_eq!(text, "Hi there!");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body(r#"{"error":{"message":"Rate limit"}}"#)
            .create_async()
            .await;

        let err = generator(&server.url()).generate_text("x").await.unwrap_err();
        assert!(matches!(err, GenerationError::Api(ref m) if m.contains("Rate limit")));
    }

    #[tokio::test]
    async fn test_empty_choices_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let err = generator(&server.url()).generate_text("x").await.unwrap_err();
        assert!(matches!(err, GenerationError::Parse(_)));
    }

    #[test]
    #[serial_test::serial]
    fn test_from_config_without_key() {
        let config = GenerationConfig {
            api_key: None,
            ..GenerationConfig::default()
        };
        // Only meaningful when the environment does not provide a key
        if std::env::var("OPENAI_API_KEY").is_err() {
            assert!(matches!(
                OpenAiGenerator::from_config(&config),
                Err(GenerationError::NotConfigured(_))
            ));
        }
    }

    #[test]
    fn test_from_config_with_key() {
        let config = GenerationConfig {
            api_key: Some("sk-file".to_string()),
            model: "gpt-4o".to_string(),
            base_url: "http://localhost:1234/v1/".to_string(),
        };
        let generator = OpenAiGenerator::from_config(&config).unwrap();
        assert_eq!(generator.model(), "gpt-4o");
        assert_eq!(generator.base_url, "http://localhost:1234/v1");
    }

    #[tokio::test]
    async fn test_mock_generator_records_prompts() {
        let mock = MockGenerator::replying("Thanks!");
        assert_eq!(mock.generate_text("p1").await.unwrap(), "Thanks!");
        assert_eq!(mock.prompts(), vec!["p1".to_string()]);

        let failing = MockGenerator::failing(GenerationError::Network("down".to_string()));
        assert!(failing.generate_text("p2").await.is_err());
        assert_eq!(failing.prompts().len(), 1);
    }
}
