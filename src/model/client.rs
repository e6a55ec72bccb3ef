//! Model client for AI inference using OpenAI-compatible API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

use super::traits::{PlanningModel, VisionModel};
use crate::adb::ScreenCapture;

/// Default number of retry attempts for failed requests.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay between retry attempts in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 2;

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Model client errors.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    #[error("Failed to parse response: {0}")]
    ParseError(String),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Max retries exceeded after {0} attempts: {1}")]
    MaxRetriesExceeded(u32, String),
}

impl ModelError {
    /// Whether the request hit its deadline.
    pub fn is_timeout(&self) -> bool {
        match self {
            ModelError::Timeout(_) => true,
            ModelError::MaxRetriesExceeded(_, last) => last.starts_with("Request timed out"),
            _ => false,
        }
    }
}

/// Configuration for the AI model.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub base_url: String,
    pub api_key: String,
    pub model_name: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Ask the server for a JSON object response.
    pub json_response: bool,
    /// Maximum number of retry attempts for failed requests.
    pub max_retries: u32,
    /// Delay between retry attempts in seconds.
    pub retry_delay_secs: u64,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            api_key: String::new(),
            model_name: "gemini-2.5-flash".to_string(),
            max_tokens: 4096,
            temperature: 0.0,
            json_response: true,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ModelConfig {
    /// Create a new ModelConfig with custom base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Create a new ModelConfig with custom API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Create a new ModelConfig with custom model name.
    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    /// Set the maximum number of retry attempts for failed requests.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay between retry attempts in seconds.
    pub fn with_retry_delay(mut self, delay_secs: u64) -> Self {
        self.retry_delay_secs = delay_secs;
        self
    }

    /// Set the per-request timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// OpenAI API response structures.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

/// Client for OpenAI-compatible vision-language and chat models.
pub struct ModelClient {
    config: ModelConfig,
    client: Client,
}

impl ModelClient {
    /// Create a new ModelClient with the given configuration.
    pub fn new(config: ModelConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });
        Self { config, client }
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Send a chat request and return the text content of the first choice.
    ///
    /// # Arguments
    /// * `messages` - List of message dictionaries in OpenAI format.
    pub async fn request(&self, messages: &[Value]) -> Result<String, ModelError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let mut body = json!({
            "messages": messages,
            "model": self.config.model_name,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        });

        if self.config.json_response {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let mut last_error: Option<ModelError> = None;
        let max_attempts = self.max_attempts();

        for attempt in 1..=max_attempts {
            match self.send_request(&url, &body).await {
                Ok(content) => return Ok(content),
                Err(e) => {
                    if !Self::is_retryable_error(&e) {
                        return Err(e);
                    }
                    if attempt < max_attempts {
                        tracing::warn!(
                            "Model request failed (attempt {}/{}): {}; retrying in {}s",
                            attempt,
                            max_attempts,
                            e,
                            self.config.retry_delay_secs
                        );
                        sleep(Duration::from_secs(self.config.retry_delay_secs)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(ModelError::MaxRetriesExceeded(
            max_attempts,
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
        ))
    }

    /// Initial attempt plus retries.
    fn max_attempts(&self) -> u32 {
        self.config.max_retries.saturating_add(1)
    }

    /// Check if an error is retryable (network errors, timeouts, etc.)
    fn is_retryable_error(error: &ModelError) -> bool {
        match error {
            ModelError::RequestFailed(_) | ModelError::Timeout(_) => true,
            ModelError::ApiError(msg) => {
                // Retry on server errors (5xx) or rate limits (429)
                let lower = msg.to_lowercase();
                ["500", "502", "503", "504", "429"]
                    .iter()
                    .any(|code| msg.starts_with(code))
                    || lower.contains("timeout")
                    || lower.contains("rate limit")
            }
            ModelError::ParseError(_) | ModelError::MaxRetriesExceeded(_, _) => false,
        }
    }

    /// Send a single request to the API.
    async fn send_request(&self, url: &str, body: &Value) -> Result<String, ModelError> {
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| self.classify_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ModelError::ApiError(format!(
                "{} {}",
                status.as_u16(),
                error_text.trim()
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ModelError::ParseError(e.to_string()))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ModelError::ParseError("No content in response".to_string()))?;

        Ok(strip_reasoning(&content))
    }

    fn classify_transport_error(&self, error: reqwest::Error) -> ModelError {
        if error.is_timeout() {
            ModelError::Timeout(self.config.timeout_secs)
        } else {
            ModelError::RequestFailed(error)
        }
    }
}

#[async_trait]
impl VisionModel for ModelClient {
    async fn infer(&self, image: &ScreenCapture, prompt: &str) -> Result<String, ModelError> {
        tracing::debug!(model = %self.config.model_name, "vision request: {}", prompt);
        let message = MessageBuilder::create_user_message(prompt, Some(&image.to_base64()));
        self.request(&[message]).await
    }
}

#[async_trait]
impl PlanningModel for ModelClient {
    async fn infer(&self, prompt: &str) -> Result<String, ModelError> {
        tracing::debug!(model = %self.config.model_name, "planning request: {}", prompt);
        let message = MessageBuilder::create_user_message(prompt, None);
        self.request(&[message]).await
    }
}

/// Drop a leading `<think>...</think>` block some reasoning models emit.
fn strip_reasoning(content: &str) -> String {
    match content.find("</think>") {
        Some(end) if content.trim_start().starts_with("<think>") => {
            content[end + "</think>".len()..].trim().to_string()
        }
        _ => content.trim().to_string(),
    }
}

/// Helper for building conversation messages.
pub struct MessageBuilder;

impl MessageBuilder {
    /// Create a user message with optional image.
    ///
    /// # Arguments
    /// * `text` - Text content.
    /// * `image_base64` - Optional base64-encoded PNG.
    pub fn create_user_message(text: &str, image_base64: Option<&str>) -> Value {
        let mut content = Vec::new();

        if let Some(img_data) = image_base64 {
            content.push(json!({
                "type": "image_url",
                "image_url": {
                    "url": format!("data:image/png;base64,{}", img_data)
                }
            }));
        }

        content.push(json!({
            "type": "text",
            "text": text
        }));

        json!({
            "role": "user",
            "content": content
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn completion(content: &str) -> String {
        json!({ "choices": [{ "message": { "content": content } }] }).to_string()
    }

    fn client_for(server: &mockito::Server, retries: u32) -> ModelClient {
        ModelClient::new(
            ModelConfig::default()
                .with_base_url(server.url())
                .with_api_key("test-key")
                .with_model_name("vision-test")
                .with_max_retries(retries)
                .with_retry_delay(0),
        )
    }

    #[test]
    fn test_model_config_default() {
        let config = ModelConfig::default();
        assert_eq!(config.model_name, "gemini-2.5-flash");
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert!(config.json_response);
    }

    #[test]
    fn test_max_attempts_saturates() {
        let client = ModelClient::new(ModelConfig::default().with_max_retries(u32::MAX));
        assert_eq!(client.max_attempts(), u32::MAX);

        let client = ModelClient::new(ModelConfig::default().with_max_retries(0));
        assert_eq!(client.max_attempts(), 1);
    }

    #[test]
    fn test_strip_reasoning() {
        assert_eq!(
            strip_reasoning("<think>the + is top right</think>\n{\"elements\": []}"),
            "{\"elements\": []}"
        );
        assert_eq!(strip_reasoning("  {\"steps\": []} "), "{\"steps\": []}");
    }

    #[test]
    fn test_message_builder() {
        let user_msg = MessageBuilder::create_user_message("Hello", None);
        assert_eq!(user_msg["role"], "user");
        assert_eq!(user_msg["content"][0]["type"], "text");

        let with_image = MessageBuilder::create_user_message("Look at this", Some("base64data"));
        assert_eq!(with_image["content"][0]["type"], "image_url");
        assert_eq!(with_image["content"][1]["text"], "Look at this");
    }

    #[tokio::test]
    async fn test_planning_request_returns_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::PartialJson(json!({
                "model": "vision-test",
                "response_format": { "type": "json_object" }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion("{\"steps\": []}"))
            .create_async()
            .await;

        let client = client_for(&server, 0);
        let content = PlanningModel::infer(&client, "plan it").await.unwrap();

        assert_eq!(content, "{\"steps\": []}");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .with_body("overloaded")
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server, 1);
        let err = PlanningModel::infer(&client, "plan it").await.unwrap_err();

        assert!(matches!(err, ModelError::MaxRetriesExceeded(2, _)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body("bad key")
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server, 3);
        let err = PlanningModel::infer(&client, "plan it").await.unwrap_err();

        assert!(matches!(err, ModelError::ApiError(ref msg) if msg.starts_with("401")));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_content_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let client = client_for(&server, 0);
        let err = PlanningModel::infer(&client, "plan it").await.unwrap_err();
        assert!(matches!(err, ModelError::ParseError(_)));
    }
}
