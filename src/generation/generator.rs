// file: src/generation/generator.rs
// description: chat completion client returning the first completion verbatim
// reference: https://platform.openai.com/docs/api-reference/chat

use crate::config::ModelConfig;
use crate::error::{PipelineError, Result};
use crate::utils::Validator;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Turns a rendered prompt into a single response. No retries.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    fn model(&self) -> &str;

    /// Checks that the endpoint accepts our credentials.
    async fn ping(&self) -> Result<()>;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Clone)]
pub struct OpenAiChatClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiChatClient {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| PipelineError::Config("model api key is not set".to_string()))?;

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| PipelineError::Config(format!("Failed to build model client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.chat_model.clone(),
            temperature: config.temperature,
        })
    }
}

fn first_completion(body: ChatResponse) -> Result<String> {
    body.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| PipelineError::Generation("model returned no completion".to_string()))
}

fn status_error(status: StatusCode, error_text: &str) -> PipelineError {
    let error_text = Validator::normalize_whitespace(error_text);
    if status == StatusCode::TOO_MANY_REQUESTS {
        PipelineError::Generation(format!("rate limited by model endpoint: {}", error_text))
    } else {
        PipelineError::Generation(format!(
            "model endpoint returned status {}: {}",
            status, error_text
        ))
    }
}

#[async_trait]
impl ResponseGenerator for OpenAiChatClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn ping(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| PipelineError::Generation(format!("model endpoint unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(status_error(response.status(), ""));
        }
        Ok(())
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        debug!(
            "Requesting completion from {} for {} prompt chars",
            self.model,
            prompt.len()
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::Generation(format!("model request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(status_error(status, &error_text));
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            PipelineError::Generation(format!("Failed to parse model response: {}", e))
        })?;

        first_completion(body)
    }
}
