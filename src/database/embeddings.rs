// file: src/database/embeddings.rs
// description: OpenAI-compatible embeddings client used by the local LanceDB backend
// reference: https://platform.openai.com/docs/api-reference/embeddings

use crate::config::ModelConfig;
use crate::error::{PipelineError, Result};
use crate::utils::Validator;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: Vec<&'a str>,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Clone)]
pub struct EmbeddingClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl EmbeddingClient {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| PipelineError::Config("model api key is not set".to_string()))?;

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| PipelineError::Config(format!("Failed to build embeddings client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.embedding_model.clone(),
        })
    }

    /// Embeds one text. Failures surface as retrieval errors since an
    /// unembeddable query cannot be searched.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            input: vec![text],
            model: &self.model,
        };

        debug!("Requesting embedding for {} chars", text.len());

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::Retrieval(format!("Embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(status_error(status, &error_text));
        }

        let body: EmbeddingResponse = response.json().await.map_err(|e| {
            PipelineError::Retrieval(format!("Failed to parse embedding response: {}", e))
        })?;

        first_embedding(body)
    }
}

fn status_error(status: StatusCode, error_text: &str) -> PipelineError {
    PipelineError::Retrieval(format!(
        "Embedding request failed with status {}: {}",
        status,
        Validator::normalize_whitespace(error_text)
    ))
}

fn first_embedding(body: EmbeddingResponse) -> Result<Vec<f32>> {
    match body.data.into_iter().next() {
        Some(data) if !data.embedding.is_empty() => {
            debug!("Received embedding of dimension {}", data.embedding.len());
            Ok(data.embedding)
        }
        _ => Err(PipelineError::Retrieval(
            "No embedding data returned".to_string(),
        )),
    }
}
