// file: src/database/weaviate.rs
// description: Weaviate REST and GraphQL client for the DisasterInfo collection
// reference: https://weaviate.io/developers/weaviate/api/graphql/search-operators#neartext

use crate::config::VectorStoreConfig;
use crate::database::VectorStore;
use crate::database::schema::{RETRIEVED_PROPERTIES, SchemaManager};
use crate::error::{PipelineError, Result};
use crate::models::{DisasterRecord, Document};
use crate::utils::Validator;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<GetData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GetData {
    #[serde(rename = "Get")]
    get: Option<HashMap<String, Option<Vec<RawDocument>>>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    title: Option<String>,
    content: Option<String>,
    source: Option<String>,
    url: Option<String>,
}

pub struct WeaviateStore {
    client: Client,
    base_url: String,
    collection: String,
}

impl WeaviateStore {
    /// `model_api_key` is forwarded so the server-side vectorizer can embed queries.
    pub fn new(config: &VectorStoreConfig, model_api_key: &str) -> Result<Self> {
        let base_url = config
            .url
            .as_deref()
            .ok_or_else(|| PipelineError::Config("vector store url is not set".to_string()))?
            .trim_end_matches('/')
            .to_string();
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| PipelineError::Config("vector store api key is not set".to_string()))?;

        if !SchemaManager::is_valid_collection_name(&config.collection) {
            return Err(PipelineError::Config(format!(
                "invalid collection name: {}",
                config.collection
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", api_key))?);
        headers.insert("X-OpenAI-Api-Key", header_value(model_api_key)?);

        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| PipelineError::Config(format!("Failed to build Weaviate client: {}", e)))?;

        info!("Using Weaviate collection {} at {}", config.collection, base_url);

        Ok(Self {
            client,
            base_url,
            collection: config.collection.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path)
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| PipelineError::Config("credential contains invalid characters".to_string()))
}

/// Renders the `Get` query. The concept is embedded as a JSON string literal,
/// which is also a valid GraphQL string.
fn near_text_query(collection: &str, concept: &str, limit: usize) -> Result<String> {
    let concept = serde_json::to_string(concept)?;
    Ok(format!(
        "{{ Get {{ {}(nearText: {{ concepts: [{}] }}, limit: {}) {{ {} }} }} }}",
        collection,
        concept,
        limit,
        RETRIEVED_PROPERTIES.join(" ")
    ))
}

/// Weaviate error bodies are often pretty-printed JSON; keep them on one line.
fn status_message(action: &str, status: StatusCode, error_text: &str) -> String {
    format!(
        "{} failed with status {}: {}",
        action,
        status,
        Validator::normalize_whitespace(error_text)
    )
}

fn parse_near_text_response(
    body: GraphQlResponse,
    collection: &str,
    limit: usize,
) -> Result<Vec<Document>> {
    if !body.errors.is_empty() {
        let messages: Vec<String> = body.errors.into_iter().map(|e| e.message).collect();
        return Err(PipelineError::Retrieval(format!(
            "Weaviate query failed: {}",
            messages.join("; ")
        )));
    }

    let mut get = body
        .data
        .and_then(|data| data.get)
        .ok_or_else(|| PipelineError::Retrieval("Weaviate response has no data".to_string()))?;

    let raw = get.remove(collection).ok_or_else(|| {
        PipelineError::Retrieval(format!("Weaviate response is missing {}", collection))
    })?;

    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .take(limit)
        .map(|doc| Document::from_optional(doc.title, doc.content, doc.source, doc.url))
        .collect())
}

#[async_trait]
impl VectorStore for WeaviateStore {
    fn name(&self) -> &'static str {
        "weaviate"
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    async fn ping(&self) -> Result<()> {
        let response = self
            .client
            .get(self.endpoint(".well-known/ready"))
            .send()
            .await
            .map_err(|e| PipelineError::Retrieval(format!("Weaviate unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(PipelineError::Retrieval(format!(
                "Weaviate not ready: {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn ensure_collection(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.endpoint(&format!("schema/{}", self.collection)))
            .send()
            .await
            .map_err(|e| PipelineError::Ingestion(format!("Failed to read schema: {}", e)))?;

        match response.status() {
            status if status.is_success() => {
                info!("The {} collection already exists", self.collection);
                return Ok(false);
            }
            StatusCode::NOT_FOUND => {}
            status => {
                return Err(PipelineError::Ingestion(format!(
                    "Schema lookup failed with status {}",
                    status
                )));
            }
        }

        let response = self
            .client
            .post(self.endpoint("schema"))
            .json(&SchemaManager::weaviate_class(&self.collection))
            .send()
            .await
            .map_err(|e| PipelineError::Ingestion(format!("Failed to create schema: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if error_text.contains("already exists") {
                return Ok(false);
            }
            return Err(PipelineError::Ingestion(status_message(
                "Schema creation",
                status,
                &error_text,
            )));
        }

        info!("Created {} collection", self.collection);
        Ok(true)
    }

    async fn insert(&self, record: &DisasterRecord) -> Result<()> {
        let body = json!({
            "class": self.collection,
            "properties": record,
        });

        let response = self
            .client
            .post(self.endpoint("objects"))
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Ingestion(format!("Failed to insert object: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::Ingestion(status_message(
                "Insert",
                status,
                &error_text,
            )));
        }

        debug!("Inserted {} into {}", record.url, self.collection);
        Ok(())
    }

    async fn near_text(&self, query: &str, limit: usize) -> Result<Vec<Document>> {
        let graphql = near_text_query(&self.collection, query, limit)?;
        debug!("Weaviate nearText query with limit {}", limit);

        let response = self
            .client
            .post(self.endpoint("graphql"))
            .json(&json!({ "query": graphql }))
            .send()
            .await
            .map_err(|e| PipelineError::Retrieval(format!("Weaviate request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PipelineError::Retrieval(status_message(
                "nearText query",
                status,
                &error_text,
            )));
        }

        let body: GraphQlResponse = response.json().await.map_err(|e| {
            PipelineError::Retrieval(format!("Failed to parse Weaviate response: {}", e))
        })?;

        parse_near_text_response(body, &self.collection, limit)
    }
}
