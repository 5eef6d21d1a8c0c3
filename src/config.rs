// file: src/config.rs
// description: application configuration management with toml and environment support
// reference: https://docs.rs/config

use crate::error::{PipelineError, Result};
use crate::utils::Validator;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_COLLECTION: &str = "DisasterInfo";
pub const DEFAULT_RESULT_LIMIT: usize = 3;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    Weaviate,
    Lancedb,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub backend: VectorBackend,
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub collection: String,
    pub result_limit: usize,
    pub timeout_secs: u64,
    pub lancedb_uri: String,
    pub embedding_dim: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LocationConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub timeout_secs: u64,
    pub max_concurrent_queries: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestConfig {
    pub urls: Vec<String>,
    pub delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-4".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            temperature: 0.7,
            timeout_secs: 60,
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Weaviate,
            url: None,
            api_key: None,
            collection: DEFAULT_COLLECTION.to_string(),
            result_limit: DEFAULT_RESULT_LIMIT,
            timeout_secs: 15,
            lancedb_uri: "data/lancedb".to_string(),
            embedding_dim: 1536,
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://ipinfo.io/json".to_string(),
            timeout_secs: 3,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            max_concurrent_queries: 4,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            urls: vec!["https://www.ca.gov/lafires/".to_string()],
            delay_ms: 1000,
            timeout_secs: 30,
        }
    }
}

impl ModelConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl VectorStoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder
                .add_source(config::File::from(Path::new("config/default.toml")).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("RELIEF_RAG")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let mut config: Config = settings
            .try_deserialize()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        config.apply_legacy_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self::default()
    }

    /// Fills unset credentials from the plain `OPENAI_API_KEY`,
    /// `WEAVIATE_CLUSTER_URL` and `WEAVIATE_API_KEY` variables.
    fn apply_legacy_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.model.api_key.is_none() {
            self.model.api_key = non_empty("OPENAI_API_KEY");
        }
        if self.vector_store.url.is_none() {
            self.vector_store.url = non_empty("WEAVIATE_CLUSTER_URL");
        }
        if self.vector_store.api_key.is_none() {
            self.vector_store.api_key = non_empty("WEAVIATE_API_KEY");
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
            return Err(PipelineError::Config(
                "model api key is not set (OPENAI_API_KEY or RELIEF_RAG__MODEL__API_KEY)"
                    .to_string(),
            ));
        }

        Validator::validate_url(&self.model.base_url)
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        if self.vector_store.backend == VectorBackend::Weaviate {
            let url = self.vector_store.url.as_deref().ok_or_else(|| {
                PipelineError::Config(
                    "vector store url is not set (WEAVIATE_CLUSTER_URL)".to_string(),
                )
            })?;
            Validator::validate_url(url).map_err(|e| PipelineError::Config(e.to_string()))?;

            if self
                .vector_store
                .api_key
                .as_deref()
                .is_none_or(|k| k.trim().is_empty())
            {
                return Err(PipelineError::Config(
                    "vector store api key is not set (WEAVIATE_API_KEY)".to_string(),
                ));
            }
        }

        if self.vector_store.collection.trim().is_empty() {
            return Err(PipelineError::Config(
                "collection name must not be empty".to_string(),
            ));
        }

        if self.vector_store.result_limit == 0 {
            return Err(PipelineError::Config(
                "result_limit must be greater than 0".to_string(),
            ));
        }

        if self.model.timeout_secs == 0
            || self.vector_store.timeout_secs == 0
            || self.location.timeout_secs == 0
            || self.pipeline.timeout_secs == 0
        {
            return Err(PipelineError::Config(
                "timeouts must be greater than 0".to_string(),
            ));
        }

        if self.vector_store.backend == VectorBackend::Lancedb && self.vector_store.embedding_dim == 0
        {
            return Err(PipelineError::Config(
                "embedding_dim must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.max_concurrent_queries == 0 {
            return Err(PipelineError::Config(
                "max_concurrent_queries must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// The model key, only valid after [`Config::validate`] succeeded.
    pub fn model_api_key(&self) -> Result<&str> {
        self.model
            .api_key
            .as_deref()
            .ok_or_else(|| PipelineError::Config("model api key is not set".to_string()))
    }
}
