// file: src/database/mod.rs
// description: vector store abstraction and backend selection
// reference: internal module structure

pub mod embeddings;
pub mod lance;
pub mod schema;
pub mod weaviate;

pub use embeddings::EmbeddingClient;
pub use lance::LanceDbStore;
pub use schema::SchemaManager;
pub use weaviate::WeaviateStore;

use crate::config::{Config, VectorBackend};
use crate::error::Result;
use crate::models::{DisasterRecord, Document};
use async_trait::async_trait;
use std::sync::Arc;

/// A named document collection supporting top-k semantic search.
///
/// Handles are created once per process and shared between concurrent
/// queries, so implementations must be safe to call from many tasks.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn name(&self) -> &'static str;

    fn collection(&self) -> &str;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<()>;

    /// Creates the collection when missing. Returns `true` if it was created.
    async fn ensure_collection(&self) -> Result<bool>;

    async fn insert(&self, record: &DisasterRecord) -> Result<()>;

    /// Up to `limit` documents ordered by descending similarity to `query`.
    async fn near_text(&self, query: &str, limit: usize) -> Result<Vec<Document>>;
}

/// Opens the configured backend.
pub async fn connect_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
    match config.vector_store.backend {
        VectorBackend::Weaviate => Ok(Arc::new(WeaviateStore::new(
            &config.vector_store,
            config.model_api_key()?,
        )?)),
        VectorBackend::Lancedb => {
            let embeddings = EmbeddingClient::new(&config.model)?;
            Ok(Arc::new(
                LanceDbStore::new(&config.vector_store, embeddings).await?,
            ))
        }
    }
}
