// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns

//! Retrieval-augmented disaster relief assistant: resolves the caller's coarse
//! location, retrieves relief documents from a vector store, and asks a
//! language model for a grounded, cited answer.

pub mod config;
pub mod database;
pub mod error;
pub mod generation;
pub mod geo;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod retrieval;
pub mod utils;

pub use self::config::{
    Config, IngestConfig, LocationConfig, ModelConfig, PipelineConfig, VectorBackend,
    VectorStoreConfig,
};
pub use database::{
    EmbeddingClient, LanceDbStore, SchemaManager, VectorStore, WeaviateStore, connect_store,
};
pub use error::{PipelineError, Result};
pub use generation::{OpenAiChatClient, PromptBuilder, PromptInput, ResponseGenerator};
pub use geo::{IpInfoResolver, LocationResolver, NoopLocationResolver};
pub use ingest::{IngestStats, Ingestor, WebScraper};
pub use models::{DisasterRecord, Document, Location, LocationLookup};
pub use pipeline::{Answer, PipelineStage, RagPipeline};
pub use retrieval::{ContextRetriever, QueryEnricher, RetrievalResult};
pub use utils::{HealthCheck, HealthReport, HealthStatus, OperationTimer, Validator};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let config = Config::default_config();
        assert_eq!(config.vector_store.collection, "DisasterInfo");
        assert_eq!(QueryEnricher::enrich("water", None), "water");
    }
}
