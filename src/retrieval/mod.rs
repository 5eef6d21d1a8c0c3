// file: src/retrieval/mod.rs
// description: query enrichment and semantic context retrieval
// reference: internal module structure

pub mod enricher;
pub mod retriever;

pub use enricher::QueryEnricher;
pub use retriever::{ContextRetriever, RetrievalResult};
