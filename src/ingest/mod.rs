// file: src/ingest/mod.rs
// description: populates the document collection from relief web pages
// reference: internal module structure

pub mod ingestor;
pub mod web;

pub use ingestor::{IngestStats, Ingestor};
pub use web::WebScraper;
