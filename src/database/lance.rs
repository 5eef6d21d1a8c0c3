// file: src/database/lance.rs
// description: local LanceDB vector store with client-side embeddings
// reference: https://docs.rs/lancedb

use crate::config::VectorStoreConfig;
use crate::database::schema::{RETRIEVED_PROPERTIES, SchemaManager};
use crate::database::{EmbeddingClient, VectorStore};
use crate::error::{PipelineError, Result};
use crate::models::{DisasterRecord, Document};
use arrow_array::{Array, ArrayRef, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use arrow_schema::Schema;
use async_trait::async_trait;
use futures::StreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, Table, connect};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct LanceDbStore {
    connection: Connection,
    table_name: String,
    embedding_dim: usize,
    embeddings: EmbeddingClient,
}

impl LanceDbStore {
    pub async fn new(config: &VectorStoreConfig, embeddings: EmbeddingClient) -> Result<Self> {
        info!("Connecting to LanceDB at {}", config.lancedb_uri);

        let connection = connect(&config.lancedb_uri)
            .execute()
            .await
            .map_err(|e| PipelineError::Config(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self {
            connection,
            table_name: config.collection.clone(),
            embedding_dim: config.embedding_dim,
            embeddings,
        })
    }

    async fn table_exists(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| PipelineError::Retrieval(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.iter().any(|name| name == &self.table_name))
    }

    async fn open_table(&self) -> Result<Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| {
                PipelineError::Retrieval(format!("Failed to open table {}: {}", self.table_name, e))
            })
    }

    fn schema(&self) -> Arc<Schema> {
        SchemaManager::arrow_schema(self.embedding_dim)
    }

    fn check_dimension(&self, embedding: &[f32]) -> std::result::Result<(), String> {
        if embedding.len() != self.embedding_dim {
            return Err(format!(
                "embedding has dimension {}, table expects {}",
                embedding.len(),
                self.embedding_dim
            ));
        }
        Ok(())
    }
}

/// Builds a single-row batch matching [`SchemaManager::arrow_schema`].
fn record_batch(
    schema: Arc<Schema>,
    record: &DisasterRecord,
    embedding: Vec<f32>,
) -> Result<RecordBatch> {
    let dim = embedding.len() as i32;
    let text = |value: &str| -> ArrayRef { Arc::new(StringArray::from(vec![value.to_string()])) };

    let embedding_list = FixedSizeListArray::try_new(
        Arc::new(arrow_schema::Field::new("item", arrow_schema::DataType::Float32, true)),
        dim,
        Arc::new(Float32Array::from(embedding)),
        None,
    )
    .map_err(|e| PipelineError::Ingestion(format!("Failed to create embedding array: {}", e)))?;

    RecordBatch::try_new(
        schema,
        vec![
            text(&record.content_hash()),
            text(&record.url),
            text(&record.title),
            text(&record.content),
            text(&record.source),
            text(&record.timestamp),
            Arc::new(embedding_list),
        ],
    )
    .map_err(|e| PipelineError::Ingestion(format!("Failed to create record batch: {}", e)))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| PipelineError::Retrieval(format!("Missing '{}' column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| PipelineError::Retrieval(format!("Invalid '{}' column type", name)))
}

/// Converts result batches into documents; null cells become empty strings.
fn documents_from_batch(batch: &RecordBatch) -> Result<Vec<Document>> {
    let [titles, contents, sources, urls] = [
        string_column(batch, RETRIEVED_PROPERTIES[0])?,
        string_column(batch, RETRIEVED_PROPERTIES[1])?,
        string_column(batch, RETRIEVED_PROPERTIES[2])?,
        string_column(batch, RETRIEVED_PROPERTIES[3])?,
    ];

    let cell = |column: &StringArray, row: usize| {
        (!column.is_null(row)).then(|| column.value(row).to_string())
    };

    Ok((0..batch.num_rows())
        .map(|row| {
            Document::from_optional(
                cell(titles, row),
                cell(contents, row),
                cell(sources, row),
                cell(urls, row),
            )
        })
        .collect())
}

#[async_trait]
impl VectorStore for LanceDbStore {
    fn name(&self) -> &'static str {
        "lancedb"
    }

    fn collection(&self) -> &str {
        &self.table_name
    }

    async fn ping(&self) -> Result<()> {
        self.table_exists().await.map(|_| ())
    }

    async fn ensure_collection(&self) -> Result<bool> {
        if self.table_exists().await? {
            info!("Table {} already exists", self.table_name);
            return Ok(false);
        }

        self.connection
            .create_empty_table(&self.table_name, self.schema())
            .execute()
            .await
            .map_err(|e| PipelineError::Ingestion(format!("Failed to create table: {}", e)))?;

        info!("Created table {}", self.table_name);
        Ok(true)
    }

    async fn insert(&self, record: &DisasterRecord) -> Result<()> {
        let text = format!("{}\n{}", record.title, record.content);
        let embedding = self
            .embeddings
            .embed(&text)
            .await
            .map_err(|e| PipelineError::Ingestion(e.to_string()))?;
        self.check_dimension(&embedding)
            .map_err(PipelineError::Ingestion)?;

        let schema = self.schema();
        let batch = record_batch(schema.clone(), record, embedding)?;

        let table = self.open_table().await?;
        table
            .add(RecordBatchIterator::new(vec![Ok(batch)], schema))
            .execute()
            .await
            .map_err(|e| PipelineError::Ingestion(format!("Failed to insert document: {}", e)))?;

        debug!("Inserted {} into {}", record.url, self.table_name);
        Ok(())
    }

    async fn near_text(&self, query: &str, limit: usize) -> Result<Vec<Document>> {
        if !self.table_exists().await? {
            return Err(PipelineError::Retrieval(format!(
                "Table {} does not exist",
                self.table_name
            )));
        }

        let embedding = self.embeddings.embed(query).await?;
        self.check_dimension(&embedding)
            .map_err(PipelineError::Retrieval)?;

        let table = self.open_table().await?;
        let mut results_stream = table
            .vector_search(embedding)
            .map_err(|e| PipelineError::Retrieval(format!("Failed to create vector search: {}", e)))?
            .limit(limit)
            .execute()
            .await
            .map_err(|e| PipelineError::Retrieval(format!("Vector search failed: {}", e)))?;

        let mut documents = Vec::new();
        while let Some(batch_result) = results_stream.next().await {
            let batch = batch_result.map_err(|e| {
                PipelineError::Retrieval(format!("Failed to read result batch: {}", e))
            })?;
            documents.extend(documents_from_batch(&batch)?);
        }

        if documents.len() > limit {
            warn!("LanceDB returned {} rows for limit {}", documents.len(), limit);
            documents.truncate(limit);
        }

        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DisasterRecord {
        DisasterRecord {
            url: "https://www.ca.gov/lafires/".to_string(),
            title: "LA Fires".to_string(),
            content: "Shelters are open at Pasadena Convention Center".to_string(),
            source: "www.ca.gov".to_string(),
            timestamp: "2025-01-10 12:00:00".to_string(),
        }
    }

    #[test]
    fn test_record_batch_round_trips_documents() {
        let schema = SchemaManager::arrow_schema(4);
        let batch = record_batch(schema, &record(), vec![0.1, 0.2, 0.3, 0.4]).unwrap();
        assert_eq!(batch.num_rows(), 1);

        let docs = documents_from_batch(&batch).unwrap();
        assert_eq!(docs, vec![record().to_document()]);
    }

    #[test]
    fn test_record_batch_rejects_wrong_dimension() {
        let schema = SchemaManager::arrow_schema(8);
        assert!(record_batch(schema, &record(), vec![0.1, 0.2]).is_err());
    }

    #[test]
    fn test_null_cells_become_empty_strings() {
        let schema = Arc::new(Schema::new(vec![
            arrow_schema::Field::new("title", arrow_schema::DataType::Utf8, true),
            arrow_schema::Field::new("content", arrow_schema::DataType::Utf8, true),
            arrow_schema::Field::new("source", arrow_schema::DataType::Utf8, true),
            arrow_schema::Field::new("url", arrow_schema::DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![Some("Shelters")])) as ArrayRef,
                Arc::new(StringArray::from(vec![None::<&str>])),
                Arc::new(StringArray::from(vec![None::<&str>])),
                Arc::new(StringArray::from(vec![Some("https://www.redcross.org")])),
            ],
        )
        .unwrap();

        let docs = documents_from_batch(&batch).unwrap();
        assert_eq!(docs[0].content, "");
        assert_eq!(docs[0].url, "https://www.redcross.org");
    }
}
