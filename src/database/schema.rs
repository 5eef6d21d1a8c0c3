// file: src/database/schema.rs
// description: DisasterInfo collection schema for the Weaviate and LanceDB backends
// reference: https://weaviate.io/developers/weaviate/config-refs/schema

use arrow_schema::{DataType, Field, Schema};
use serde_json::{Value, json};
use std::sync::Arc;

/// Text properties of every collection row, in storage order.
pub const PROPERTIES: [(&str, &str); 5] = [
    ("url", "The source URL of the information"),
    ("title", "The title or heading of the information"),
    ("content", "The main content of the disaster relief information"),
    ("source", "The source website or organization"),
    ("timestamp", "When the information was collected"),
];

/// Properties requested from a semantic query, mapped into [`crate::models::Document`].
pub const RETRIEVED_PROPERTIES: [&str; 4] = ["title", "content", "source", "url"];

pub struct SchemaManager;

impl SchemaManager {
    /// Weaviate class definition vectorized server-side with `text2vec-openai`.
    pub fn weaviate_class(collection: &str) -> Value {
        let properties: Vec<Value> = PROPERTIES
            .iter()
            .map(|(name, description)| {
                json!({
                    "name": name,
                    "dataType": ["text"],
                    "description": description,
                })
            })
            .collect();

        json!({
            "class": collection,
            "description": "Information about disaster relief and emergency resources",
            "vectorizer": "text2vec-openai",
            "properties": properties,
        })
    }

    /// Arrow schema for the LanceDB table, with a row id and embedding column.
    pub fn arrow_schema(embedding_dim: usize) -> Arc<Schema> {
        let mut fields = vec![Field::new("id", DataType::Utf8, false)];
        fields.extend(
            PROPERTIES
                .iter()
                .map(|(name, _)| Field::new(*name, DataType::Utf8, true)),
        );
        fields.push(Field::new(
            "embedding",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                embedding_dim as i32,
            ),
            false,
        ));
        Arc::new(Schema::new(fields))
    }

    /// Weaviate class names are GraphQL type names starting with an uppercase letter.
    pub fn is_valid_collection_name(name: &str) -> bool {
        let mut chars = name.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }
}
