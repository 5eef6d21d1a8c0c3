// file: src/retrieval/retriever.rs
// description: bounded top-k semantic retrieval against the document collection
// reference: vector similarity search

use crate::config::DEFAULT_RESULT_LIMIT;
use crate::database::VectorStore;
use crate::error::{PipelineError, Result};
use crate::models::Document;
use crate::utils::OperationTimer;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Ranked documents, most similar first. Never longer than the retriever's `k`.
pub type RetrievalResult = Vec<Document>;

#[derive(Clone)]
pub struct ContextRetriever {
    store: Arc<dyn VectorStore>,
    k: usize,
}

impl ContextRetriever {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self {
            store,
            k: DEFAULT_RESULT_LIMIT,
        }
    }

    /// Fails with [`PipelineError::Validation`] when `k` is zero.
    pub fn with_limit(store: Arc<dyn VectorStore>, k: usize) -> Result<Self> {
        if k == 0 {
            return Err(PipelineError::Validation(
                "result limit must be greater than 0".to_string(),
            ));
        }
        Ok(Self { store, k })
    }

    pub fn limit(&self) -> usize {
        self.k
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Requests exactly `k` nearest neighbours of `enriched_query`.
    /// Store failures propagate as [`PipelineError::Retrieval`].
    pub async fn retrieve(&self, enriched_query: &str) -> Result<RetrievalResult> {
        let timer = OperationTimer::new("retrieve_context");

        let mut documents = self
            .store
            .near_text(enriched_query, self.k)
            .await
            .map_err(|e| match e {
                PipelineError::Retrieval(_) => e,
                other => PipelineError::Retrieval(other.to_string()),
            })?;

        if documents.len() > self.k {
            warn!(
                "{} returned {} documents for k={}, truncating",
                self.store.name(),
                documents.len(),
                self.k
            );
            documents.truncate(self.k);
        }

        timer.warn_if_slow(Duration::from_secs(5));
        timer.finish_with_count(documents.len());
        debug!(
            "Retrieved {} documents from {}",
            documents.len(),
            self.store.collection()
        );

        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DisasterRecord;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Returns more documents than asked for and records the requested limit.
    struct OverfullStore {
        requested: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl VectorStore for OverfullStore {
        fn name(&self) -> &'static str {
            "overfull"
        }

        fn collection(&self) -> &str {
            "DisasterInfo"
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }

        async fn ensure_collection(&self) -> Result<bool> {
            Ok(false)
        }

        async fn insert(&self, _record: &DisasterRecord) -> Result<()> {
            Ok(())
        }

        async fn near_text(&self, query: &str, limit: usize) -> Result<Vec<Document>> {
            self.requested.lock().unwrap().push(limit);
            Ok((0..limit + 2)
                .map(|i| Document::new(format!("{} #{}", query, i), "", "", ""))
                .collect())
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl VectorStore for BrokenStore {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn collection(&self) -> &str {
            "DisasterInfo"
        }

        async fn ping(&self) -> Result<()> {
            Err(PipelineError::Retrieval("unreachable".to_string()))
        }

        async fn ensure_collection(&self) -> Result<bool> {
            Ok(false)
        }

        async fn insert(&self, _record: &DisasterRecord) -> Result<()> {
            Ok(())
        }

        async fn near_text(&self, _query: &str, _limit: usize) -> Result<Vec<Document>> {
            Err(PipelineError::Serialization(
                serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
            ))
        }
    }

    #[tokio::test]
    async fn test_default_limit_is_three_and_enforced() {
        let store = Arc::new(OverfullStore {
            requested: Mutex::new(Vec::new()),
        });
        let retriever = ContextRetriever::new(store.clone());

        let docs = retriever.retrieve("shelter").await.unwrap();
        assert_eq!(retriever.limit(), 3);
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].title, "shelter #0");
        assert_eq!(*store.requested.lock().unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn test_custom_limit() {
        let store = Arc::new(OverfullStore {
            requested: Mutex::new(Vec::new()),
        });
        let retriever = ContextRetriever::with_limit(store, 1).unwrap();
        assert_eq!(retriever.retrieve("water").await.unwrap().len(), 1);
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        let store = Arc::new(OverfullStore {
            requested: Mutex::new(Vec::new()),
        });
        assert!(matches!(
            ContextRetriever::with_limit(store.clone(), 0),
            Err(PipelineError::Validation(_))
        ));
        assert!(store.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failures_become_retrieval_errors() {
        let retriever = ContextRetriever::new(Arc::new(BrokenStore));
        let err = retriever.retrieve("shelter").await.unwrap_err();
        assert!(matches!(err, PipelineError::Retrieval(_)));
    }
}
