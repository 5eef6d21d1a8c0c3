// file: src/ingest/ingestor.rs
// description: schema bootstrap plus sequential scrape-and-insert of seed urls
// reference: ingestion workflow with progress reporting

use crate::database::VectorStore;
use crate::error::Result;
use crate::ingest::web::WebScraper;
use crate::utils::OperationTimer;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub collection_created: bool,
    pub pages_scraped: usize,
    pub documents_inserted: usize,
    pub failures: usize,
}

pub struct Ingestor {
    store: Arc<dyn VectorStore>,
    scraper: WebScraper,
    delay: Duration,
    show_progress: bool,
}

impl Ingestor {
    pub fn new(store: Arc<dyn VectorStore>, scraper: WebScraper, delay: Duration) -> Self {
        Self {
            store,
            scraper,
            delay,
            show_progress: true,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Creates the collection if needed, then scrapes and inserts each url.
    /// A failing url is counted and skipped; only schema errors abort.
    pub async fn run(&self, urls: &[String]) -> Result<IngestStats> {
        let timer = OperationTimer::new("ingest");
        let mut stats = IngestStats {
            collection_created: self.store.ensure_collection().await?,
            ..IngestStats::default()
        };

        let progress = self.progress_bar(urls.len() as u64);

        for (idx, url) in urls.iter().enumerate() {
            progress.set_message(format!("Scraping {}", url));

            match self.scraper.scrape(url).await {
                Ok(record) => {
                    stats.pages_scraped += 1;
                    match self.store.insert(&record).await {
                        Ok(()) => {
                            stats.documents_inserted += 1;
                            info!("Added information from {}", url);
                        }
                        Err(e) => {
                            stats.failures += 1;
                            warn!("Error adding data from {}: {}", url, e);
                        }
                    }
                }
                Err(e) => {
                    stats.failures += 1;
                    warn!("Error scraping {}: {}", url, e);
                }
            }

            progress.inc(1);
            if idx + 1 < urls.len() && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        progress.finish_with_message("Ingestion complete");
        timer.finish_with_count(stats.documents_inserted);
        Ok(stats)
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        let bar = ProgressBar::new(len);
        if !self.show_progress {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::models::{DisasterRecord, Document};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingStore {
        exists: bool,
        inserted: Mutex<Vec<DisasterRecord>>,
    }

    #[async_trait]
    impl VectorStore for RecordingStore {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn collection(&self) -> &str {
            "DisasterInfo"
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }

        async fn ensure_collection(&self) -> Result<bool> {
            Ok(!self.exists)
        }

        async fn insert(&self, record: &DisasterRecord) -> Result<()> {
            self.inserted.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn near_text(&self, _query: &str, _limit: usize) -> Result<Vec<Document>> {
            Ok(Vec::new())
        }
    }

    struct SchemaLockedStore;

    #[async_trait]
    impl VectorStore for SchemaLockedStore {
        fn name(&self) -> &'static str {
            "locked"
        }

        fn collection(&self) -> &str {
            "DisasterInfo"
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }

        async fn ensure_collection(&self) -> Result<bool> {
            Err(PipelineError::Ingestion("forbidden".to_string()))
        }

        async fn insert(&self, _record: &DisasterRecord) -> Result<()> {
            Ok(())
        }

        async fn near_text(&self, _query: &str, _limit: usize) -> Result<Vec<Document>> {
            Ok(Vec::new())
        }
    }

    fn scraper() -> WebScraper {
        WebScraper::new(Duration::from_secs(1)).unwrap()
    }

    #[tokio::test]
    async fn test_bad_urls_are_counted_not_fatal() {
        let store = Arc::new(RecordingStore {
            exists: false,
            inserted: Mutex::new(Vec::new()),
        });
        let ingestor = Ingestor::new(store.clone(), scraper(), Duration::ZERO).with_progress(false);

        let stats = ingestor
            .run(&["not-a-url".to_string(), "http://127.0.0.1:9/".to_string()])
            .await
            .unwrap();

        assert_eq!(
            stats,
            IngestStats {
                collection_created: true,
                pages_scraped: 0,
                documents_inserted: 0,
                failures: 2,
            }
        );
        assert!(store.inserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_schema_failure_aborts() {
        let ingestor =
            Ingestor::new(Arc::new(SchemaLockedStore), scraper(), Duration::ZERO).with_progress(false);
        assert!(ingestor.run(&[]).await.is_err());
    }
}
