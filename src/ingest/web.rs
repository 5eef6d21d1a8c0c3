// file: src/ingest/web.rs
// description: fetches a relief page and flattens it into a collection record
// reference: https://docs.rs/scraper

use crate::error::{PipelineError, Result};
use crate::models::DisasterRecord;
use crate::utils::Validator;
use reqwest::{Client, Url};
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Text-bearing elements in extraction order: paragraphs, then headings, then list items.
const CONTENT_SELECTORS: [&str; 3] = ["p", "h1, h2, h3, h4, h5, h6", "li"];

pub struct WebScraper {
    client: Client,
}

impl WebScraper {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("relief_rag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::Config(format!("Failed to build scraper client: {}", e)))?;
        Ok(Self { client })
    }

    pub async fn scrape(&self, url: &str) -> Result<DisasterRecord> {
        Validator::validate_url(url)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PipelineError::Ingestion(format!("Failed to fetch {}: {}", url, e)))?;

        let html = response
            .text()
            .await
            .map_err(|e| PipelineError::Ingestion(format!("Failed to read {}: {}", url, e)))?;

        debug!("Fetched {} bytes from {}", html.len(), url);

        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        extract_record(url, &html, timestamp)
    }
}

/// Builds a record from raw HTML; the title falls back to the url and the
/// source is the url's host.
pub fn extract_record(url: &str, html: &str, timestamp: String) -> Result<DisasterRecord> {
    let document = Html::parse_document(html);

    let mut content = Vec::new();
    for css in CONTENT_SELECTORS {
        let selector = selector(css)?;
        content.extend(
            document
                .select(&selector)
                .map(|element| Validator::normalize_whitespace(&element.text().collect::<String>()))
                .filter(|text| !text.is_empty()),
        );
    }
    let content = content.join(" ");
    Validator::validate_content_not_empty(&content)
        .map_err(|_| PipelineError::Ingestion(format!("No text content found at {}", url)))?;

    let title = document
        .select(&selector("title")?)
        .next()
        .map(|element| Validator::normalize_whitespace(&element.text().collect::<String>()))
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| url.to_string());

    let source = Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .ok_or_else(|| PipelineError::Validation(format!("URL has no host: {}", url)))?;

    Ok(DisasterRecord {
        url: url.to_string(),
        title,
        content,
        source,
        timestamp,
    })
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| PipelineError::Ingestion(format!("Invalid selector {}: {}", css, e)))
}
