// file: src/models/document.rs
// description: retrieved evidence documents and ingested collection records
// reference: internal data structures

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A retrieved evidence unit. Every field is plain text and never null;
/// properties missing upstream are carried as empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub content: String,
    pub source: String,
    pub url: String,
}

impl Document {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        source: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            source: source.into(),
            url: url.into(),
        }
    }

    /// Builds a document from optional upstream properties.
    pub fn from_optional(
        title: Option<String>,
        content: Option<String>,
        source: Option<String>,
        url: Option<String>,
    ) -> Self {
        Self {
            title: title.unwrap_or_default(),
            content: content.unwrap_or_default(),
            source: source.unwrap_or_default(),
            url: url.unwrap_or_default(),
        }
    }

    /// Format as a summary string for display
    pub fn format_summary(&self, max_content_len: usize) -> String {
        let content_preview = crate::utils::Validator::truncate_text(&self.content, max_content_len);
        format!(
            "{} ({})\n{}\n{}\n",
            self.title, self.source, self.url, content_preview
        )
    }
}

/// A full row of the document collection as written by ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisasterRecord {
    pub url: String,
    pub title: String,
    pub content: String,
    pub source: String,
    pub timestamp: String,
}

impl DisasterRecord {
    /// Stable identifier derived from url and content.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.url.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.content.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn to_document(&self) -> Document {
        Document::new(
            self.title.clone(),
            self.content.clone(),
            self.source.clone(),
            self.url.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(content: &str) -> DisasterRecord {
        DisasterRecord {
            url: "https://www.ca.gov/lafires/".to_string(),
            title: "LA Fires".to_string(),
            content: content.to_string(),
            source: "www.ca.gov".to_string(),
            timestamp: "2025-01-10 12:00:00".to_string(),
        }
    }

    #[test]
    fn test_missing_fields_render_empty() {
        let doc = Document::from_optional(Some("Shelters".to_string()), None, None, None);
        assert_eq!(doc.title, "Shelters");
        assert_eq!(doc.content, "");
        assert_eq!(doc.source, "");
        assert_eq!(doc.url, "");

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["url"], "");
    }

    #[test]
    fn test_hash_consistency() {
        assert_eq!(record("a").content_hash(), record("a").content_hash());
        assert_ne!(record("a").content_hash(), record("b").content_hash());
    }

    #[test]
    fn test_format_summary_truncates() {
        let doc = Document::new(
            "Shelters",
            "Evacuation shelters are open at the following locations",
            "www.ca.gov",
            "https://www.ca.gov/lafires/",
        );
        let summary = doc.format_summary(10);
        assert!(summary.contains("Shelters (www.ca.gov)"));
        assert!(summary.contains("Evacuation..."));
        assert!(!summary.contains("shelters"));
    }
}
