//! Book catalog search against a Google Books shaped API.

use crate::config::MetadataConfig;
use crate::error::{AppError, Result};
use crate::metadata::BookMetadata;
use serde::Deserialize;
use std::time::Duration;

/// Client for the external book search API.
pub struct SearchClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
struct Volume {
    #[serde(rename = "volumeInfo")]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
struct VolumeInfo {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(rename = "pageCount", default)]
    page_count: Option<i64>,
    #[serde(rename = "imageLinks", default)]
    image_links: Option<ImageLinks>,
    #[serde(rename = "industryIdentifiers", default)]
    industry_identifiers: Vec<IndustryIdentifier>,
    #[serde(default)]
    publisher: Option<String>,
    #[serde(rename = "publishedDate", default)]
    published_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageLinks {
    #[serde(default)]
    thumbnail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndustryIdentifier {
    #[serde(rename = "type")]
    kind: String,
    identifier: String,
}

/// Normalize a query that is actually an ISBN: strip hyphens and
/// spaces, accept 13 digits or 10 characters where the last may be X.
pub fn normalize_isbn(query: &str) -> Option<String> {
    let cleaned: String = query
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect();

    let valid = match cleaned.len() {
        13 => cleaned.chars().all(|c| c.is_ascii_digit()),
        10 => {
            let (head, last) = cleaned.split_at(9);
            head.chars().all(|c| c.is_ascii_digit())
                && last.chars().all(|c| c.is_ascii_digit() || c == 'X' || c == 'x')
        }
        _ => false,
    };

    valid.then(|| cleaned.to_uppercase())
}

impl SearchClient {
    /// Create a client from the metadata configuration.
    pub fn new(config: &MetadataConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.search_url.clone(),
        })
    }

    /// Search the catalog. An ISBN-looking query is scoped to an exact
    /// ISBN lookup. Any upstream failure degrades to an empty result,
    /// never an error, so the library keeps working offline.
    pub async fn search(&self, query: &str) -> Vec<BookMetadata> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let q = match normalize_isbn(query) {
            Some(isbn) => format!("isbn:{}", isbn),
            None => query.to_string(),
        };

        let url = format!("{}?q={}", self.base_url, urlencoding::encode(&q));

        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Book search request failed: {}", e);
                return Vec::new();
            }
        };

        if !response.status().is_success() {
            tracing::warn!("Book search returned status {}", response.status());
            return Vec::new();
        }

        let parsed: VolumesResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("Book search response parse failed: {}", e);
                return Vec::new();
            }
        };

        parsed
            .items
            .into_iter()
            .filter_map(|v| Self::volume_to_metadata(v.volume_info))
            .collect()
    }

    fn volume_to_metadata(info: VolumeInfo) -> Option<BookMetadata> {
        let title = info.title?;

        // Prefer ISBN-13 over ISBN-10
        let isbn = info
            .industry_identifiers
            .iter()
            .find(|i| i.kind == "ISBN_13")
            .or_else(|| {
                info.industry_identifiers
                    .iter()
                    .find(|i| i.kind == "ISBN_10")
            })
            .map(|i| i.identifier.clone());

        Some(BookMetadata {
            title,
            author: info.authors.first().cloned().unwrap_or_default(),
            page_count: info.page_count,
            cover_url: info.image_links.and_then(|l| l.thumbnail),
            isbn,
            publisher: info.publisher,
            published_date: info.published_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isbn_13_detected() {
        assert_eq!(
            normalize_isbn("978-2-1234-5680-3"),
            Some("9782123456803".to_string())
        );
        assert_eq!(
            normalize_isbn("9782123456803"),
            Some("9782123456803".to_string())
        );
    }

    #[test]
    fn test_isbn_10_detected() {
        assert_eq!(normalize_isbn("2-1234-5680-2"), Some("2123456802".to_string()));
        assert_eq!(normalize_isbn("012345678X"), Some("012345678X".to_string()));
        assert_eq!(normalize_isbn("012345678x"), Some("012345678X".to_string()));
    }

    #[test]
    fn test_title_query_not_isbn() {
        assert_eq!(normalize_isbn("The Left Hand of Darkness"), None);
        assert_eq!(normalize_isbn("1984"), None);
        assert_eq!(normalize_isbn("12345678901X"), None);
    }

    #[test]
    fn test_isbn_with_spaces() {
        assert_eq!(
            normalize_isbn("978 2 1234 5680 3"),
            Some("9782123456803".to_string())
        );
    }

    #[test]
    fn test_volume_parse_prefers_isbn_13() {
        let json = r#"{
            "items": [{
                "volumeInfo": {
                    "title": "Dune",
                    "authors": ["Frank Herbert"],
                    "pageCount": 412,
                    "industryIdentifiers": [
                        {"type": "ISBN_10", "identifier": "0441013597"},
                        {"type": "ISBN_13", "identifier": "9780441013593"}
                    ]
                }
            }]
        }"#;

        let parsed: VolumesResponse = serde_json::from_str(json).unwrap();
        let results: Vec<BookMetadata> = parsed
            .items
            .into_iter()
            .filter_map(|v| SearchClient::volume_to_metadata(v.volume_info))
            .collect();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Dune");
        assert_eq!(results[0].author, "Frank Herbert");
        assert_eq!(results[0].page_count, Some(412));
        assert_eq!(results[0].isbn, Some("9780441013593".to_string()));
    }

    #[test]
    fn test_volume_without_title_skipped() {
        let json = r#"{"items": [{"volumeInfo": {"authors": ["Nobody"]}}]}"#;
        let parsed: VolumesResponse = serde_json::from_str(json).unwrap();
        let results: Vec<BookMetadata> = parsed
            .items
            .into_iter()
            .filter_map(|v| SearchClient::volume_to_metadata(v.volume_info))
            .collect();
        assert!(results.is_empty());
    }

    #[test]
    fn test_empty_response_parses() {
        let parsed: VolumesResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.items.is_empty());
    }
}
