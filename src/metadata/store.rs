//! Add-by-URL metadata extraction from a configured bookstore domain.

use crate::config::MetadataConfig;
use crate::error::{AppError, Result};
use crate::metadata::BookMetadata;
use std::time::Duration;

/// Extractor for bookstore product pages.
pub struct StoreExtractor {
    client: reqwest::Client,
    domain: String,
}

/// Check whether a host belongs to the configured store domain,
/// including subdomains.
fn host_allowed(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{}", domain))
}

/// Pull the content attribute of a meta tag carrying the given
/// property or name value. Attribute order on the tag is not fixed.
fn find_meta_content(html: &str, key: &str) -> Option<String> {
    for needle in [format!("property=\"{}\"", key), format!("name=\"{}\"", key)] {
        let mut search = 0;
        while let Some(pos) = html[search..].find(&needle) {
            let abs = search + pos;
            let tag_start = html[..abs].rfind('<')?;
            let tag_end = abs + html[abs..].find('>')?;
            let tag = &html[tag_start..tag_end];

            if let Some(content_pos) = tag.find("content=\"") {
                let rest = &tag[content_pos + 9..];
                if let Some(end) = rest.find('"') {
                    let value = rest[..end].trim();
                    if !value.is_empty() {
                        return Some(decode_entities(value));
                    }
                }
            }
            search = tag_end;
        }
    }
    None
}

fn decode_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

fn parse_page_count(value: &str) -> Option<i64> {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok().filter(|n| *n > 0)
}

impl StoreExtractor {
    /// Create an extractor from the metadata configuration.
    pub fn new(config: &MetadataConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            domain: config.store_domain.clone(),
        })
    }

    /// Fetch a product page and extract book metadata from its
    /// OpenGraph tags. Only URLs on the configured store domain are
    /// accepted.
    pub async fn extract(&self, url: &str) -> Result<BookMetadata> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| AppError::Validation(format!("Invalid URL: {}", e)))?;

        let host = parsed
            .host_str()
            .ok_or_else(|| AppError::Validation("URL has no host".to_string()))?;

        if !host_allowed(host, &self.domain) {
            return Err(AppError::Validation(format!(
                "URL host {} is not the configured store domain {}",
                host, self.domain
            )));
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| AppError::Metadata(format!("Store page fetch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Metadata(format!(
                "Store page returned status {}",
                response.status()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| AppError::Metadata(format!("Store page read failed: {}", e)))?;

        Self::extract_from_html(&html)
    }

    fn extract_from_html(html: &str) -> Result<BookMetadata> {
        let title = find_meta_content(html, "og:title")
            .ok_or_else(|| AppError::Metadata("Store page has no og:title".to_string()))?;

        Ok(BookMetadata {
            title,
            author: find_meta_content(html, "book:author")
                .or_else(|| find_meta_content(html, "author"))
                .unwrap_or_default(),
            page_count: find_meta_content(html, "book:page_count")
                .as_deref()
                .and_then(parse_page_count),
            cover_url: find_meta_content(html, "og:image"),
            isbn: find_meta_content(html, "book:isbn"),
            publisher: find_meta_content(html, "book:publisher"),
            published_date: find_meta_content(html, "book:release_date"),
        })
    }
}
