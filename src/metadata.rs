//! External book metadata: catalog search and bookstore page extraction.

pub mod search;
pub mod store;

use serde::{Deserialize, Serialize};

/// Book metadata returned by the external collaborators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookMetadata {
    /// Title.
    pub title: String,
    /// Primary author.
    pub author: String,
    /// Page count, when the source knows it.
    pub page_count: Option<i64>,
    /// Cover image URL.
    pub cover_url: Option<String>,
    /// ISBN-13 when available, ISBN-10 otherwise.
    pub isbn: Option<String>,
    /// Publisher name.
    pub publisher: Option<String>,
    /// Publication date as given by the source.
    pub published_date: Option<String>,
}
