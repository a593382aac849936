//! Search result types for the search client.
//!
//! This module defines the response structures returned from search operations.

use super::document::Document;

/// A single search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Collection the document lives in.
    pub collection: String,

    /// Document id.
    pub id: String,

    /// Relevance score from the search engine.
    /// `None` when the backend did not score the hit.
    pub score: Option<f64>,

    /// The stored document.
    pub document: Document,
}

/// Complete search response with hits and metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResponse {
    /// The hits, in the order the backend ranked them.
    pub hits: Vec<SearchHit>,

    /// Total number of matching documents.
    /// May be greater than the number of returned hits due to pagination.
    pub total: u64,

    /// Time taken to execute the search in milliseconds.
    pub took_ms: u64,
}

impl SearchResponse {
    /// Create an empty search response.
    pub fn empty() -> Self {
        Self {
            hits: Vec::new(),
            total: 0,
            took_ms: 0,
        }
    }

    /// Create a new search response.
    pub fn new(hits: Vec<SearchHit>, total: u64, took_ms: u64) -> Self {
        Self {
            hits,
            total,
            took_ms,
        }
    }

    /// Returns true if there are no hits.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Returns the number of hits in this response.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Consume the response, keeping only the documents.
    pub fn documents(self) -> Vec<Document> {
        self.hits.into_iter().map(|hit| hit.document).collect()
    }
}
