//! Search request types for the search client.
//!
//! This module defines the request structure and pagination used to search the index.

use super::query::Query;

/// Default number of hits returned when no size is given.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Validated pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Offset of the first hit.
    pub from: u64,
    /// Maximum number of hits.
    pub size: u64,
}

impl Pagination {
    /// Validate a caller-supplied window.
    ///
    /// Negative values are rejected with an error message. Any upper bound on the window
    /// is the backend's to enforce.
    pub fn new(from: i64, size: i64) -> Result<Self, String> {
        if from < 0 {
            return Err(format!("from must not be negative, got {}", from));
        }
        if size < 0 {
            return Err(format!("size must not be negative, got {}", size));
        }

        Ok(Self {
            from: from as u64,
            size: size as u64,
        })
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            from: 0,
            size: DEFAULT_PAGE_SIZE as u64,
        }
    }
}

/// Search request parameters.
///
/// Without a query every document matches. The post filter narrows hits after the
/// query has run and does not affect scoring.
///
/// # Example
///
/// ```
/// use search_client_shared::query::{range, term};
/// use search_client_shared::SearchRequest;
///
/// let request = SearchRequest::new(term("user", "geyang1"))
///     .collection("twitter")
///     .post_filter(range("age", 10, 30))
///     .from(0)
///     .size(60);
/// assert!(request.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Collections to search. Empty searches all collections.
    pub collections: Vec<String>,
    /// Scoring query. `None` matches every document.
    pub query: Option<Query>,
    /// Non-scoring filter applied to the hits.
    pub post_filter: Option<Query>,
    /// Offset of the first hit.
    pub from: i64,
    /// Maximum number of hits.
    pub size: i64,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            collections: Vec::new(),
            query: None,
            post_filter: None,
            from: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl SearchRequest {
    /// Create a request for `query` across all collections.
    pub fn new(query: Query) -> Self {
        Self {
            query: Some(query),
            ..Self::default()
        }
    }

    /// Create a request that matches every document.
    pub fn match_all() -> Self {
        Self::default()
    }

    /// Restrict the search to a collection. May be called more than once.
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collections.push(collection.into());
        self
    }

    /// Set the post filter.
    pub fn post_filter(mut self, filter: Query) -> Self {
        self.post_filter = Some(filter);
        self
    }

    /// Set the offset of the first hit.
    pub fn from(mut self, from: i64) -> Self {
        self.from = from;
        self
    }

    /// Set the maximum number of hits.
    pub fn size(mut self, size: i64) -> Self {
        self.size = size;
        self
    }

    /// Validated pagination window for this request.
    pub fn pagination(&self) -> Result<Pagination, String> {
        Pagination::new(self.from, self.size)
    }

    /// Validate the request parameters.
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.collections.iter().any(|c| c.trim().is_empty()) {
            return Err("Collection names cannot be empty".to_string());
        }
        if let Some(query) = &self.query {
            query.validate()?;
        }
        if let Some(filter) = &self.post_filter {
            filter.validate()?;
        }
        self.pagination().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{match_text, term};

    #[test]
    fn test_pagination_rejects_negative() {
        assert!(Pagination::new(-1, 10).is_err());
        assert!(Pagination::new(0, -1).is_err());
        assert_eq!(Pagination::new(0, 0), Ok(Pagination { from: 0, size: 0 }));
    }

    #[test]
    fn test_pagination_accepts_large_windows() {
        assert_eq!(
            Pagination::new(10_000, 1),
            Ok(Pagination {
                from: 10_000,
                size: 1
            })
        );
        assert!(Pagination::new(i64::MAX, i64::MAX).is_ok());
    }

    #[test]
    fn test_search_request_defaults() {
        let request = SearchRequest::match_all();
        assert!(request.collections.is_empty());
        assert!(request.query.is_none());
        assert_eq!(request.from, 0);
        assert_eq!(request.size, 10);
        assert_eq!(request.pagination(), Ok(Pagination::default()));
    }

    #[test]
    fn test_search_request_validation() {
        // Valid request
        let request = SearchRequest::new(match_text("user", "geyang0")).collection("twitter");
        assert!(request.validate().is_ok());

        // Empty collection name
        let request = SearchRequest::match_all().collection(" ");
        assert!(request.validate().is_err());

        // Invalid query
        let request = SearchRequest::new(term("", "x"));
        assert!(request.validate().is_err());

        // Invalid post filter
        let request = SearchRequest::match_all().post_filter(term("", "x"));
        assert!(request.validate().is_err());

        // Negative pagination
        let request = SearchRequest::match_all().from(-5);
        assert!(request.validate().is_err());
    }
}
