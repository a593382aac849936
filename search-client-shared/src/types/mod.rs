//! This module defines the core data structures and types used across the search client.
//! It re-exports the document, query and search types.

pub mod document;
pub mod query;
pub mod search_request;
pub mod search_result;

pub use document::{Document, FieldValue};
pub use query::{Query, WireQuery};
pub use search_request::{Pagination, SearchRequest};
pub use search_result::{SearchHit, SearchResponse};
