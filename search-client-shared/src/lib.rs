//! # Search Client Shared
//!
//! This crate defines the value types shared across the search client: ordered documents,
//! the immutable query tree with its DSL rendering, and search request/response types.
//! Everything here is pure; no type in this crate performs I/O.

pub mod types;

pub use types::document::{self, format_timestamp, parse_canonical_timestamp};
pub use types::query;
pub use types::{
    Document, FieldValue, Pagination, Query, SearchHit, SearchRequest, SearchResponse, WireQuery,
};
