//! OpenSearch implementation of the search backend.
//!
//! This module provides a concrete implementation of `SearchBackend`
//! using OpenSearch as the backend, together with the response types it parses.

mod backend;
pub mod response;

pub use backend::OpenSearchBackend;
