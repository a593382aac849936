//! Error types for the search client repository.
//!
//! This module provides a unified error type for all search client operations.

mod search_client_error;

pub use search_client_error::SearchClientError;
