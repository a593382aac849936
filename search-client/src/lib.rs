//! # Search Client
//!
//! Runs the search client against a configured cluster.
//!
//! ## Modules
//!
//! - [`config`]: Environment settings and dependency initialization
//! - [`walkthrough`]: Step-by-step exercise of every client operation
//! - [`errors`]: Error types for walkthrough steps

pub mod config;
pub mod errors;
pub mod walkthrough;

pub use config::{BackendKind, ClientSettings, ConnectionMode, Dependencies};
pub use errors::StepError;
pub use walkthrough::{StepOutcome, Walkthrough, WalkthroughReport};

use search_client_repository::SearchClientError;
use thiserror::Error;

/// Errors that can occur during client initialization or execution.
#[derive(Error, Debug)]
pub enum ClientAppError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Search client error.
    #[error("Search client error: {0}")]
    ClientError(#[from] SearchClientError),

    /// One or more walkthrough steps failed.
    #[error("Walkthrough failed: {failed} of {total} steps did not pass")]
    WalkthroughFailed { failed: usize, total: usize },
}

impl ClientAppError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
