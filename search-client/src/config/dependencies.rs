//! Dependency initialization and wiring for the search client.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use super::settings::{BackendKind, ClientSettings, ConnectionMode};
use crate::walkthrough::Walkthrough;
use crate::ClientAppError;
use search_client_repository::{
    InMemoryBackend, OpenSearchBackend, SearchBackend, SearchClient,
};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The connected client.
    pub client: Arc<SearchClient>,
    /// The walkthrough, ready to run against `client`.
    pub walkthrough: Walkthrough,
}

impl Dependencies {
    /// Build the configured backend and a connected client.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(ClientAppError)` - If initialization fails (connection failures only in
    ///   fail-fast mode)
    pub async fn new(settings: ClientSettings) -> Result<Self, ClientAppError> {
        info!(
            cluster_name = %settings.connection.cluster_name,
            endpoints = ?settings.connection.endpoints,
            backend = ?settings.backend,
            connection_mode = ?settings.connection_mode,
            retry_interval_secs = settings.retry_interval.as_secs(),
            "Initializing dependencies"
        );

        let backend: Arc<dyn SearchBackend> = match settings.backend {
            BackendKind::OpenSearch => {
                let backend = OpenSearchBackend::new(settings.connection.clone()).map_err(|e| {
                    ClientAppError::config(format!("Failed to create OpenSearch backend: {}", e))
                })?;
                Arc::new(backend)
            }
            BackendKind::InMemory => Arc::new(InMemoryBackend::new()),
        };

        Self::with_backend(settings, backend).await
    }

    /// Wire a client around an already constructed backend and connect it.
    pub async fn with_backend(
        settings: ClientSettings,
        backend: Arc<dyn SearchBackend>,
    ) -> Result<Self, ClientAppError> {
        let client = Arc::new(SearchClient::new(backend, settings.connection.clone())?);

        Self::connect(&client, settings.connection_mode, settings.retry_interval).await?;
        info!("Search backend connection established");

        let walkthrough = Walkthrough::new(client.clone(), settings.collection);
        Ok(Self {
            client,
            walkthrough,
        })
    }

    /// Connect with retry logic based on connection mode.
    async fn connect(
        client: &SearchClient,
        mode: ConnectionMode,
        retry_interval: Duration,
    ) -> Result<(), ClientAppError> {
        loop {
            match client.connect().await {
                Ok(()) => return Ok(()),
                Err(e) => match mode {
                    ConnectionMode::FailFast => {
                        return Err(ClientAppError::config(format!(
                            "Failed to connect to search backend: {}",
                            e
                        )));
                    }
                    ConnectionMode::Retry => {
                        warn!(
                            endpoints = ?client.config().endpoints,
                            error = %e,
                            retry_interval_secs = retry_interval.as_secs(),
                            "Failed to connect to search backend, retrying..."
                        );
                        sleep(retry_interval).await;
                    }
                },
            }
        }
    }
}
