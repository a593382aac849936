//! Configuration types for the SearchClient.

use std::time::Duration;

use url::Url;

use crate::errors::SearchClientError;

/// Default time allowed for establishing a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time allowed for a single backend call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default maximum number of operations in one bulk submission.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;

/// Connection settings for a `SearchClient`.
///
/// Endpoints are tried in order on connect. Each one is either a full URL
/// (`https://search.internal:9200`) or a bare `host:port`, which is taken as plain HTTP.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use search_client_repository::ConnectionConfig;
///
/// let config = ConnectionConfig::new("elasticsearch-cluster-tst")
///     .with_endpoint("127.0.0.1:9200")
///     .with_request_timeout(Duration::from_secs(5))
///     .with_max_batch_size(500);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// Name of the cluster to join.
    pub cluster_name: String,
    /// Endpoints in the order they are tried.
    pub endpoints: Vec<String>,
    /// Time allowed for `connect`.
    pub connect_timeout: Duration,
    /// Time allowed for each backend call after connecting.
    pub request_timeout: Duration,
    /// Maximum number of operations allowed in a single bulk submission.
    ///
    /// Set to `None` to disable the limit (not recommended for production).
    /// Defaults to 1000 if not specified.
    pub max_batch_size: Option<usize>,
    /// Skip the cluster name check on connect.
    pub ignore_cluster_name: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            cluster_name: String::new(),
            endpoints: Vec::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_batch_size: Some(DEFAULT_MAX_BATCH_SIZE),
            ignore_cluster_name: true,
        }
    }
}

impl ConnectionConfig {
    /// Create a config for `cluster_name` with default timeouts and no endpoints.
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            ..Self::default()
        }
    }

    /// Append an endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoints.push(endpoint.into());
        self
    }

    /// Append several endpoints.
    pub fn with_endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints.extend(endpoints.into_iter().map(Into::into));
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set a custom batch size limit.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = Some(max_batch_size);
        self
    }

    /// Remove the batch size limit.
    ///
    /// # Warning
    ///
    /// Use with caution. Removing batch size limits can lead to memory issues
    /// and timeouts when processing very large batches. Not recommended for production.
    pub fn unlimited_batch_size(mut self) -> Self {
        self.max_batch_size = None;
        self
    }

    /// Require the backend to report `cluster_name` on connect.
    pub fn verify_cluster_name(mut self) -> Self {
        self.ignore_cluster_name = false;
        self
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// * `ConfigurationError` - if there are no endpoints, an endpoint does not parse,
    ///   a timeout is zero, the batch limit is zero, or the cluster name is empty while
    ///   the name check is on
    pub fn validate(&self) -> Result<(), SearchClientError> {
        self.endpoint_urls()?;

        if self.connect_timeout.is_zero() {
            return Err(SearchClientError::configuration(
                "connect_timeout must be greater than zero",
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(SearchClientError::configuration(
                "request_timeout must be greater than zero",
            ));
        }
        if self.max_batch_size == Some(0) {
            return Err(SearchClientError::configuration(
                "max_batch_size must be greater than zero; use unlimited_batch_size() to remove the limit",
            ));
        }
        if !self.ignore_cluster_name && self.cluster_name.trim().is_empty() {
            return Err(SearchClientError::configuration(
                "cluster_name is required when the cluster name is verified",
            ));
        }
        Ok(())
    }

    /// Parse every endpoint into a URL, in order.
    ///
    /// # Errors
    ///
    /// * `ConfigurationError` - if the list is empty or an endpoint is not a valid
    ///   `http`/`https` address
    pub fn endpoint_urls(&self) -> Result<Vec<Url>, SearchClientError> {
        if self.endpoints.is_empty() {
            return Err(SearchClientError::configuration(
                "At least one endpoint is required",
            ));
        }

        self.endpoints
            .iter()
            .map(|endpoint| parse_endpoint(endpoint))
            .collect()
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url, SearchClientError> {
    let trimmed = endpoint.trim();
    if trimmed.is_empty() {
        return Err(SearchClientError::configuration("Endpoint cannot be empty"));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let url = Url::parse(&candidate).map_err(|e| {
        SearchClientError::configuration(format!("Invalid endpoint '{}': {}", endpoint, e))
    })?;

    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(SearchClientError::configuration(format!(
            "Invalid endpoint '{}': expected an http or https address",
            endpoint
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConnectionConfig::new("elasticsearch-cluster-tst");
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.max_batch_size, Some(1000));
        assert!(config.ignore_cluster_name);
        assert!(config.endpoints.is_empty());
    }

    #[test]
    fn test_validate_requires_endpoint() {
        let config = ConnectionConfig::new("tst");
        assert!(matches!(
            config.validate(),
            Err(SearchClientError::ConfigurationError(_))
        ));
        assert!(config.with_endpoint("localhost:9200").validate().is_ok());
    }

    #[test]
    fn test_endpoint_urls() {
        let config = ConnectionConfig::new("tst")
            .with_endpoints(["127.0.0.1:9200", "https://search.internal:9243/"]);

        let urls = config.endpoint_urls().unwrap();
        assert_eq!(urls[0].as_str(), "http://127.0.0.1:9200/");
        assert_eq!(urls[1].scheme(), "https");
        assert_eq!(urls[1].port(), Some(9243));
    }

    #[test]
    fn test_invalid_endpoints() {
        for endpoint in ["", "   ", "ftp://host:21", "http://"] {
            let config = ConnectionConfig::new("tst").with_endpoint(endpoint);
            assert!(
                config.validate().is_err(),
                "endpoint '{}' should be rejected",
                endpoint
            );
        }
    }

    #[test]
    fn test_validate_limits_and_timeouts() {
        let base = ConnectionConfig::new("tst").with_endpoint("localhost:9200");

        assert!(base.clone().with_max_batch_size(0).validate().is_err());
        assert!(base.clone().unlimited_batch_size().validate().is_ok());
        assert!(base
            .clone()
            .with_request_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(base
            .clone()
            .with_connect_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_verify_cluster_name_requires_name() {
        let config = ConnectionConfig::new("")
            .with_endpoint("localhost:9200")
            .verify_cluster_name();
        assert!(config.validate().is_err());

        let config = ConnectionConfig::new("elasticsearch-cluster-tst")
            .with_endpoint("localhost:9200")
            .verify_cluster_name();
        assert!(!config.ignore_cluster_name);
        assert!(config.validate().is_ok());
    }
}
