//! Client settings read from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use search_client_repository::ConnectionConfig;
use tracing::warn;

use crate::ClientAppError;

/// Default cluster name.
const DEFAULT_CLUSTER_NAME: &str = "elasticsearch-cluster-tst";

/// Default endpoint list.
const DEFAULT_ENDPOINTS: &str = "http://localhost:9200";

/// Default collection the walkthrough writes to.
const DEFAULT_COLLECTION: &str = "twitter";

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

/// Connection mode for the search backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry connection at a fixed interval until successful.
    Retry,
}

impl ConnectionMode {
    /// Parse a connection mode.
    ///
    /// Valid values: "fail-fast" or "retry" (case-insensitive).
    /// Defaults to "retry" if not set or invalid.
    fn parse(value: Option<&str>) -> Self {
        match value.unwrap_or("retry").to_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            other => {
                warn!(value = other, "Invalid SEARCH_CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }
}

/// Which backend the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// A real cluster over HTTP.
    OpenSearch,
    /// Process-local store; nothing leaves the process.
    InMemory,
}

impl BackendKind {
    fn parse(value: Option<&str>) -> Result<Self, ClientAppError> {
        match value.unwrap_or("opensearch").to_lowercase().as_str() {
            "opensearch" | "elasticsearch" => Ok(Self::OpenSearch),
            "memory" | "in-memory" => Ok(Self::InMemory),
            other => Err(ClientAppError::config(format!(
                "Unknown SEARCH_BACKEND '{}', expected 'opensearch' or 'memory'",
                other
            ))),
        }
    }
}

/// Everything the binary needs to build and connect a client.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Connection configuration handed to the client and backend.
    pub connection: ConnectionConfig,
    /// What to do when the initial connect fails.
    pub connection_mode: ConnectionMode,
    /// Pause between connection attempts in retry mode.
    pub retry_interval: Duration,
    /// Collection the walkthrough writes to.
    pub collection: String,
    /// Backend implementation.
    pub backend: BackendKind,
}

impl ClientSettings {
    /// Read settings from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `SEARCH_CLUSTER_NAME`: Expected cluster name (default: elasticsearch-cluster-tst)
    /// - `SEARCH_ENDPOINTS`: Comma-separated endpoint list (default: http://localhost:9200)
    /// - `SEARCH_CONNECT_TIMEOUT_SECS`: Connect timeout in seconds (default: 10)
    /// - `SEARCH_REQUEST_TIMEOUT_SECS`: Request timeout in seconds (default: 30)
    /// - `SEARCH_MAX_BATCH_SIZE`: Maximum operations per bulk request, 0 for no limit (default: 1000)
    /// - `SEARCH_VERIFY_CLUSTER_NAME`: Reject clusters with another name (default: false)
    /// - `SEARCH_CONNECTION_MODE`: "fail-fast" or "retry" (default: retry)
    /// - `SEARCH_RETRY_INTERVAL_SECS`: Retry interval in seconds (default: 15)
    /// - `SEARCH_COLLECTION`: Walkthrough collection (default: twitter)
    /// - `SEARCH_BACKEND`: "opensearch" or "memory" (default: opensearch)
    pub fn from_env() -> Result<Self, ClientAppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through `lookup`, which maps a variable name to its value.
    ///
    /// Unparseable numbers fall back to their defaults with a warning; settings that
    /// produce an invalid connection configuration are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientAppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ConnectionConfig::default();

        let cluster_name =
            lookup("SEARCH_CLUSTER_NAME").unwrap_or_else(|| DEFAULT_CLUSTER_NAME.to_string());
        let endpoints: Vec<String> = lookup("SEARCH_ENDPOINTS")
            .unwrap_or_else(|| DEFAULT_ENDPOINTS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(String::from)
            .collect();

        let connect_timeout = parse_or(
            &lookup,
            "SEARCH_CONNECT_TIMEOUT_SECS",
            defaults.connect_timeout.as_secs(),
        );
        let request_timeout = parse_or(
            &lookup,
            "SEARCH_REQUEST_TIMEOUT_SECS",
            defaults.request_timeout.as_secs(),
        );
        let max_batch_size = parse_or(
            &lookup,
            "SEARCH_MAX_BATCH_SIZE",
            defaults.max_batch_size.unwrap_or(0),
        );
        let verify_cluster_name = parse_or(&lookup, "SEARCH_VERIFY_CLUSTER_NAME", false);
        let retry_interval = parse_or(
            &lookup,
            "SEARCH_RETRY_INTERVAL_SECS",
            DEFAULT_RETRY_INTERVAL_SECS,
        );

        let mut connection = ConnectionConfig::new(cluster_name)
            .with_endpoints(endpoints)
            .with_connect_timeout(Duration::from_secs(connect_timeout))
            .with_request_timeout(Duration::from_secs(request_timeout));
        connection = match max_batch_size {
            0 => connection.unlimited_batch_size(),
            n => connection.with_max_batch_size(n),
        };
        if verify_cluster_name {
            connection = connection.verify_cluster_name();
        }
        connection
            .validate()
            .map_err(|e| ClientAppError::config(e.to_string()))?;

        let collection =
            lookup("SEARCH_COLLECTION").unwrap_or_else(|| DEFAULT_COLLECTION.to_string());
        if collection.trim().is_empty() {
            return Err(ClientAppError::config("SEARCH_COLLECTION must not be empty"));
        }

        Ok(Self {
            connection,
            connection_mode: ConnectionMode::parse(lookup("SEARCH_CONNECTION_MODE").as_deref()),
            retry_interval: Duration::from_secs(retry_interval),
            collection,
            backend: BackendKind::parse(lookup("SEARCH_BACKEND").as_deref())?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Invalid value, using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<ClientSettings, ClientAppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientSettings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[]).unwrap();

        assert_eq!(settings.connection.cluster_name, "elasticsearch-cluster-tst");
        assert_eq!(settings.connection.endpoints, vec!["http://localhost:9200"]);
        assert_eq!(settings.connection.connect_timeout, Duration::from_secs(10));
        assert_eq!(settings.connection.request_timeout, Duration::from_secs(30));
        assert_eq!(settings.connection.max_batch_size, Some(1000));
        assert!(settings.connection.ignore_cluster_name);
        assert_eq!(settings.connection_mode, ConnectionMode::Retry);
        assert_eq!(settings.retry_interval, Duration::from_secs(15));
        assert_eq!(settings.collection, "twitter");
        assert_eq!(settings.backend, BackendKind::OpenSearch);
    }

    #[test]
    fn test_overrides() {
        let settings = settings(&[
            ("SEARCH_CLUSTER_NAME", "prod"),
            ("SEARCH_ENDPOINTS", "http://a:9200, b:9200 ,"),
            ("SEARCH_CONNECT_TIMEOUT_SECS", "3"),
            ("SEARCH_REQUEST_TIMEOUT_SECS", "60"),
            ("SEARCH_MAX_BATCH_SIZE", "0"),
            ("SEARCH_VERIFY_CLUSTER_NAME", "true"),
            ("SEARCH_CONNECTION_MODE", "Fail-Fast"),
            ("SEARCH_RETRY_INTERVAL_SECS", "2"),
            ("SEARCH_COLLECTION", "tweets"),
            ("SEARCH_BACKEND", "memory"),
        ])
        .unwrap();

        assert_eq!(settings.connection.cluster_name, "prod");
        assert_eq!(settings.connection.endpoints, vec!["http://a:9200", "b:9200"]);
        assert_eq!(settings.connection.connect_timeout, Duration::from_secs(3));
        assert_eq!(settings.connection.request_timeout, Duration::from_secs(60));
        assert_eq!(settings.connection.max_batch_size, None);
        assert!(!settings.connection.ignore_cluster_name);
        assert_eq!(settings.connection_mode, ConnectionMode::FailFast);
        assert_eq!(settings.retry_interval, Duration::from_secs(2));
        assert_eq!(settings.collection, "tweets");
        assert_eq!(settings.backend, BackendKind::InMemory);
    }

    #[test]
    fn test_unparseable_numbers_fall_back() {
        let settings = settings(&[
            ("SEARCH_REQUEST_TIMEOUT_SECS", "soon"),
            ("SEARCH_MAX_BATCH_SIZE", "-1"),
            ("SEARCH_CONNECTION_MODE", "sometimes"),
        ])
        .unwrap();

        assert_eq!(settings.connection.request_timeout, Duration::from_secs(30));
        assert_eq!(settings.connection.max_batch_size, Some(1000));
        assert_eq!(settings.connection_mode, ConnectionMode::Retry);
    }

    #[test]
    fn test_invalid_settings() {
        assert!(matches!(
            settings(&[("SEARCH_ENDPOINTS", " , ")]),
            Err(ClientAppError::ConfigError(_))
        ));
        assert!(matches!(
            settings(&[("SEARCH_ENDPOINTS", "ftp://host:21")]),
            Err(ClientAppError::ConfigError(_))
        ));
        assert!(matches!(
            settings(&[("SEARCH_CONNECT_TIMEOUT_SECS", "0")]),
            Err(ClientAppError::ConfigError(_))
        ));
        assert!(matches!(
            settings(&[("SEARCH_COLLECTION", "  ")]),
            Err(ClientAppError::ConfigError(_))
        ));
        assert!(matches!(
            settings(&[("SEARCH_BACKEND", "solr")]),
            Err(ClientAppError::ConfigError(_))
        ));
    }
}
