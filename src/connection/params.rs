//! Connection parameter parsing and validation.
//!
//! This module handles parsing connection strings and building connection
//! parameters with validation.

use crate::error::ConnectionError;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Path of the statement submission endpoint on the coordinator.
pub const STATEMENT_PATH: &str = "/v1/statement";

/// Default number of attempts for retryable requests.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default per-request timeout for submit and cancel calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default coordinator port.
pub const DEFAULT_PORT: u16 = 8080;

/// URL scheme used to reach the coordinator and execution nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scheme {
    /// Unencrypted HTTP (the default)
    #[default]
    Http,
    /// TLS-encrypted HTTPS
    Https,
}

impl Scheme {
    /// The scheme as it appears in a URL.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    /// Whether the transport is encrypted.
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Scheme::Https)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for reaching a Paques coordinator.
///
/// The same port is used for the coordinator and for execution nodes; only
/// the host differs once the coordinator assigns a node.
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    /// Coordinator host
    pub host: String,
    /// Coordinator (and execution node) port
    pub port: u16,
    /// URL scheme
    pub scheme: Scheme,
    /// Timeout applied to submit and cancel requests and to the streaming
    /// GET handshake. Deliberately not applied to streaming consumption.
    pub request_timeout: Duration,
    /// Retry ceiling for transient failures and 503 responses
    pub max_attempts: u32,
}

impl ConnectionParams {
    /// Create parameters with defaults for everything but the host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            scheme: Scheme::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Create a new ConnectionBuilder.
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    /// Build an absolute coordinator URL for the given path.
    pub fn url(&self, path: &str) -> String {
        format!("{}://{}:{}{}", self.scheme, self.host, self.port, path)
    }

    /// The statement submission URL.
    pub fn statement_url(&self) -> String {
        self.url(STATEMENT_PATH)
    }

    /// Build the base URL of an execution node, reusing the configured
    /// scheme and port with the host the coordinator assigned.
    pub fn node_url(&self, node_host: &str) -> String {
        format!("{}://{}:{}", self.scheme, node_host, self.port)
    }
}

impl FromStr for ConnectionParams {
    type Err = ConnectionError;

    /// Parse a connection string in the format:
    /// `paques://host[:port][?param=value&...]`
    ///
    /// Recognized query parameters: `scheme` (`http`/`https`),
    /// `timeout` (seconds), `max_attempts`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = s.trim();

        let rest = url.strip_prefix("paques://").ok_or_else(|| {
            ConnectionError::ParseError("connection string must start with 'paques://'".to_string())
        })?;

        let (host_part, query_string) = match rest.split_once('?') {
            Some((main, query)) => (main, Some(query)),
            None => (rest, None),
        };

        let (host, port) = match host_part.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    ConnectionError::ParseError(format!("invalid port: {}", port))
                })?;
                (host, port)
            }
            None => (host_part, DEFAULT_PORT),
        };

        if host.is_empty() {
            return Err(ConnectionError::ParseError("host is required".to_string()));
        }

        let mut builder = ConnectionBuilder::new().host(host).port(port);

        if let Some(query) = query_string {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let (key, value) = pair.split_once('=').ok_or_else(|| {
                    ConnectionError::ParseError(format!("malformed query parameter: {}", pair))
                })?;
                builder = match key {
                    "scheme" => match value {
                        "http" => builder.scheme(Scheme::Http),
                        "https" => builder.scheme(Scheme::Https),
                        other => {
                            return Err(ConnectionError::ParseError(format!(
                                "unknown scheme: {}",
                                other
                            )))
                        }
                    },
                    "timeout" => {
                        let secs = value.parse::<u64>().map_err(|_| {
                            ConnectionError::InvalidParameter {
                                parameter: "timeout".to_string(),
                                message: format!("not a number of seconds: {}", value),
                            }
                        })?;
                        builder.request_timeout(Duration::from_secs(secs))
                    }
                    "max_attempts" => {
                        let attempts = value.parse::<u32>().map_err(|_| {
                            ConnectionError::InvalidParameter {
                                parameter: "max_attempts".to_string(),
                                message: format!("not a number: {}", value),
                            }
                        })?;
                        builder.max_attempts(attempts)
                    }
                    other => {
                        return Err(ConnectionError::ParseError(format!(
                            "unknown connection parameter: {}",
                            other
                        )))
                    }
                };
            }
        }

        builder.build()
    }
}

/// Builder for constructing `ConnectionParams` with validation.
#[derive(Debug, Clone, Default)]
pub struct ConnectionBuilder {
    host: Option<String>,
    port: Option<u16>,
    scheme: Option<Scheme>,
    request_timeout: Option<Duration>,
    max_attempts: Option<u32>,
}

impl ConnectionBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the coordinator host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the coordinator port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the URL scheme.
    pub fn scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = Some(scheme);
        self
    }

    /// Set the per-request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the retry ceiling.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Build the parameters, validating required fields.
    pub fn build(self) -> Result<ConnectionParams, ConnectionError> {
        let host = self.host.ok_or_else(|| ConnectionError::InvalidParameter {
            parameter: "host".to_string(),
            message: "host is required".to_string(),
        })?;
        if host.is_empty() {
            return Err(ConnectionError::InvalidParameter {
                parameter: "host".to_string(),
                message: "host must not be empty".to_string(),
            });
        }

        let max_attempts = self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        if max_attempts == 0 {
            return Err(ConnectionError::InvalidParameter {
                parameter: "max_attempts".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(ConnectionParams {
            host,
            port: self.port.unwrap_or(DEFAULT_PORT),
            scheme: self.scheme.unwrap_or_default(),
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            max_attempts,
        })
    }
}
