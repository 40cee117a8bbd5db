//! Error types for paques-client.
//!
//! This module defines domain-specific error types organized by functional area.

use std::fmt;
use thiserror::Error;

/// Top-level error type encompassing all possible errors.
#[derive(Error, Debug)]
pub enum PaquesError {
    /// Connection construction and validation errors
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// HTTP transport errors
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Coordinator-reported query errors and lifecycle violations
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Wire-format decoding errors
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Errors raised while building a client connection.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Authentication must not be attached to an unencrypted transport
    #[error("cannot use authentication with HTTP")]
    AuthRequiresTls,

    /// A caller-supplied header collides with a reserved protocol header
    #[error("cannot override reserved HTTP header {0}")]
    ReservedHeader(String),

    /// Invalid connection parameter
    #[error("invalid connection parameter '{parameter}': {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Connection string parsing error
    #[error("failed to parse connection string: {0}")]
    ParseError(String),
}

/// Errors raised by the HTTP transport layer.
///
/// `ConnectionFailed` and `Timeout` are transient: the retry wrapper
/// re-attempts them up to the configured ceiling. `ServiceUnavailable` is
/// the 503 specialization of `Http`, retried at the response level.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to reach the coordinator or execution node
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Request timed out
    #[error("request timed out: {0}")]
    Timeout(String),

    /// HTTP 503 from the coordinator
    #[error("error 503: service unavailable")]
    ServiceUnavailable,

    /// Generic non-2xx response
    #[error("error {status}{}", body_suffix(.body))]
    Http { status: u16, body: Option<String> },

    /// Any other client-side request failure
    #[error("request failed: {0}")]
    Request(String),
}

impl TransportError {
    /// Whether this error is transient and worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectionFailed(_) | TransportError::Timeout(_)
        )
    }
}

fn body_suffix(body: &Option<String>) -> String {
    match body {
        Some(b) if !b.is_empty() => format!(": {}", b),
        _ => String::new(),
    }
}

/// Error detail reported by the coordinator in a response `error` object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerError {
    /// Numeric error code
    pub error_code: Option<i64>,
    /// Symbolic error name
    pub error_name: Option<String>,
    /// Human-readable message
    pub message: Option<String>,
    /// Statement location (line, column) the error points at
    pub error_location: Option<(u32, u32)>,
    /// Failure type from the server-side failure info, when present
    pub failure_type: Option<String>,
}

impl ServerError {
    /// Build a client-originated error with just a message.
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// The message, with a fixed placeholder since the server does not
    /// always populate one.
    pub fn message(&self) -> &str {
        self.message
            .as_deref()
            .unwrap_or("Paques did not return an error message")
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "name={}, message=\"{}\"",
            self.error_name.as_deref().unwrap_or("<unknown>"),
            self.message()
        )?;
        if let Some((line, column)) = self.error_location {
            write!(f, " at {}:{}", line, column)?;
        }
        Ok(())
    }
}

/// Errors related to query execution.
#[derive(Error, Debug)]
pub enum QueryError {
    /// Coordinator error of type EXTERNAL; immediately fatal, never retried
    #[error("external error: {0}")]
    External(ServerError),

    /// Caller-facing error (bad statement, operations on a cancelled query)
    #[error("user error: {0}")]
    User(ServerError),

    /// Server-side failure; carries the failure type when the server sent one
    #[error("internal error: {0}")]
    Internal(ServerError),

    /// Operation issued in a lifecycle state that does not permit it
    #[error("invalid query state: {0}")]
    InvalidState(String),
}

impl QueryError {
    /// The user-error raised when execution is attempted after `cancel()`.
    pub fn cancelled() -> Self {
        QueryError::User(ServerError::from_message("query has been cancelled"))
    }
}

/// Errors raised when a response does not match the expected wire shape.
///
/// These are hard failures, not part of the retry contract: a missing key
/// means a protocol-version mismatch, not a transient condition.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Response body was not valid JSON of the expected shape
    #[error("invalid response body: {0}")]
    Json(#[from] serde_json::Error),

    /// A required field was absent from the decoded response
    #[error("missing expected response field: {0}")]
    MissingField(&'static str),

    /// The query plan named no execution node to stream from
    #[error("no execution node in query plan")]
    NoExecutionNode,

    /// The SSE stream broke mid-consumption
    #[error("event stream failed: {0}")]
    Stream(String),
}
