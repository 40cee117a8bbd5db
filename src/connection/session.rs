//! Per-connection session state and protocol header construction.
//!
//! A `ClientSession` carries the identity (`source`, `user`) and the mutable
//! session properties that accompany every request as `X-Paques-*` headers.
//! The coordinator can mutate the properties between requests through the
//! set/clear session directives in response headers; those mutations are
//! applied by the response processor before the next request builds its
//! headers.

use crate::error::ConnectionError;

/// Header carrying the client source identifier.
pub const HEADER_SOURCE: &str = "X-Paques-Source";

/// Header carrying the submitting user.
pub const HEADER_USER: &str = "X-Paques-User";

/// Header carrying the session properties as comma-joined `k=v` pairs.
pub const HEADER_SESSION: &str = "X-Paques-Session";

/// Response header directing the client to upsert session properties.
pub const HEADER_SET_SESSION: &str = "X-Paques-Set-Session";

/// Response header directing the client to drop session properties.
pub const HEADER_CLEAR_SESSION: &str = "X-Paques-Clear-Session";

/// Header names the caller must not override with extra headers.
const RESERVED_HEADERS: [&str; 3] = [HEADER_SOURCE, HEADER_USER, HEADER_SESSION];

/// Session identity and properties for one client connection.
///
/// Property keys and values must not contain `=` or `,`; that is a caller
/// contract rather than a runtime check, matching the wire format. The
/// reader side is tolerant and splits `k=v` on the first `=` only.
#[derive(Debug, Clone)]
pub struct ClientSession {
    source: String,
    user: String,
    /// Insertion-ordered; keys unique, case-sensitive.
    properties: Vec<(String, String)>,
    extra_headers: Vec<(String, String)>,
}

impl ClientSession {
    /// Create a session with no properties or extra headers.
    pub fn new(source: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            user: user.into(),
            properties: Vec::new(),
            extra_headers: Vec::new(),
        }
    }

    /// Create a new SessionBuilder.
    pub fn builder(source: impl Into<String>, user: impl Into<String>) -> SessionBuilder {
        SessionBuilder::new(source, user)
    }

    /// The client source identifier.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The submitting user.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Current session properties in insertion order.
    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }

    /// Look up a single session property.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Upsert a session property, preserving first-insertion order.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.properties.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.properties.push((key, value)),
        }
    }

    /// Remove a session property; absent keys are not an error.
    pub fn clear_property(&mut self, key: &str) {
        self.properties.retain(|(k, _)| k != key);
    }

    /// Build the protocol headers for the next outgoing request:
    /// source, user, the comma-joined session properties, and any
    /// caller-supplied extra headers.
    pub fn headers(&self) -> Vec<(String, String)> {
        let session = self
            .properties
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",");

        let mut headers = vec![
            (HEADER_SOURCE.to_string(), self.source.clone()),
            (HEADER_USER.to_string(), self.user.clone()),
            (HEADER_SESSION.to_string(), session),
        ];
        headers.extend(self.extra_headers.iter().cloned());
        headers
    }

    /// Apply a clear-session directive header value
    /// (comma-separated property names).
    pub(crate) fn apply_clear_directive(&mut self, value: &str) {
        for name in split_header_values(value) {
            self.clear_property(name);
        }
    }

    /// Apply a set-session directive header value
    /// (comma-separated `k=v` pairs, split on the first `=` only).
    pub(crate) fn apply_set_directive(&mut self, value: &str) {
        for entry in split_header_values(value) {
            if let Some((key, val)) = split_property(entry) {
                self.set_property(key, val);
            }
        }
    }
}

/// Split a comma-separated header value, trimming whitespace and dropping
/// empty entries.
pub(crate) fn split_header_values(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|v| !v.is_empty())
}

/// Split a `key=value` entry on the first `=` only.
pub(crate) fn split_property(entry: &str) -> Option<(&str, &str)> {
    entry
        .split_once('=')
        .map(|(k, v)| (k.trim(), v.trim()))
        .filter(|(k, _)| !k.is_empty())
}

/// Builder for `ClientSession` with reserved-header validation.
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    source: String,
    user: String,
    properties: Vec<(String, String)>,
    extra_headers: Vec<(String, String)>,
}

impl SessionBuilder {
    /// Start a builder with the mandatory identity fields.
    pub fn new(source: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            user: user.into(),
            properties: Vec::new(),
            extra_headers: Vec::new(),
        }
    }

    /// Add an initial session property.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    /// Add an extra HTTP header sent with every request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    /// Build the session. Fails if an extra header collides with a reserved
    /// protocol header name.
    pub fn build(self) -> Result<ClientSession, ConnectionError> {
        for (name, _) in &self.extra_headers {
            if RESERVED_HEADERS
                .iter()
                .any(|reserved| reserved.eq_ignore_ascii_case(name))
            {
                return Err(ConnectionError::ReservedHeader(name.clone()));
            }
        }

        let mut session = ClientSession::new(self.source, self.user);
        for (key, value) in self.properties {
            session.set_property(key, value);
        }
        session.extra_headers = self.extra_headers;
        Ok(session)
    }
}
