//! Pluggable authentication attachment.
//!
//! Authentication schemes are opaque to the protocol client: an
//! implementation decorates each outgoing request with whatever credentials
//! it carries. The transport refuses to bind any authentication over
//! unencrypted HTTP; that check happens at construction, before the
//! mechanism is ever consulted.

use std::fmt;

/// Attaches credentials to an outgoing request.
pub trait Authentication: Send + Sync + fmt::Debug {
    /// Decorate a request builder with this mechanism's credentials.
    fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder;
}

/// HTTP Basic authentication.
pub struct BasicAuth {
    username: String,
    password: String,
}

impl BasicAuth {
    /// Create a Basic auth attachment.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Authentication for BasicAuth {
    fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.basic_auth(&self.username, Some(&self.password))
    }
}

// Keep the password out of debug output.
impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
