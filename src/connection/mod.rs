//! Connection configuration and session state.
//!
//! This module holds everything the client knows before a statement is ever
//! submitted: coordinator address and timeouts (`params`), the per-connection
//! session identity and properties (`session`), and the pluggable
//! authentication attachment (`auth`).

pub mod auth;
pub mod params;
pub mod session;

pub use auth::{Authentication, BasicAuth};
pub use params::{ConnectionBuilder, ConnectionParams, Scheme};
pub use session::{ClientSession, SessionBuilder};
