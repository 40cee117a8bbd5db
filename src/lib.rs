//! # paques-client
//!
//! Rust client for the Paques distributed-query engine. A statement is
//! submitted to the coordinator over HTTP, the coordinator assigns an
//! execution node, and result rows stream back over a server-sent-event
//! channel, grouped into named tabular datasets.
//!
//! ## Example
//!
//! ```no_run
//! # use paques_client::*;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let params = ConnectionParams::builder()
//!     .host("coordinator.example.com")
//!     .port(7700)
//!     .build()?;
//! let session = ClientSession::builder("my-app", "alice")
//!     .property("locale", "en_US")
//!     .build()?;
//! let transport = HttpTransport::new(params, session, None)?;
//!
//! let mut query = QueryExecution::new(transport, "web_logs | pick url, status");
//! query.submit().await?;
//! let results = query.stream().await?;
//!
//! for name in results.table_names() {
//!     let table = results.table(name).expect("just listed");
//!     println!("{}: {} rows", name, table.rows().len());
//! }
//! # Ok(())
//! # }
//! ```

// Module declarations
pub mod connection;
pub mod error;
pub mod query;
pub mod transport;

// Re-export public API
pub use connection::{
    Authentication, BasicAuth, ClientSession, ConnectionBuilder, ConnectionParams, Scheme,
    SessionBuilder,
};
pub use error::{
    ConnectionError, PaquesError, ProtocolError, QueryError, ServerError, TransportError,
};
pub use query::{QueryExecution, QueryResults, QueryState, ResultTable};
pub use transport::{ExponentialBackoff, HttpTransport, Jitter, QueryHandle, RetryPolicy, StreamEvent};
