//! Query lifecycle controller.
//!
//! A `QueryExecution` owns one statement's journey: submit it to the
//! coordinator, resolve the assigned execution node, consume the node's
//! event stream, and assemble the results. Cancellation is cooperative and
//! idempotent.

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{PaquesError, ProtocolError, QueryError};
use crate::query::results::QueryResults;
use crate::transport::http::HttpTransport;
use crate::transport::messages::{QueryHandle, StreamEvent};
use crate::transport::response::status_error;

/// Lifecycle state of one query.
///
/// `Created → Submitted → Streaming → Finished`, with `Cancelled` reachable
/// any time before `Finished` and `Failed` entered on unrecoverable errors.
/// Nothing transitions out of `Finished` or `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    /// Built, not yet submitted
    Created,
    /// Accepted by the coordinator; execution node assigned
    Submitted,
    /// Consuming the node's event stream
    Streaming,
    /// Stream consumed and results assembled
    Finished,
    /// Cancelled by the caller
    Cancelled,
    /// An unrecoverable error surfaced
    Failed,
}

impl QueryState {
    /// Whether the query reached a state that permits no further work.
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryState::Finished | QueryState::Cancelled)
    }
}

/// Execution of one PQL statement.
pub struct QueryExecution {
    transport: HttpTransport,
    statement: Value,
    state: QueryState,
    handle: Option<QueryHandle>,
    /// Continuation resource for incremental polling. The streaming flow
    /// never populates it; it exists as the cancellation DELETE target,
    /// recorded through `set_continuation_uri`.
    next_uri: Option<String>,
    events: Vec<StreamEvent>,
}

impl QueryExecution {
    /// Create an execution for a statement. The statement may be the query
    /// text or a structured request object.
    pub fn new(transport: HttpTransport, statement: impl Into<Value>) -> Self {
        Self {
            transport,
            statement: statement.into(),
            state: QueryState::Created,
            handle: None,
            next_uri: None,
            events: Vec::new(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> QueryState {
        self.state
    }

    /// The coordinator-assigned query id, once submitted.
    pub fn query_id(&self) -> Option<&str> {
        self.handle.as_ref().map(|h| h.query_id.as_str())
    }

    /// The execution handle, once submitted.
    pub fn handle(&self) -> Option<&QueryHandle> {
        self.handle.as_ref()
    }

    /// The decoded events accumulated from the stream so far.
    pub fn events(&self) -> &[StreamEvent] {
        &self.events
    }

    /// The continuation resource `cancel()` will DELETE, when one is set.
    pub fn continuation_uri(&self) -> Option<&str> {
        self.next_uri.as_deref()
    }

    /// Record the continuation resource to DELETE on cancellation. Absent a
    /// continuation, `cancel()` only transitions state locally.
    pub fn set_continuation_uri(&mut self, uri: impl Into<String>) {
        self.next_uri = Some(uri.into());
    }

    /// Whether the stream has been fully consumed.
    pub fn is_finished(&self) -> bool {
        self.state == QueryState::Finished
    }

    /// Whether the query has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.state == QueryState::Cancelled
    }

    /// Submit the statement to the coordinator and store the execution
    /// handle. Transitions `Created → Submitted`.
    pub async fn submit(&mut self) -> Result<QueryHandle, PaquesError> {
        match self.state {
            QueryState::Created => {}
            QueryState::Cancelled => return Err(QueryError::cancelled().into()),
            other => {
                return Err(
                    QueryError::InvalidState(format!("cannot submit in state {:?}", other)).into(),
                )
            }
        }

        let response = match self.transport.post_statement(&self.statement).await {
            Ok(response) => response,
            Err(err) => return self.fail(err),
        };
        let handle = match self.transport.process_response(response).await {
            Ok(handle) => handle,
            Err(err) => return self.fail(err),
        };

        debug!(query_id = %handle.query_id, node = %handle.node_host, "query submitted");
        self.handle = Some(handle.clone());
        self.state = QueryState::Submitted;
        Ok(handle)
    }

    /// Consume the execution node's event stream and assemble the results.
    /// Transitions `Submitted → Streaming → Finished`.
    ///
    /// Events are decoded incrementally as the node delivers them; the
    /// response body is never buffered whole. Events whose data payload is
    /// not valid JSON are skipped, since the stream may carry control
    /// frames alongside row batches.
    pub async fn stream(&mut self) -> Result<QueryResults, PaquesError> {
        match self.state {
            QueryState::Submitted => {}
            QueryState::Cancelled => return Err(QueryError::cancelled().into()),
            other => {
                return Err(
                    QueryError::InvalidState(format!("cannot stream in state {:?}", other)).into(),
                )
            }
        }

        // Checked above: Submitted implies a stored handle.
        let (node_host, query_id) = match &self.handle {
            Some(handle) => (handle.node_host.clone(), handle.query_id.clone()),
            None => {
                return Err(QueryError::InvalidState("submitted without handle".into()).into())
            }
        };

        self.state = QueryState::Streaming;

        let response = match self.transport.open_stream(&node_host, &query_id).await {
            Ok(response) => response,
            Err(err) => return self.fail(err),
        };

        let mut sse = response.bytes_stream().eventsource();
        while let Some(frame) = sse.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(err) => return self.fail(ProtocolError::Stream(err.to_string())),
            };
            match serde_json::from_str::<StreamEvent>(&frame.data) {
                Ok(event) => self.events.push(event),
                Err(err) => {
                    warn!(error = %err, "skipping undecodable stream event");
                }
            }
        }
        drop(sse);

        let results = QueryResults::assemble(&self.events);
        debug!(
            query_id = %query_id,
            tables = results.tables().len(),
            events = self.events.len(),
            "stream finished"
        );
        self.state = QueryState::Finished;
        Ok(results)
    }

    /// Cancel the query.
    ///
    /// No-op once finished, idempotent once cancelled. When a continuation
    /// resource exists, a DELETE is issued; the server acknowledges with
    /// 204 No Content, and any other status surfaces through the usual
    /// response-error path. After cancellation, `submit()` and `stream()`
    /// reject with the user-error kind and no further network operations
    /// are issued.
    pub async fn cancel(&mut self) -> Result<(), PaquesError> {
        if self.state.is_terminal() {
            return Ok(());
        }

        self.state = QueryState::Cancelled;

        let Some(uri) = self.next_uri.clone() else {
            return Ok(());
        };

        let response = self.transport.delete(&uri).await?;
        let status = response.status().as_u16();
        if status == 204 {
            return Ok(());
        }
        let body = response.text().await.ok().filter(|b| !b.is_empty());
        Err(status_error(status, body).into())
    }

    fn fail<T>(&mut self, err: impl Into<PaquesError>) -> Result<T, PaquesError> {
        self.state = QueryState::Failed;
        Err(err.into())
    }
}

impl std::fmt::Debug for QueryExecution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecution")
            .field("state", &self.state)
            .field("handle", &self.handle)
            .field("events", &self.events.len())
            .finish()
    }
}
