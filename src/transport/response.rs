//! Coordinator response processing.
//!
//! Validates HTTP responses, classifies coordinator error objects into the
//! typed error taxonomy, applies session-property directives from response
//! headers, and extracts the execution handle. Decoding is typed: a missing
//! required key is a protocol error, never an unchecked lookup.

use reqwest::header::HeaderMap;
use tracing::debug;

use crate::connection::session::{ClientSession, HEADER_CLEAR_SESSION, HEADER_SET_SESSION};
use crate::error::{PaquesError, ProtocolError, QueryError, TransportError};
use crate::transport::messages::{ErrorInfo, QueryHandle, StatementResponse};

/// Map a non-success status to its transport error. 503 gets its own
/// variant so the retry layer can recognize it.
pub(crate) fn status_error(status: u16, body: Option<String>) -> TransportError {
    if status == 503 {
        TransportError::ServiceUnavailable
    } else {
        TransportError::Http { status, body }
    }
}

/// Classify a coordinator error object by its `errorType`.
///
/// EXTERNAL and USER_ERROR are recognized explicitly; anything else is a
/// server-internal failure. Every error object aborts response processing:
/// classification happens before session directives or handle extraction
/// are considered, so an EXTERNAL error can never leave half-processed
/// session state behind.
pub(crate) fn classify_error(info: ErrorInfo) -> QueryError {
    match info.error_type.as_deref() {
        Some("EXTERNAL") => QueryError::External(info.into()),
        Some("USER_ERROR") => QueryError::User(info.into()),
        _ => QueryError::Internal(info.into()),
    }
}

/// Process a decoded statement response: surface coordinator errors, apply
/// session directives, and extract the execution handle.
///
/// `status` must already be a success status; the transport checks it (and
/// reads the body) before calling here.
pub(crate) fn process_parts(
    status: u16,
    headers: &HeaderMap,
    body: &str,
    session: &mut ClientSession,
) -> Result<QueryHandle, PaquesError> {
    let response: StatementResponse = serde_json::from_str(body).map_err(ProtocolError::Json)?;
    debug!(status, body, "coordinator response");

    if let Some(error) = response.error {
        return Err(classify_error(error).into());
    }

    apply_session_directives(headers, session);

    let statement_body = response
        .data
        .ok_or(ProtocolError::MissingField("data"))?
        .body
        .ok_or(ProtocolError::MissingField("data.body"))?;

    let query_id = statement_body
        .quid
        .ok_or(ProtocolError::MissingField("data.body.quid"))?;

    let node_host = statement_body
        .explain
        .ok_or(ProtocolError::MissingField("data.body.explain"))?
        .nodes
        .into_iter()
        .next()
        .ok_or(ProtocolError::NoExecutionNode)?
        .publish_host
        .ok_or(ProtocolError::MissingField(
            "data.body.explain.nodes[0].publish_host",
        ))?;

    Ok(QueryHandle {
        query_id,
        node_host,
        event: response.event,
    })
}

/// Apply clear-session and set-session directives found in response
/// headers. Clears run before sets, and both run before the next request
/// rebuilds its headers.
fn apply_session_directives(headers: &HeaderMap, session: &mut ClientSession) {
    for value in headers.get_all(HEADER_CLEAR_SESSION) {
        if let Ok(value) = value.to_str() {
            session.apply_clear_directive(value);
        }
    }
    for value in headers.get_all(HEADER_SET_SESSION) {
        if let Ok(value) = value.to_str() {
            session.apply_set_directive(value);
        }
    }
}
