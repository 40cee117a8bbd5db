//! Wire message types for the Paques HTTP protocol.
//!
//! Response bodies and stream events are decoded into these structures at
//! the transport boundary; required-field validation happens in the
//! response processor rather than through unchecked dynamic lookups.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ServerError;

/// Response body of a statement submission.
#[derive(Debug, Clone, Deserialize)]
pub struct StatementResponse {
    /// Submission payload; absent when the coordinator reports an error
    #[serde(default)]
    pub data: Option<StatementData>,
    /// Coordinator error object, when the statement was rejected
    #[serde(default)]
    pub error: Option<ErrorInfo>,
    /// Event tag the coordinator attached to this response
    #[serde(default)]
    pub event: Option<String>,
}

/// `data` member of a statement response.
#[derive(Debug, Clone, Deserialize)]
pub struct StatementData {
    #[serde(default)]
    pub body: Option<StatementBody>,
}

/// `data.body` member carrying the query id and execution plan.
#[derive(Debug, Clone, Deserialize)]
pub struct StatementBody {
    /// Coordinator-assigned query id
    #[serde(default)]
    pub quid: Option<String>,
    /// Execution plan naming the nodes that will serve the stream
    #[serde(default)]
    pub explain: Option<ExplainInfo>,
}

/// Execution plan excerpt: the nodes assigned to the query.
#[derive(Debug, Clone, Deserialize)]
pub struct ExplainInfo {
    #[serde(default)]
    pub nodes: Vec<NodeInfo>,
}

/// One execution node in the plan.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeInfo {
    /// Host the node publishes its streaming endpoint on
    #[serde(default)]
    pub publish_host: Option<String>,
}

/// Coordinator error object embedded in a response body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub error_name: Option<String>,
    /// EXTERNAL, USER_ERROR, or a server-internal type
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error_location: Option<ErrorLocation>,
    #[serde(default)]
    pub failure_info: Option<FailureInfo>,
}

/// Statement location an error points at.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorLocation {
    pub line_number: u32,
    pub column_number: u32,
}

/// Server-side failure detail.
#[derive(Debug, Clone, Deserialize)]
pub struct FailureInfo {
    #[serde(rename = "type", default)]
    pub failure_type: Option<String>,
}

impl From<ErrorInfo> for ServerError {
    fn from(info: ErrorInfo) -> Self {
        ServerError {
            error_code: info.error_code,
            error_name: info.error_name,
            message: info.message,
            error_location: info
                .error_location
                .map(|loc| (loc.line_number, loc.column_number)),
            failure_type: info.failure_info.and_then(|f| f.failure_type),
        }
    }
}

/// One decoded event from the execution node's SSE stream.
///
/// Fields are lenient: the stream carries control events alongside data
/// events, and the assembler decides per event whether a payload is usable.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamEvent {
    /// Event tag; `"data"` marks a row-set payload
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub data: Option<EventData>,
}

/// `data` member of a stream event.
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub rset: Option<RowSet>,
}

/// A batch of rows for one named dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct RowSet {
    /// Dataset (table) name this batch belongs to
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

/// Execution handle produced by a successful statement submission.
///
/// Immutable once created; consumed by the streaming phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryHandle {
    /// Coordinator-assigned query id
    pub query_id: String,
    /// Host of the execution node serving the event stream
    pub node_host: String,
    /// Event tag from the submission response, when present
    pub event: Option<String>,
}
