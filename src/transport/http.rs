//! HTTP transport to the coordinator and execution nodes.
//!
//! Wraps a `reqwest::Client` with session-header construction, the retry
//! policy, and the authentication attachment. Statement submission and
//! cancellation carry the request timeout; the streaming GET only applies
//! it to the connection handshake, never to event consumption.

use reqwest::RequestBuilder;
use serde_json::Value;
use tracing::debug;

use crate::connection::auth::Authentication;
use crate::connection::params::ConnectionParams;
use crate::connection::session::ClientSession;
use crate::error::{ConnectionError, PaquesError, TransportError};
use crate::transport::messages::QueryHandle;
use crate::transport::response::{process_parts, status_error};
use crate::transport::retry::{ExponentialBackoff, RetryPolicy};

/// HTTP transport for one client connection.
///
/// Owns the session state: response processing mutates the session, and the
/// next outgoing request observes the mutation when it builds its headers.
pub struct HttpTransport {
    client: reqwest::Client,
    params: ConnectionParams,
    session: ClientSession,
    auth: Option<Box<dyn Authentication>>,
    retry: RetryPolicy,
}

impl HttpTransport {
    /// Build a transport.
    ///
    /// Fails if an authentication mechanism is supplied while the scheme is
    /// unencrypted; the scheme is checked before the mechanism is attached.
    pub fn new(
        params: ConnectionParams,
        session: ClientSession,
        auth: Option<Box<dyn Authentication>>,
    ) -> Result<Self, ConnectionError> {
        if auth.is_some() && !params.scheme.is_encrypted() {
            return Err(ConnectionError::AuthRequiresTls);
        }

        let client = reqwest::Client::builder()
            .connect_timeout(params.request_timeout)
            .build()
            .map_err(|e| ConnectionError::InvalidParameter {
                parameter: "http client".to_string(),
                message: e.to_string(),
            })?;

        let retry = RetryPolicy::new(params.max_attempts);

        Ok(Self {
            client,
            params,
            session,
            auth,
            retry,
        })
    }

    /// Replace the retry backoff schedule.
    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.retry = self.retry.with_backoff(backoff);
        self
    }

    /// The connection parameters.
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// The current session state.
    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    /// Submit a statement to the coordinator.
    ///
    /// POST to `/v1/statement` with the statement as the JSON body and the
    /// current session headers, retried on transient failures and 503s.
    pub async fn post_statement(
        &self,
        statement: &Value,
    ) -> Result<reqwest::Response, TransportError> {
        let url = self.params.statement_url();
        let headers = self.session.headers();
        debug!(%url, "submitting statement");

        self.retry
            .run(
                || {
                    let request = self
                        .client
                        .post(&url)
                        .json(statement)
                        .timeout(self.params.request_timeout);
                    let request = self.decorate(request, &headers);
                    async move { request.send().await.map_err(map_reqwest_error) }
                },
                TransportError::is_transient,
                is_service_unavailable,
            )
            .await
    }

    /// Open the event stream on an execution node.
    ///
    /// GET with `event=stream&quid={id}`; the response body is consumed
    /// incrementally by the caller. No per-request timeout is set here: the
    /// client-level connect timeout covers the handshake, and the stream
    /// itself is allowed to run as long as the query produces events.
    pub async fn open_stream(
        &self,
        node_host: &str,
        query_id: &str,
    ) -> Result<reqwest::Response, TransportError> {
        let url = self.params.node_url(node_host);
        let headers = self.session.headers();
        debug!(%url, query_id, "opening event stream");

        let response = self
            .retry
            .run(
                || {
                    let request = self
                        .client
                        .get(&url)
                        .query(&[("event", "stream"), ("quid", query_id)]);
                    let request = self.decorate(request, &headers);
                    async move { request.send().await.map_err(map_reqwest_error) }
                },
                TransportError::is_transient,
                is_service_unavailable,
            )
            .await?;

        check_status(response).await
    }

    /// DELETE a continuation resource to cancel a query.
    pub async fn delete(&self, url: &str) -> Result<reqwest::Response, TransportError> {
        let headers = self.session.headers();
        debug!(%url, "cancelling query");

        self.retry
            .run(
                || {
                    let request = self
                        .client
                        .delete(url)
                        .timeout(self.params.request_timeout);
                    let request = self.decorate(request, &headers);
                    async move { request.send().await.map_err(map_reqwest_error) }
                },
                TransportError::is_transient,
                is_service_unavailable,
            )
            .await
    }

    /// Validate a submission response and extract the execution handle,
    /// applying any session directives it carries.
    pub async fn process_response(
        &mut self,
        response: reqwest::Response,
    ) -> Result<QueryHandle, PaquesError> {
        let response = check_status(response).await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(map_reqwest_error)?;

        process_parts(status, &headers, &body, &mut self.session)
    }

    fn decorate(&self, mut request: RequestBuilder, headers: &[(String, String)]) -> RequestBuilder {
        for (name, value) in headers {
            request = request.header(name, value);
        }
        match &self.auth {
            Some(auth) => auth.apply(request),
            None => request,
        }
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("params", &self.params)
            .field("session", &self.session)
            .field("auth", &self.auth)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Reject non-2xx responses, carrying a body snippet when one is present.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.ok().filter(|b| !b.is_empty());
    Err(status_error(status.as_u16(), body))
}

fn is_service_unavailable(response: &reqwest::Response) -> bool {
    response.status().as_u16() == 503
}

/// Fold reqwest's error surface into the transport taxonomy. Timeouts and
/// connection failures are the transient kinds the retry policy re-attempts.
fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() {
        TransportError::ConnectionFailed(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}
