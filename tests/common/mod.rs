//! Common test utilities for paques-client integration tests.
//!
//! Provides a scripted stub coordinator: a bare `tokio` TCP listener that
//! speaks just enough HTTP/1.1 to serve canned submit, stream, and cancel
//! responses, while recording every request it receives. Tests point a real
//! client at the stub's port; the same listener plays both the coordinator
//! and the execution node, so submit responses advertise `127.0.0.1` as the
//! publish host.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Install the tracing subscriber once per test process. Output is gated by
/// `RUST_LOG`, so runs are quiet unless a filter is set.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// One request the stub received, head and body.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path plus query string, e.g. `/?event=stream&quid=Q1`
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    /// Look up a header value, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Scripted responses per method. Each request pops the next script entry;
/// the last entry repeats once the script is exhausted.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub post: Vec<String>,
    pub get: Vec<String>,
    pub delete: Vec<String>,
}

/// A running stub coordinator.
pub struct StubCoordinator {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: tokio::task::JoinHandle<()>,
}

impl StubCoordinator {
    /// Start the stub on a random loopback port.
    pub async fn start(script: Script) -> Self {
        init_tracing();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub local addr");

        let requests: Arc<Mutex<Vec<RecordedRequest>>> = Arc::new(Mutex::new(Vec::new()));
        let script = Arc::new(script);
        let post_hits = Arc::new(AtomicUsize::new(0));
        let get_hits = Arc::new(AtomicUsize::new(0));
        let delete_hits = Arc::new(AtomicUsize::new(0));

        let recorded = requests.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let recorded = recorded.clone();
                let script = script.clone();
                let post_hits = post_hits.clone();
                let get_hits = get_hits.clone();
                let delete_hits = delete_hits.clone();
                tokio::spawn(async move {
                    serve_connection(stream, recorded, script, post_hits, get_hits, delete_hits)
                        .await;
                });
            }
        });

        Self {
            addr,
            requests,
            handle,
        }
    }

    /// Port the stub is listening on.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Everything received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    /// Requests with the given method.
    pub fn requests_with_method(&self, method: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }
}

impl Drop for StubCoordinator {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Serve one connection; reqwest pools connections, so loop until EOF.
async fn serve_connection(
    mut stream: TcpStream,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
    script: Arc<Script>,
    post_hits: Arc<AtomicUsize>,
    get_hits: Arc<AtomicUsize>,
    delete_hits: Arc<AtomicUsize>,
) {
    loop {
        let Some(request) = read_request(&mut stream).await else {
            return;
        };

        let method = request.method.clone();
        let (entries, hits) = match method.as_str() {
            "POST" => (&script.post, &post_hits),
            "GET" => (&script.get, &get_hits),
            "DELETE" => (&script.delete, &delete_hits),
            _ => {
                recorded.lock().expect("requests lock").push(request);
                let _ = stream
                    .write_all(http_response(405, "Method Not Allowed", &[], "").as_bytes())
                    .await;
                continue;
            }
        };

        recorded.lock().expect("requests lock").push(request);

        let response = if entries.is_empty() {
            http_response(404, "Not Found", &[], "")
        } else {
            let index = hits.fetch_add(1, Ordering::SeqCst).min(entries.len() - 1);
            entries[index].clone()
        };

        if stream.write_all(response.as_bytes()).await.is_err() {
            return;
        }
    }
}

/// Read one HTTP/1.1 request off the stream. Returns `None` on EOF.
async fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    // Head: everything up to the blank line.
    let head_end = loop {
        if let Some(pos) = find_head_end(&buf) {
            break pos;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = lines.next()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| {
            line.split_once(':')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        })
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    // Body: whatever followed the head, then the remainder by length.
    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    Some(RecordedRequest {
        method,
        target,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Build a raw HTTP/1.1 response with a Content-Length.
pub fn http_response(status: u16, reason: &str, headers: &[(&str, &str)], body: &str) -> String {
    let mut response = format!("HTTP/1.1 {} {}\r\n", status, reason);
    for (name, value) in headers {
        response.push_str(&format!("{}: {}\r\n", name, value));
    }
    response.push_str(&format!("Content-Length: {}\r\n\r\n{}", body.len(), body));
    response
}

/// A 200 JSON response.
pub fn json_response(body: &str) -> String {
    json_response_with_headers(body, &[])
}

/// A 200 JSON response with extra headers (e.g. session directives).
pub fn json_response_with_headers(body: &str, extra: &[(&str, &str)]) -> String {
    let mut headers = vec![("Content-Type", "application/json")];
    headers.extend_from_slice(extra);
    http_response(200, "OK", &headers, body)
}

/// A 200 SSE response whose body carries one frame per payload.
pub fn sse_response(payloads: &[&str]) -> String {
    let body: String = payloads
        .iter()
        .map(|p| format!("data: {}\n\n", p))
        .collect();
    http_response(200, "OK", &[("Content-Type", "text/event-stream")], &body)
}

/// A submit response handing out `quid` and naming `127.0.0.1` (the stub
/// itself) as the execution node.
pub fn submit_response_body(quid: &str) -> String {
    format!(
        r#"{{"data":{{"body":{{"quid":"{}","explain":{{"nodes":[{{"publish_host":"127.0.0.1"}}]}}}}}},"event":"created"}}"#,
        quid
    )
}
