//! Shared utilities for integration testing: a scriptable mock upstream
//! and a relay bound to an ephemeral port.
#![allow(dead_code)]

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::Response;
use axum::Router;
use futures_util::StreamExt;
use tokio::net::TcpListener;

use bearer_relay::config::ProxyConfig;
use bearer_relay::http::HttpServer;
use bearer_relay::lifecycle::Shutdown;

pub const PUBLIC_TOKEN: &str = "relay-public-token";
pub const CREDENTIAL: &str = "sk-upstream-secret";

/// SSE chunks served by `/sse`, in order.
pub const SSE_CHUNKS: [&str; 3] = [
    "data: {\"delta\":\"Hel\"}\n\n",
    "data: {\"delta\":\"lo\"}\n\n",
    "data: [DONE]\n\n",
];

/// Delay before `/slow` answers.
pub const SLOW_RESPONSE: Duration = Duration::from_secs(3);

/// Gap between events on `/sse/slow`.
pub const SLOW_CHUNK_GAP: Duration = Duration::from_millis(800);

/// The only event `/sse/broken` delivers before failing.
pub const BROKEN_FIRST_CHUNK: &str = "data: first\n\n";

/// One request as the upstream saw it.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: Method,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Clone, Default)]
pub struct MockUpstream {
    captured: Arc<Mutex<Vec<Captured>>>,
    released: Arc<AtomicBool>,
}

impl MockUpstream {
    pub fn requests(&self) -> Vec<Captured> {
        self.captured.lock().unwrap().clone()
    }

    pub fn last(&self) -> Captured {
        self.requests().pop().expect("upstream saw no request")
    }

    /// Set once the endless `/sse/forever` body has been dropped.
    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

struct ReleaseFlag(Arc<AtomicBool>);

impl Drop for ReleaseFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Start the mock upstream on an ephemeral port.
///
/// Responses are chosen by path:
/// - `/v1/models`: 200 JSON model list
/// - `/status/418`: 418 JSON error
/// - `/html`: 503 HTML page
/// - `/plain`: 200 non-JSON body with no content type
/// - `/sse`: 200 event stream of `SSE_CHUNKS` with small delays
/// - `/sse/error`: 500 event stream
/// - `/sse/forever`: endless event stream
/// - `/slow`: 200 JSON after `SLOW_RESPONSE`
/// - `/sse/slow`: `SSE_CHUNKS` spaced `SLOW_CHUNK_GAP` apart
/// - `/sse/broken`: one event, then the connection is cut
/// - anything else: 200 `{"ok":true}`
pub async fn start_upstream() -> (SocketAddr, MockUpstream) {
    let mock = MockUpstream::default();
    let app = Router::new().fallback(respond).with_state(mock.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, mock)
}

async fn respond(State(mock): State<MockUpstream>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let path = parts.uri.path().to_string();

    mock.captured.lock().unwrap().push(Captured {
        method: parts.method,
        path_and_query: parts
            .uri
            .path_and_query()
            .map(|pq| pq.to_string())
            .unwrap_or_default(),
        headers: parts.headers,
        body,
    });

    let builder = Response::builder();
    let response = match path.as_str() {
        "/v1/models" => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"object":"list","data":[{"id":"model-a"}]}"#)),
        "/status/418" => builder
            .status(StatusCode::IM_A_TEAPOT)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"error":"short and stout"}"#)),
        "/html" => builder
            .status(StatusCode::SERVICE_UNAVAILABLE)
            .header(header::CONTENT_TYPE, "text/html")
            .body(Body::from("<h1>maintenance</h1>")),
        "/plain" => builder.body(Body::from("not json at all")),
        "/sse" => {
            let chunks = futures_util::stream::iter(SSE_CHUNKS).then(|chunk| async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, Infallible>(Bytes::from_static(chunk.as_bytes()))
            });
            builder
                .header(header::CONTENT_TYPE, "text/event-stream")
                .body(Body::from_stream(chunks))
        }
        "/sse/error" => builder
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .header(header::CONTENT_TYPE, "text/event-stream")
            .body(Body::from("data: {\"error\":\"overloaded\"}\n\n")),
        "/sse/forever" => {
            let guard = ReleaseFlag(mock.released.clone());
            let chunks = futures_util::stream::unfold((0u64, guard), |(n, guard)| async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                let chunk = Bytes::from(format!("data: {}\n\n", n));
                Some((Ok::<_, Infallible>(chunk), (n + 1, guard)))
            });
            builder
                .header(header::CONTENT_TYPE, "text/event-stream")
                .body(Body::from_stream(chunks))
        }
        "/slow" => {
            tokio::time::sleep(SLOW_RESPONSE).await;
            builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"ok":true}"#))
        }
        "/sse/slow" => {
            let chunks = futures_util::stream::iter(SSE_CHUNKS).then(|chunk| async move {
                tokio::time::sleep(SLOW_CHUNK_GAP).await;
                Ok::<_, Infallible>(Bytes::from_static(chunk.as_bytes()))
            });
            builder
                .header(header::CONTENT_TYPE, "text/event-stream")
                .body(Body::from_stream(chunks))
        }
        "/sse/broken" => {
            let chunks = futures_util::stream::iter([
                Ok(Bytes::from_static(BROKEN_FIRST_CHUNK.as_bytes())),
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "upstream crashed")),
            ])
            .then(|item| async move {
                if item.is_err() {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
                item
            });
            builder
                .header(header::CONTENT_TYPE, "text/event-stream")
                .body(Body::from_stream(chunks))
        }
        _ => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"ok":true}"#)),
    };
    response.unwrap()
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Relay config pointed at `upstream`, isolated from system proxy settings.
pub fn relay_config(upstream: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.auth.public_token = PUBLIC_TOKEN.into();
    config.upstream.credential = CREDENTIAL.into();
    config.upstream.base_url = format!("http://{}", upstream);
    config.upstream.system_proxy = false;
    config.timeouts.buffered_secs = 5;
    config
}

pub struct RunningRelay {
    pub base_url: String,
    pub shutdown: Shutdown,
}

impl Drop for RunningRelay {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Serve the relay on an ephemeral port.
pub async fn start_relay(config: ProxyConfig) -> RunningRelay {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let server = HttpServer::new(config).unwrap();

    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    RunningRelay {
        base_url: format!("http://{}", addr),
        shutdown,
    }
}

/// Client that never routes through an environment proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}
