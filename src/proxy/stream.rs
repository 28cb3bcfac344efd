//! Live relay of incremental (event-stream) responses.
//!
//! # Responsibilities
//! - Open the upstream call with no read timeout
//! - Forward chunks to the caller in arrival order, untouched
//! - Tear the upstream connection down on every exit path
//!
//! # Design Decisions
//! - A spawned pump task feeds a bounded channel that backs the response body
//! - Caller disconnect drops the receiver; the pump watches `Sender::closed`
//!   so the upstream is released even while it is silent
//! - The caller always sees 200 + `text/event-stream`; upstream status is
//!   only logged, since headers are already on the wire when chunks flow
//! - Upstream failure ends the body with an error so the caller observes a
//!   truncated transfer rather than a clean end

use std::io;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderValue;
use axum::response::Response;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::observability::metrics;
use crate::proxy::client::UpstreamClient;
use crate::proxy::forward::{OutboundRequest, EVENT_STREAM};

/// Chunks buffered between the upstream reader and the caller writer.
const RELAY_BUFFER: usize = 16;

type Chunk = Result<Bytes, io::Error>;

/// Start relaying `request` and return the caller-facing response at once.
///
/// Must be called from within a Tokio runtime.
pub fn relay(client: &UpstreamClient, request: OutboundRequest, request_id: String) -> Response {
    let (tx, rx) = mpsc::channel::<Chunk>(RELAY_BUFFER);
    tokio::spawn(pump(client.clone(), request, tx, request_id));

    let mut response = Response::new(Body::from_stream(ReceiverStream::new(rx)));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(EVENT_STREAM));
    response
}

/// Why a relay stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelayEnd {
    Completed,
    CallerGone,
    UpstreamFailed,
}

impl RelayEnd {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::CallerGone => "caller_gone",
            Self::UpstreamFailed => "upstream_failed",
        }
    }
}

async fn pump(
    client: UpstreamClient,
    request: OutboundRequest,
    tx: mpsc::Sender<Chunk>,
    request_id: String,
) {
    let start = Instant::now();
    let (end, chunks, bytes) = run_relay(&client, request, &tx, &request_id).await;

    metrics::record_stream_end(end.as_str(), start);
    tracing::info!(
        request_id = %request_id,
        outcome = end.as_str(),
        chunks,
        bytes,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Stream relay finished"
    );
}

async fn run_relay(
    client: &UpstreamClient,
    request: OutboundRequest,
    tx: &mpsc::Sender<Chunk>,
    request_id: &str,
) -> (RelayEnd, u64, u64) {
    let upstream = tokio::select! {
        _ = tx.closed() => return (RelayEnd::CallerGone, 0, 0),
        result = client.send_streaming(request) => result,
    };

    let response = match upstream {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Upstream stream connection failed");
            metrics::record_upstream_error("stream");
            let _ = tx.send(Err(upstream_error())).await;
            return (RelayEnd::UpstreamFailed, 0, 0);
        }
    };

    let status = response.status();
    if !status.is_success() {
        tracing::warn!(
            request_id = %request_id,
            status = %status,
            "Upstream answered a streaming request with a non-success status; relaying body as-is"
        );
    }

    let upstream = response.bytes_stream();
    tokio::pin!(upstream);
    let mut chunks = 0u64;
    let mut bytes = 0u64;

    loop {
        tokio::select! {
            _ = tx.closed() => return (RelayEnd::CallerGone, chunks, bytes),
            next = upstream.next() => match next {
                Some(Ok(chunk)) => {
                    chunks += 1;
                    bytes += chunk.len() as u64;
                    metrics::record_stream_chunk();
                    if tx.send(Ok(chunk)).await.is_err() {
                        return (RelayEnd::CallerGone, chunks, bytes);
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(request_id = %request_id, error = %e, chunks, "Upstream stream broke mid-relay");
                    metrics::record_upstream_error("stream");
                    let _ = tx.send(Err(upstream_error())).await;
                    return (RelayEnd::UpstreamFailed, chunks, bytes);
                }
                None => return (RelayEnd::Completed, chunks, bytes),
            },
        }
    }
}

fn upstream_error() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "upstream stream ended abnormally")
}
