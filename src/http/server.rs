//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, CORS, error rendering)
//! - Bind server to a plain or TLS listener
//! - Dispatch authorized requests to the stream relay or buffered translator
//! - Record request metrics

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    extract::{
        rejection::{BytesRejection, FailedToBufferBody},
        DefaultBodyLimit, FromRequest, Request, State,
    },
    http::{
        header::{InvalidHeaderValue, ALLOW},
        StatusCode,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    cors::CorsLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::landing::landing_page;
use crate::http::request::{request_id, MakeRequestUuidV4, X_REQUEST_ID};
use crate::observability::metrics;
use crate::proxy::models::list_models;
use crate::proxy::stream::relay;
use crate::proxy::translate::forward_buffered;
use crate::proxy::{
    authorize, render_errors, Forwarder, ProxyError, ResponseMode, Sanitizer, UpstreamClient,
};

/// How long TLS connections may drain after shutdown is requested.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors building the server from configuration.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("upstream credential or identity is not a valid header value")]
    Header(#[from] InvalidHeaderValue),

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Application state injected into handlers.
///
/// Everything here is read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub forwarder: Arc<Forwarder>,
    pub upstream: UpstreamClient,
    pub sanitizer: Arc<Sanitizer>,
}

impl AppState {
    pub fn from_config(config: ProxyConfig) -> Result<Self, ServerError> {
        let forwarder = Forwarder::from_config(&config)?;
        let upstream = UpstreamClient::new(&config.upstream, &config.timeouts)?;
        let sanitizer = Sanitizer::from_config(&config);

        Ok(Self {
            config: Arc::new(config),
            forwarder: Arc::new(forwarder),
            upstream,
            sanitizer: Arc::new(sanitizer),
        })
    }
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
    config: Arc<ProxyConfig>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let state = AppState::from_config(config)?;
        let config = state.config.clone();
        Ok(Self {
            router: build_router(state),
            config,
        })
    }

    /// Run the server on a plain TCP listener until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server with TLS until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let handle = axum_server::Handle::new();
        let signal = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            signal.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        tracing::info!(address = %addr, "HTTPS server starting");
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// The router, for driving the server without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Build the Axum router with all middleware layers.
///
/// Layers run outermost-last: the request ID is assigned before the trace
/// span opens, and `render_errors` sits closest to the handlers so every
/// error body it writes still gets CORS and request-ID headers.
///
/// GET routes would answer HEAD implicitly; HEAD is rejected instead.
pub fn build_router(state: AppState) -> Router {
    let sanitizer = state.sanitizer.clone();
    let body_limit = state.config.security.max_body_size;

    Router::new()
        .route(
            "/",
            get(landing_page).post(proxy_handler).head(reject_head),
        )
        .route(
            "/v1/models",
            get(models_handler).post(proxy_handler).head(reject_head),
        )
        .route(
            "/{*path}",
            get(proxy_handler).post(proxy_handler).head(reject_head),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(middleware::from_fn_with_state(sanitizer, render_errors))
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(TraceLayer::new_for_http().make_span_with(make_span))
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuidV4))
}

fn make_span(request: &Request<Body>) -> tracing::Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id(request.headers()),
    )
}

/// Main proxy handler: authorize, then relay or translate.
async fn proxy_handler(State(state): State<AppState>, request: Request) -> Response {
    let start = Instant::now();
    let method = request.method().clone();

    let (response, mode) = match forward(&state, request).await {
        Ok((response, mode)) => (response, mode.as_str()),
        Err(e) => {
            tracing::debug!(status = %e.status(), "Request rejected");
            (e.into_response(), "rejected")
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), mode, start);
    response
}

async fn forward(
    state: &AppState,
    request: Request,
) -> Result<(Response, ResponseMode), ProxyError> {
    authorize(request.headers(), &state.config.auth.public_token)?;

    let request_id = request_id(request.headers()).to_string();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = request.headers().clone();

    let body = Bytes::from_request(request, state)
        .await
        .map_err(|rejection| body_error(rejection, &request_id))?;

    let mode = ResponseMode::classify(&body);
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %uri.path(),
        mode = mode.as_str(),
        "Forwarding request upstream"
    );

    let outbound = state.forwarder.build(method, path_and_query, &headers, body);

    let response = match mode {
        ResponseMode::Stream => relay(&state.upstream, outbound, request_id),
        ResponseMode::Buffered => {
            let response = forward_buffered(&state.upstream, outbound).await?;
            tracing::info!(request_id = %request_id, status = %response.status(), "Upstream status");
            response
        }
    };

    Ok((response, mode))
}

fn body_error(rejection: BytesRejection, request_id: &str) -> ProxyError {
    match rejection {
        BytesRejection::FailedToBufferBody(FailedToBufferBody::LengthLimitError(_)) => {
            tracing::warn!(request_id = %request_id, "Request body over limit");
            ProxyError::BodyTooLarge
        }
        other => {
            tracing::warn!(request_id = %request_id, error = %other, "Failed to read request body");
            ProxyError::BodyUnreadable
        }
    }
}

async fn reject_head() -> Response {
    (StatusCode::METHOD_NOT_ALLOWED, [(ALLOW, "GET,POST")]).into_response()
}

/// Model listing passthrough. No caller-token check.
async fn models_handler(State(state): State<AppState>) -> Response {
    let start = Instant::now();
    let response = list_models(&state.upstream, &state.forwarder)
        .await
        .into_response();
    metrics::record_request("GET", response.status().as_u16(), "models", start);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, Method};
    use tower::ServiceExt;

    fn test_router() -> Router {
        let mut config = ProxyConfig::default();
        config.auth.public_token = "public-tok".into();
        config.upstream.credential = "sk-private".into();
        config.upstream.base_url = "http://127.0.0.1:9".into();
        config.upstream.system_proxy = false;
        HttpServer::new(config).unwrap().router()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn missing_authorization_is_401() {
        let response = test_router()
            .oneshot(
                Request::post("/v1/chat/completions")
                    .body(Body::from(r#"{"model":"x"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        let json = body_json(response).await;
        assert_eq!(json["detail"], "Missing or malformed Authorization header.");
    }

    #[tokio::test]
    async fn wrong_token_is_401_without_leaks() {
        let response = test_router()
            .oneshot(
                Request::post("/v1/chat/completions")
                    .header(header::AUTHORIZATION, "Bearer guess")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let text = body_json(response).await.to_string();
        assert!(text.contains("Invalid authentication token."));
        assert!(!text.contains("public-tok"));
        assert!(!text.contains("sk-private"));
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let response = test_router()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_REQUEST_ID));
    }

    #[tokio::test]
    async fn caller_request_id_is_echoed() {
        let response = test_router()
            .oneshot(
                Request::get("/anything")
                    .header(X_REQUEST_ID, "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[X_REQUEST_ID], "req-42");
    }

    #[tokio::test]
    async fn only_get_and_post_are_routed() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/v1/files/abc")
                    .header(header::AUTHORIZATION, "Bearer public-tok")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn oversized_body_is_413() {
        let mut config = ProxyConfig::default();
        config.auth.public_token = "public-tok".into();
        config.upstream.credential = "sk-private".into();
        config.security.max_body_size = 8;
        let router = HttpServer::new(config).unwrap().router();

        let response = router
            .oneshot(
                Request::post("/v1/chat/completions")
                    .header(header::AUTHORIZATION, "Bearer public-tok")
                    .body(Body::from("0123456789abcdef"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let json = body_json(response).await;
        assert_eq!(json["detail"], "Request body too large.");
    }

    #[tokio::test]
    async fn head_is_not_forwarded() {
        for uri in ["/", "/v1/models", "/v1/files"] {
            let response = test_router()
                .oneshot(
                    Request::builder()
                        .method(Method::HEAD)
                        .uri(uri)
                        .header(header::AUTHORIZATION, "Bearer public-tok")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{uri}");
            assert_eq!(response.headers()[header::ALLOW], "GET,POST");
        }
    }

    #[tokio::test]
    async fn broken_body_is_400_not_413() {
        let chunks = futures_util::stream::iter(vec![
            Ok(Bytes::from_static(b"{\"model\":")),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "client went away",
            )),
        ]);

        let response = test_router()
            .oneshot(
                Request::post("/v1/chat/completions")
                    .header(header::AUTHORIZATION, "Bearer public-tok")
                    .body(Body::from_stream(chunks))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["detail"], "Request body could not be read.");
    }

    #[test]
    fn invalid_credential_fails_startup() {
        let mut config = ProxyConfig::default();
        config.upstream.credential = "line\nbreak".into();
        assert!(matches!(
            HttpServer::new(config),
            Err(ServerError::Header(_))
        ));
    }
}
