//! Model listing passthrough.
//!
//! A fixed GET to the upstream listing endpoint using the private
//! credential. Callers are not asked for the public token here; see
//! DESIGN.md for why that asymmetry is kept.

use axum::response::Response;

use crate::proxy::client::UpstreamClient;
use crate::proxy::error::ProxyError;
use crate::proxy::forward::Forwarder;
use crate::proxy::translate::forward_buffered;

/// Fetch the upstream model list and pass it through with its status.
pub async fn list_models(
    client: &UpstreamClient,
    forwarder: &Forwarder,
) -> Result<Response, ProxyError> {
    forward_buffered(client, forwarder.models_request()).await
}
