//! HTTP clients for the upstream API.
//!
//! Two pooled clients share the same connect timeout. The buffered client
//! also carries a total request timeout; the streaming client has none,
//! since event streams may sit idle between events for a long time.

use std::time::Duration;

use crate::config::{TimeoutConfig, UpstreamConfig};
use crate::proxy::forward::OutboundRequest;

#[derive(Clone)]
pub struct UpstreamClient {
    buffered: reqwest::Client,
    streaming: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(upstream: &UpstreamConfig, timeouts: &TimeoutConfig) -> Result<Self, reqwest::Error> {
        let connect = Duration::from_secs(timeouts.connect_secs);

        let buffered = builder(upstream, connect)
            .timeout(Duration::from_secs(timeouts.buffered_secs))
            .build()?;
        let streaming = builder(upstream, connect).build()?;

        Ok(Self {
            buffered,
            streaming,
        })
    }

    /// Send with the bounded timeout. The whole exchange, body included, must
    /// finish inside it.
    pub async fn send_buffered(
        &self,
        request: OutboundRequest,
    ) -> Result<reqwest::Response, reqwest::Error> {
        send(&self.buffered, request).await
    }

    /// Send without a read timeout.
    pub async fn send_streaming(
        &self,
        request: OutboundRequest,
    ) -> Result<reqwest::Response, reqwest::Error> {
        send(&self.streaming, request).await
    }
}

fn builder(upstream: &UpstreamConfig, connect: Duration) -> reqwest::ClientBuilder {
    // Redirects would be followed with the upstream credential attached.
    let builder = reqwest::Client::builder()
        .connect_timeout(connect)
        .redirect(reqwest::redirect::Policy::none());

    if upstream.system_proxy {
        builder
    } else {
        builder.no_proxy()
    }
}

async fn send(
    client: &reqwest::Client,
    request: OutboundRequest,
) -> Result<reqwest::Response, reqwest::Error> {
    client
        .request(request.method, request.url)
        .headers(request.headers)
        .body(request.body)
        .send()
        .await
}
