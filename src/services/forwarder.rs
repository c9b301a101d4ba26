//! Stream forwarder
//!
//! Reverse-proxies one upstream GET: status and headers are copied, the
//! body is relayed chunk by chunk as the client reads it. Dropping the
//! response body (client gone) drops the upstream connection with it.

use async_stream::stream;
use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use futures::StreamExt;
use reqwest::{redirect::Policy, Client, RequestBuilder};
use std::time::{Duration, Instant};
use url::Url;
use uuid::Uuid;

use crate::error::{GatewayError, GatewayResult};
use crate::metrics::ACTIVE_STREAMS;
use crate::models::Credentials;
use crate::services::hls::{self, HlsRedirects};
use crate::services::xtream::XtreamCredentials;

// Re-export reqwest header module to avoid version conflicts
mod reqwest_header {
    pub use reqwest::header::{HeaderMap, ACCEPT, LOCATION, RANGE};
}

/// Framing headers owned by our own HTTP stack
const HOP_BY_HOP: [&str; 3] = ["connection", "keep-alive", "transfer-encoding"];

pub struct StreamForwarder {
    client: Client,
    /// Same settings, but redirects are returned instead of followed
    no_redirect: Client,
}

impl StreamForwarder {
    /// Only the connect phase is bounded; streams may stay open indefinitely
    pub fn new(user_agent: &str, connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(connect_timeout)
            .build()?;
        let no_redirect = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(connect_timeout)
            .redirect(Policy::none())
            .build()?;

        Ok(Self { client, no_redirect })
    }

    /// GET `target` and relay the response as-is
    pub async fn forward(&self, target: &Url, client_headers: &HeaderMap) -> GatewayResult<Response> {
        let upstream = upstream_request(&self.client, target, client_headers).send().await?;
        relay(upstream)
    }

    /// Live manifest request with redirect capture
    ///
    /// A redirect to a CDN node is followed by hand: its origin is recorded
    /// under the channel key and the manifest is returned with the upstream
    /// account replaced by the gateway account. Anything else is relayed.
    pub async fn forward_live(
        &self,
        target: &Url,
        client_headers: &HeaderMap,
        id: &str,
        redirects: &HlsRedirects,
        upstream: &XtreamCredentials,
        gateway: &Credentials,
    ) -> GatewayResult<Response> {
        let response = upstream_request(&self.no_redirect, target, client_headers).send().await?;

        let redirect = response
            .status()
            .is_redirection()
            .then(|| response.headers().get(reqwest_header::LOCATION))
            .flatten()
            .map(|location| location.to_str().map(str::to_string));

        let location = match redirect {
            Some(Ok(location)) => location,
            Some(Err(_)) => {
                return Err(GatewayError::Upstream("redirect location is not valid text".to_string()))
            }
            None => return relay(response),
        };

        if !location.contains(id) {
            return Err(GatewayError::Upstream(format!("unexpected redirect for '{}'", id)));
        }
        let location = target
            .join(&location)
            .map_err(|e| GatewayError::Upstream(format!("invalid redirect location: {}", e)))?;

        redirects.record(hls::channel_key(id), &location).await;

        let manifest = upstream_request(&self.client, &location, client_headers).send().await?;
        let status = to_status(manifest.status())?;
        let upstream_headers = manifest.headers().clone();
        let text = manifest.text().await?;
        let body = hls::rewrite_manifest_credentials(&text, upstream, gateway);

        let mut builder = Response::builder().status(status);
        if let Some(headers) = builder.headers_mut() {
            // Length changes with the rewrite
            copy_headers(&upstream_headers, headers, &["content-length"]);
        }
        builder
            .body(Body::from(body))
            .map_err(|e| GatewayError::Internal(format!("failed to build response: {}", e)))
    }
}

/// Upstream GET carrying the client's Range and Accept headers
fn upstream_request(client: &Client, target: &Url, client_headers: &HeaderMap) -> RequestBuilder {
    let mut request = client.get(target.clone());

    if let Some(accept) = client_headers.get("accept").and_then(|v| v.to_str().ok()) {
        request = request.header(reqwest_header::ACCEPT, accept);
    }
    if let Some(range) = client_headers.get("range").and_then(|v| v.to_str().ok()) {
        request = request.header(reqwest_header::RANGE, range);
    }

    request
}

/// Turn an upstream response into a streaming client response
pub fn relay(upstream: reqwest::Response) -> GatewayResult<Response> {
    let status = to_status(upstream.status())?;

    let mut builder = Response::builder().status(status);
    if let Some(headers) = builder.headers_mut() {
        copy_headers(upstream.headers(), headers, &[]);
    }

    let mut guard = ActiveStream::open(status);
    let mut chunks = upstream.bytes_stream();
    let body = stream! {
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(reqwest::Error::without_url);
            match &chunk {
                Ok(bytes) => guard.bytes += bytes.len() as u64,
                Err(e) => tracing::warn!(stream_id = %guard.id, "upstream stream failed: {}", e),
            }
            let failed = chunk.is_err();
            yield chunk;
            if failed {
                break;
            }
        }
    };

    builder
        .body(Body::from_stream(body))
        .map_err(|e| GatewayError::Internal(format!("failed to build response: {}", e)))
}

fn to_status(status: reqwest::StatusCode) -> GatewayResult<StatusCode> {
    StatusCode::from_u16(status.as_u16())
        .map_err(|_| GatewayError::Upstream(format!("invalid upstream status {}", status.as_u16())))
}

/// Copy every header except hop-by-hop ones and `skip`, joining repeats with ", "
fn copy_headers(from: &reqwest_header::HeaderMap, to: &mut HeaderMap, skip: &[&str]) {
    for name in from.keys() {
        let key = name.as_str();
        if HOP_BY_HOP.contains(&key) || skip.contains(&key) {
            continue;
        }

        let joined = from
            .get_all(name)
            .iter()
            .map(|value| value.as_bytes())
            .collect::<Vec<_>>()
            .join(&b", "[..]);

        match (HeaderName::from_bytes(key.as_bytes()), HeaderValue::from_bytes(&joined)) {
            (Ok(name), Ok(value)) => {
                to.insert(name, value);
            }
            _ => tracing::debug!(header = key, "skipping upstream header"),
        }
    }
}

/// Open relay; gauge and close log follow the body's lifetime
struct ActiveStream {
    id: Uuid,
    opened_at: Instant,
    bytes: u64,
}

impl ActiveStream {
    fn open(status: StatusCode) -> Self {
        let id = Uuid::new_v4();
        ACTIVE_STREAMS.inc();
        tracing::info!(stream_id = %id, status = status.as_u16(), "stream opened");
        Self {
            id,
            opened_at: Instant::now(),
            bytes: 0,
        }
    }
}

impl Drop for ActiveStream {
    fn drop(&mut self) {
        ACTIVE_STREAMS.dec();
        tracing::info!(
            stream_id = %self.id,
            bytes = self.bytes,
            elapsed_secs = self.opened_at.elapsed().as_secs(),
            "stream closed"
        );
    }
}
