//! HLS redirect capture
//!
//! Live `.m3u8` requests are often answered by the upstream with a redirect
//! to a CDN node. The node's origin is remembered per channel so later
//! `/hlsr/...` chunk requests can be sent straight to it.

use std::collections::HashMap;
use tokio::sync::RwLock;
use url::Url;

use crate::error::{GatewayError, GatewayResult};
use crate::models::Credentials;
use crate::services::xtream::XtreamCredentials;

const MANIFEST_EXT: &str = ".m3u8";

/// Path segments of a client chunk request, minus the client credentials
#[derive(Debug, Clone)]
pub struct HlsChunkPath {
    pub token: String,
    pub channel: String,
    pub hash: String,
    pub chunk: String,
}

/// channel key -> upstream scheme+host(+port)
#[derive(Debug, Default)]
pub struct HlsRedirects {
    origins: RwLock<HashMap<String, Url>>,
}

impl HlsRedirects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the origin of `location` for `channel`, replacing any previous one
    pub async fn record(&self, channel: &str, location: &Url) {
        let origin = origin_of(location);
        tracing::debug!(channel, host = origin.host_str().unwrap_or(""), "HLS redirect recorded");

        let mut origins = self.origins.write().await;
        origins.insert(channel.to_string(), origin);
    }

    pub async fn lookup(&self, channel: &str) -> Option<Url> {
        let origins = self.origins.read().await;
        origins.get(channel).cloned()
    }

    pub async fn len(&self) -> usize {
        self.origins.read().await.len()
    }

    /// Upstream URL for a chunk of a channel seen before
    pub async fn chunk_target(&self, upstream: &XtreamCredentials, path: &HlsChunkPath) -> GatewayResult<Url> {
        let origin = self.lookup(&path.channel).await.ok_or_else(|| {
            GatewayError::NotFound(format!("no HLS redirect recorded for channel '{}'", path.channel))
        })?;
        chunk_target(&origin, upstream, path)
    }
}

/// Channel key of a live manifest id: `1234.m3u8` -> `1234`
pub fn channel_key(id: &str) -> &str {
    id.strip_suffix(MANIFEST_EXT).unwrap_or(id)
}

pub fn is_manifest(id: &str) -> bool {
    id.ends_with(MANIFEST_EXT)
}

/// `{origin}/hlsr/{token}/{upUser}/{upPass}/{channel}/{hash}/{chunk}`
pub fn chunk_target(origin: &Url, upstream: &XtreamCredentials, path: &HlsChunkPath) -> GatewayResult<Url> {
    let mut url = origin.clone();
    url.path_segments_mut()
        .map_err(|_| GatewayError::Internal("recorded HLS origin cannot be a base".to_string()))?
        .clear()
        .extend([
            "hlsr",
            path.token.as_str(),
            upstream.username.as_str(),
            upstream.password.as_str(),
            path.channel.as_str(),
            path.hash.as_str(),
            path.chunk.as_str(),
        ]);
    Ok(url)
}

/// Swap upstream account path segments in a manifest for the gateway's
pub fn rewrite_manifest_credentials(manifest: &str, upstream: &XtreamCredentials, gateway: &Credentials) -> String {
    let to = format!(
        "/{}/{}/",
        urlencoding::encode(&gateway.user),
        urlencoding::encode(&gateway.password)
    );
    let raw = format!("/{}/{}/", upstream.username, upstream.password);
    let encoded = format!(
        "/{}/{}/",
        urlencoding::encode(&upstream.username),
        urlencoding::encode(&upstream.password)
    );

    let rewritten = manifest.replace(&raw, &to);
    if encoded == raw {
        return rewritten;
    }
    rewritten.replace(&encoded, &to)
}

fn origin_of(location: &Url) -> Url {
    let mut origin = location.clone();
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);
    let _ = origin.set_username("");
    let _ = origin.set_password(None);
    origin
}
