//! Media routes
//!
//! Credentials travel in the path. Each handler authenticates, resolves
//! the upstream target and hands over to the stream forwarder.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Response,
};
use std::sync::Arc;

use super::{attachment, ClientIp};
use crate::error::{GatewayError, GatewayResult};
use crate::services::address::{self, StreamKind};
use crate::services::hls::{self, HlsChunkPath};
use crate::services::{auth, catalog};
use crate::AppState;

fn admit_path(state: &AppState, user: &str, password: &str) -> GatewayResult<()> {
    auth::admit(Some(user), Some(password), "user", "password", &state.gateway)
}

/// GET /:user/:password/:id
///
/// `get.php` serves the catalog playlist, a known plain entry is proxied
/// to its upstream URI, anything else goes to the catalog stream path.
pub async fn generic(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    Path((user, password, id)): Path<(String, String, String)>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> GatewayResult<Response> {
    admit_path(&state, &user, &password)?;

    if id == catalog::PLAYLIST_ENDPOINT {
        if let Some(client) = &state.catalog {
            tracing::info!(client_ip, "catalog playlist request");
            let artifact =
                catalog::cached_playlist(client, &state.cache, query, &state.gateway, &state.identity).await?;
            return Ok(attachment(&state.config.m3u_file_name, artifact.bytes));
        }
    }

    if let Some(target) = state.plain.as_ref().and_then(|plain| plain.resolve(&id)) {
        tracing::debug!(client_ip, id, "plain stream");
        return state.forwarder.forward(target, &headers).await;
    }

    match &state.catalog {
        Some(client) => {
            let target = address::stream_target(client.credentials(), StreamKind::Generic, &id)?;
            state.forwarder.forward(&target, &headers).await
        }
        None => Err(GatewayError::NotFound(format!("unknown resource '{}'", id))),
    }
}

/// GET /live/:user/:password/:id
pub async fn live(
    State(state): State<Arc<AppState>>,
    Path((user, password, id)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> GatewayResult<Response> {
    admit_path(&state, &user, &password)?;
    let upstream = state.catalog()?.credentials();
    let target = address::stream_target(upstream, StreamKind::Live, &id)?;

    if hls::is_manifest(&id) {
        return state
            .forwarder
            .forward_live(&target, &headers, &id, &state.hls, upstream, &state.gateway)
            .await;
    }
    state.forwarder.forward(&target, &headers).await
}

/// GET /movie/:user/:password/:id
pub async fn movie(
    State(state): State<Arc<AppState>>,
    Path((user, password, id)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> GatewayResult<Response> {
    catalog_stream(&state, &user, &password, StreamKind::Movie, &id, &headers).await
}

/// GET /series/:user/:password/:id
pub async fn series(
    State(state): State<Arc<AppState>>,
    Path((user, password, id)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> GatewayResult<Response> {
    catalog_stream(&state, &user, &password, StreamKind::Series, &id, &headers).await
}

async fn catalog_stream(
    state: &AppState,
    user: &str,
    password: &str,
    kind: StreamKind,
    id: &str,
    headers: &HeaderMap,
) -> GatewayResult<Response> {
    admit_path(state, user, password)?;
    let target = address::stream_target(state.catalog()?.credentials(), kind, id)?;
    state.forwarder.forward(&target, headers).await
}

/// GET /hlsr/:token/:user/:password/:channel/:hash/:chunk
pub async fn hls_chunk(
    State(state): State<Arc<AppState>>,
    Path((token, user, password, channel, hash, chunk)): Path<(String, String, String, String, String, String)>,
    headers: HeaderMap,
) -> GatewayResult<Response> {
    admit_path(&state, &user, &password)?;
    let upstream = state.catalog()?.credentials();

    let path = HlsChunkPath {
        token,
        channel,
        hash,
        chunk,
    };
    let target = state.hls.chunk_target(upstream, &path).await?;
    state.forwarder.forward(&target, &headers).await
}
