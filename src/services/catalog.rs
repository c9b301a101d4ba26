//! Catalog playlist (`get.php`) served through the artifact cache

use crate::error::{GatewayError, GatewayResult};
use crate::models::{Credentials, HostIdentity};
use crate::services::address;
use crate::services::cache::{Artifact, ArtifactCache};
use crate::services::m3u;
use crate::services::rewriter;
use crate::services::xtream::CatalogClient;

pub const PLAYLIST_ENDPOINT: &str = "get.php";

/// Rewritten `get.php` playlist for the client's parameters
///
/// `params` are the raw client pairs; credentials are stripped and the
/// rest normalised before they become the upstream query and cache key.
pub async fn cached_playlist<C, I>(
    client: &C,
    cache: &ArtifactCache,
    params: I,
    gateway: &Credentials,
    identity: &HostIdentity,
) -> GatewayResult<Artifact>
where
    C: CatalogClient,
    I: IntoIterator<Item = (String, String)>,
{
    let params = address::catalog_params(params);
    let signature = address::catalog_signature(PLAYLIST_ENDPOINT, &params);

    let params = &params;
    cache
        .get_or_refresh(&signature, || async move {
            let text = client.fetch_playlist(params).await?;
            let playlist = m3u::parse(&text)?;
            let rewritten = rewriter::rewrite(&playlist, gateway, identity)?;
            tracing::info!(entries = rewritten.len(), "catalog playlist rewritten");
            Ok::<_, GatewayError>(m3u::serialize(&rewritten).into_bytes())
        })
        .await
}
