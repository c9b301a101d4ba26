//! Plain upstream playlist, loaded once at startup

use reqwest::Client;
use url::Url;

use crate::error::GatewayResult;
use crate::models::{Credentials, HostIdentity, Playlist};
use crate::services::address::ResourceIndex;
use crate::services::{m3u, rewriter};

/// Loaded playlist plus the resource routes derived from it
#[derive(Debug)]
pub struct PlainPlaylist {
    pub playlist: Playlist,
    pub index: ResourceIndex,
}

impl PlainPlaylist {
    pub fn new(playlist: Playlist) -> GatewayResult<Self> {
        let index = ResourceIndex::build(&playlist)?;
        Ok(Self { playlist, index })
    }

    /// Serialized playlist addressed to the gateway
    pub fn render(&self, creds: &Credentials, identity: &HostIdentity) -> GatewayResult<String> {
        let rewritten = rewriter::rewrite_indexed(&self.playlist, &self.index, creds, identity)?;
        Ok(m3u::serialize(&rewritten))
    }

    pub fn resolve(&self, id: &str) -> Option<&Url> {
        self.index.resolve(id)
    }
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Fetch (http/https) or read (local path) and parse an M3U playlist
pub async fn load_playlist(source: &str, http: &Client) -> GatewayResult<Playlist> {
    let text = if is_remote(source) {
        http.get(source).send().await?.error_for_status()?.text().await?
    } else {
        tokio::fs::read_to_string(source).await?
    };

    let playlist = m3u::parse(&text)?;
    tracing::info!(entries = playlist.len(), remote = is_remote(source), "playlist loaded");
    Ok(playlist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use axum::{http::StatusCode, routing::get, Router};
    use tokio::net::TcpListener;

    const PLAYLIST: &str = "#EXTM3U url-tvg=\"http://epg.example/guide.xml\"\n\
        #EXTINF:-1 tvg-name=\"One\",One\n\
        http://provider.tv/a/1.ts\n\
        #EXTINF:-1 tvg-name=\"Two\",Two\n\
        http://mirror.tv/b/1.ts\n";

    async fn spawn_upstream() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new()
            .route("/list.m3u", get(|| async { PLAYLIST }))
            .route("/gone.m3u", get(|| async { StatusCode::GONE }));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_load_remote_playlist() {
        let base = spawn_upstream().await;
        let playlist = load_playlist(&format!("{}/list.m3u", base), &Client::new()).await.unwrap();

        assert_eq!(playlist.len(), 2);
        assert!(playlist.header.contains("url-tvg"));
    }

    #[tokio::test]
    async fn test_load_remote_error_status() {
        let base = spawn_upstream().await;
        let err = load_playlist(&format!("{}/gone.m3u", base), &Client::new()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_load_local_playlist() {
        let path = std::env::temp_dir().join(format!("iptv-gateway-{}.m3u", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, PLAYLIST).await.unwrap();

        let playlist = load_playlist(path.to_str().unwrap(), &Client::new()).await.unwrap();
        assert_eq!(playlist.len(), 2);

        let err = load_playlist("/definitely/not/here.m3u", &Client::new()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Internal(_)));
    }

    #[test]
    fn test_render_and_resolve() {
        let plain = PlainPlaylist::new(m3u::parse(PLAYLIST).unwrap()).unwrap();
        let identity = HostIdentity {
            hostname: "gw.local".to_string(),
            port: 8080,
            use_https: false,
        };

        let text = plain.render(&Credentials::new("alice", "s3cret"), &identity).unwrap();
        assert!(text.starts_with("#EXTM3U url-tvg="));
        assert!(text.contains("http://gw.local:8080/alice/s3cret/1.ts\n"));
        assert!(text.contains("http://gw.local:8080/alice/s3cret/1-1.ts\n"));

        assert_eq!(plain.resolve("1.ts").map(Url::as_str), Some("http://provider.tv/a/1.ts"));
        assert_eq!(plain.resolve("1-1.ts").map(Url::as_str), Some("http://mirror.tv/b/1.ts"));
    }
}
