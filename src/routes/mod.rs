pub mod health;
pub mod m3u;
pub mod stream;
pub mod xtream;

use axum::{
    async_trait,
    extract::{rejection::FormRejection, ConnectInfo, Form, FromRequestParts},
    http::{header, request::Parts, Extensions, HeaderMap},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::{GatewayError, GatewayResult};
use crate::AppState;

/// Full route table; health routes are the only unauthenticated ones
pub fn build_router(state: Arc<AppState>) -> Router {
    let playlist_route = format!("/{}", state.config.m3u_file_name);

    Router::new()
        // Health endpoints
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .route("/live", get(health::live))
        // Playlists
        .route(&playlist_route, get(m3u::playlist).post(m3u::playlist))
        .route("/get.php", get(xtream::get_playlist).post(xtream::get_playlist))
        // Catalog API
        .route("/player_api.php", get(xtream::player_api).post(xtream::player_api))
        .route("/xmltv.php", get(xtream::xmltv))
        // Streams
        .route("/:user/:password/:id", get(stream::generic))
        .route("/live/:user/:password/:id", get(stream::live))
        .route("/movie/:user/:password/:id", get(stream::movie))
        .route("/series/:user/:password/:id", get(stream::series))
        .route(
            "/hlsr/:token/:user/:password/:channel/:hash/:chunk",
            get(stream::hls_chunk),
        )
        .with_state(state)
}

/// Requesting client address, proxy headers first
pub struct ClientIp(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip(&parts.headers, &parts.extensions)))
    }
}

fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.to_string())
        })
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Query (GET) or form body (POST) as raw pairs
pub(crate) fn form_pairs(
    form: Result<Form<Vec<(String, String)>>, FormRejection>,
) -> GatewayResult<Vec<(String, String)>> {
    form.map(|Form(pairs)| pairs)
        .map_err(|e| GatewayError::BadRequest(e.body_text()))
}

/// First value of `key`
pub(crate) fn field<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Playlist download response
pub(crate) fn attachment(file_name: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::Config;
    use crate::services::cache::ArtifactCache;
    use crate::services::forwarder::StreamForwarder;
    use crate::services::hls::HlsRedirects;
    use crate::services::m3u;
    use crate::services::playlist::PlainPlaylist;
    use crate::services::xtream::{XtreamClient, XtreamCredentials};
    use axum::{
        body::Body,
        extract::{Path, Query, State},
        http::{Request, StatusCode},
        Json,
    };
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};
    use tokio::net::TcpListener;

    pub const USER: &str = "alice";
    pub const PASSWORD: &str = "s3cret";

    /// Counters of what the fake upstream served
    #[derive(Default)]
    pub struct UpstreamHits {
        pub playlists: AtomicUsize,
        pub api_calls: AtomicUsize,
    }

    async fn player_api(
        State(hits): State<Arc<UpstreamHits>>,
        Query(query): Query<HashMap<String, String>>,
    ) -> Response {
        hits.api_calls.fetch_add(1, Ordering::SeqCst);
        if query.get("username").map(String::as_str) != Some("upuser")
            || query.get("password").map(String::as_str) != Some("uppass")
        {
            return StatusCode::FORBIDDEN.into_response();
        }

        match query.get("action").map(String::as_str) {
            None => Json(json!({
                "user_info": {"username": "upuser", "password": "uppass", "auth": 1},
                "server_info": {"url": "provider.invalid", "port": "80", "server_protocol": "http"}
            }))
            .into_response(),
            Some("get_vod_info") => Json(json!({"info": {"vod_id": query.get("vod_id")}})).into_response(),
            Some(action) => Json(json!([{"category_name": action}])).into_response(),
        }
    }

    async fn get_php(State(hits): State<Arc<UpstreamHits>>) -> &'static str {
        hits.playlists.fetch_add(1, Ordering::SeqCst);
        "#EXTM3U\n#EXTINF:-1 group-title=\"News\",Five\nhttp://provider.invalid/live/upuser/uppass/5.ts\n"
    }

    async fn media(Path(file): Path<String>) -> String {
        format!("media:{}", file)
    }

    async fn chunk(Path((_token, _hash, chunk)): Path<(String, String, String)>) -> String {
        format!("chunk:{}", chunk)
    }

    async fn spawn_upstream() -> (SocketAddr, Arc<UpstreamHits>) {
        let hits = Arc::new(UpstreamHits::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new()
            .route("/player_api.php", get(player_api))
            .route("/get.php", get(get_php))
            .route("/xmltv.php", get(|| async { "<tv></tv>" }))
            .route("/media/:file", get(media))
            .route("/upuser/uppass/:file", get(media))
            .route("/movie/upuser/uppass/:file", get(media))
            .route(
                "/live/upuser/uppass/ch1.m3u8",
                get(|| async {
                    (
                        StatusCode::FOUND,
                        [(header::LOCATION, "/cdn/live/upuser/uppass/ch1.m3u8?token=t")],
                    )
                }),
            )
            .route(
                "/cdn/live/upuser/uppass/ch1.m3u8",
                get(|| async { "#EXTM3U\n/hlsr/t/upuser/uppass/ch1/h/1.ts\n" }),
            )
            .route("/hlsr/:token/upuser/uppass/ch1/:hash/:chunk", get(chunk))
            .with_state(hits.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, hits)
    }

    pub struct Gateway {
        pub app: Router,
        pub state: Arc<AppState>,
        pub hits: Arc<UpstreamHits>,
        pub upstream: SocketAddr,
    }

    /// Gateway wired to a fresh fake upstream
    pub async fn gateway(with_catalog: bool) -> Gateway {
        let (addr, hits) = spawn_upstream().await;
        let mut vars: HashMap<&str, String> = HashMap::from([
            ("GATEWAY_HOSTNAME", "gw.local".to_string()),
            ("PORT", "8080".to_string()),
            ("GATEWAY_USER", USER.to_string()),
            ("GATEWAY_PASSWORD", PASSWORD.to_string()),
            (
                "CACHE_DIR",
                std::env::temp_dir()
                    .join(format!("iptv-gateway-routes-{}", uuid::Uuid::new_v4()))
                    .display()
                    .to_string(),
            ),
        ]);
        if with_catalog {
            vars.insert("XTREAM_BASE_URL", format!("http://{}", addr));
            vars.insert("XTREAM_USER", "upuser".to_string());
            vars.insert("XTREAM_PASSWORD", "uppass".to_string());
        } else {
            vars.insert("M3U_URL", format!("http://{}/list.m3u", addr));
        }
        let config = Config::from_lookup(|key| vars.get(key).cloned());

        let plain = if with_catalog {
            None
        } else {
            let text = format!(
                "#EXTM3U\n#EXTINF:-1 tvg-name=\"One\",One\nhttp://{0}/media/1.ts\n#EXTINF:-1,Two\nhttp://{0}/media/2.ts\n",
                addr
            );
            Some(PlainPlaylist::new(m3u::parse(&text).unwrap()).unwrap())
        };
        let catalog = config.xtream_credentials().map(|creds: XtreamCredentials| {
            XtreamClient::new(creds, reqwest::Client::new())
        });

        let state = Arc::new(AppState {
            gateway: config.gateway_credentials(),
            identity: config.identity(),
            forwarder: StreamForwarder::new("test-agent", Duration::from_secs(5)).unwrap(),
            cache: ArtifactCache::new(&config.cache_dir, config.cache_ttl(), None).await.unwrap(),
            hls: HlsRedirects::new(),
            catalog,
            plain,
            config,
            start_time: Instant::now(),
        });

        Gateway {
            app: build_router(state.clone()),
            state,
            hits,
            upstream: addr,
        }
    }

    pub fn request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    pub async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }
}
