mod config;
mod error;
mod metrics;
mod models;
mod routes;
mod services;

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};
use crate::models::{Credentials, HostIdentity};
use crate::services::{
    cache::ArtifactCache,
    forwarder::StreamForwarder,
    hls::HlsRedirects,
    playlist::{load_playlist, PlainPlaylist},
    xtream::XtreamClient,
};

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub gateway: Credentials,
    pub identity: HostIdentity,
    pub forwarder: StreamForwarder,
    pub cache: ArtifactCache,
    pub hls: HlsRedirects,
    /// Upstream catalog, when configured or derived from M3U_URL
    pub catalog: Option<XtreamClient>,
    /// Plain playlist, loaded when no catalog is available
    pub plain: Option<PlainPlaylist>,
    pub start_time: Instant,
}

impl AppState {
    pub fn catalog(&self) -> GatewayResult<&XtreamClient> {
        self.catalog
            .as_ref()
            .ok_or_else(|| GatewayError::NotFound("catalog API not configured".to_string()))
    }

    pub fn mode(&self) -> &'static str {
        match (self.catalog.is_some(), self.plain.is_some()) {
            (true, true) => "xtream+m3u",
            (true, false) => "xtream",
            (false, true) => "m3u",
            (false, false) => "none",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "iptv_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Load configuration
    let config = Config::from_env();
    config.validate()?;
    let port = config.port;

    tracing::info!("Starting IPTV Gateway v{}", env!("CARGO_PKG_VERSION"));

    let identity = config.identity();
    tracing::info!("Advertised as {}", identity.base_url());

    // Upstream HTTP client for playlist and catalog fetches
    let http = reqwest::Client::builder()
        .timeout(config.fetch_timeout())
        .user_agent(&config.user_agent)
        .build()?;

    let forwarder = StreamForwarder::new(&config.user_agent, config.fetch_timeout())?;

    let cache = ArtifactCache::new(&config.cache_dir, config.cache_ttl(), config.cache_max_entries).await?;
    tracing::info!(
        "Artifact cache initialized: {} (ttl {}h)",
        config.cache_dir.display(),
        config.cache_expiration_hours
    );

    let catalog = config.xtream_credentials().map(|creds| {
        tracing::info!("Xtream catalog upstream enabled for account {}", creds.username);
        XtreamClient::new(creds, http.clone())
    });

    // A get.php M3U_URL is served through the catalog instead
    let plain = match (&catalog, &config.m3u_url) {
        (None, Some(source)) => {
            let playlist = load_playlist(source, &http)
                .await
                .context("failed to load M3U_URL")?;
            let plain = PlainPlaylist::new(playlist)?;
            tracing::info!("Plain playlist ready: {} resources", plain.index.len());
            Some(plain)
        }
        _ => None,
    };

    // Build application state
    let state = Arc::new(AppState {
        gateway: config.gateway_credentials(),
        identity,
        forwarder,
        cache,
        hls: HlsRedirects::new(),
        catalog,
        plain,
        config,
        start_time: Instant::now(),
    });
    tracing::info!("Mode: {}", state.mode());

    // Build router
    let app = routes::build_router(state)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
