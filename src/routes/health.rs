use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

/// Root endpoint - basic status
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "IPTV Gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "runtime": "rust"
    }))
}

/// Cache stats
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheStats {
    entries: usize,
    size_mb: f64,
    ttl_hours: u64,
}

/// Health check response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    uptime: u64,
    mode: &'static str,
    cache: CacheStats,
    hls_channels: usize,
    active_streams: i64,
}

/// GET /health - service state without upstream details
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();

    let cache_size_mb = state.cache.total_size().await as f64 / 1024.0 / 1024.0;

    let health = HealthResponse {
        status: "ok".to_string(),
        uptime,
        mode: state.mode(),
        cache: CacheStats {
            entries: state.cache.entry_count().await,
            size_mb: (cache_size_mb * 100.0).round() / 100.0,
            ttl_hours: state.cache.ttl().as_secs() / 3600,
        },
        hls_channels: state.hls.len().await,
        active_streams: crate::metrics::ACTIVE_STREAMS.get(),
    };

    Json(health)
}

/// GET /metrics - Prometheus metrics
pub async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                b"Internal Server Error".to_vec(),
            )
        }
    }
}

/// Liveness probe (for Kubernetes)
pub async fn live() -> impl IntoResponse {
    (StatusCode::OK, "alive")
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{body_text, gateway, request};
    use axum::http::StatusCode;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_reports_mode_without_credentials() {
        let gw = gateway(true).await;

        let response = gw.app.oneshot(request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let text = body_text(response).await;
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["mode"], "xtream");
        assert_eq!(value["cache"]["entries"], 0);
        assert_eq!(value["cache"]["ttlHours"], 1);
        assert!(!text.contains("uppass"));
    }

    #[tokio::test]
    async fn test_metrics_exposition() {
        crate::metrics::CACHE_HITS.inc_by(0);
        let gw = gateway(false).await;

        let response = gw.app.oneshot(request("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("gateway_cache_hits_total"));
    }

    #[tokio::test]
    async fn test_root_and_live() {
        let gw = gateway(false).await;

        let response = gw.app.clone().oneshot(request("/")).await.unwrap();
        assert!(body_text(response).await.contains("IPTV Gateway"));

        let response = gw.app.oneshot(request("/live")).await.unwrap();
        assert_eq!(body_text(response).await, "alive");
    }
}
