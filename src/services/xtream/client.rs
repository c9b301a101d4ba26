//! Xtream Codes API Client
//!
//! HTTP client for the upstream Player API. Every request carries the
//! upstream account; client-facing credentials never reach this module.

use axum::body::Bytes;
use reqwest::Client;
use serde_json::Value;
use std::future::Future;
use tracing::{debug, error};
use url::Url;

use super::types::{CatalogAction, XtreamCredentials};

/// Upstream catalog operations the gateway relies on
pub trait CatalogClient: Send + Sync {
    /// `player_api.php` call, result returned as-is
    fn fetch(&self, action: &CatalogAction) -> impl Future<Output = Result<Value, XtreamError>> + Send;

    /// `get.php` playlist text for the given non-credential parameters
    fn fetch_playlist(
        &self,
        params: &[(String, String)],
    ) -> impl Future<Output = Result<String, XtreamError>> + Send;

    /// `xmltv.php` guide data
    fn fetch_xmltv(&self) -> impl Future<Output = Result<Bytes, XtreamError>> + Send;
}

/// Xtream API Client
pub struct XtreamClient {
    http: Client,
    creds: XtreamCredentials,
}

impl XtreamClient {
    /// `http` should carry the fetch timeout and user agent
    pub fn new(creds: XtreamCredentials, http: Client) -> Self {
        Self { http, creds }
    }

    pub fn credentials(&self) -> &XtreamCredentials {
        &self.creds
    }

    fn endpoint(&self, endpoint: &str) -> Result<Url, XtreamError> {
        self.creds
            .endpoint_url(endpoint)
            .map_err(|e| XtreamError::InvalidUrl(e.to_string()))
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, XtreamError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| XtreamError::Network(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(XtreamError::Http(status.as_u16()));
        }
        Ok(response)
    }
}

impl CatalogClient for XtreamClient {
    async fn fetch(&self, action: &CatalogAction) -> Result<Value, XtreamError> {
        let mut url = self.endpoint("player_api.php")?;
        if !action.name().is_empty() {
            let mut query = url.query_pairs_mut();
            query.append_pair("action", action.name());
            for (key, value) in action.params() {
                query.append_pair(key, &value);
            }
        }

        debug!("Xtream API request: {}", action.name());

        let text = self
            .get(url)
            .await?
            .text()
            .await
            .map_err(|e| XtreamError::Network(e.without_url().to_string()))?;

        if text.trim().is_empty() {
            return Err(XtreamError::EmptyResponse);
        }

        serde_json::from_str(&text).map_err(|e| {
            error!(
                "Failed to parse Xtream response for action '{}': {}",
                action.name(),
                e
            );
            XtreamError::Parse(e.to_string())
        })
    }

    async fn fetch_playlist(&self, params: &[(String, String)]) -> Result<String, XtreamError> {
        let mut url = self.endpoint("get.php")?;
        url.query_pairs_mut().extend_pairs(params);

        debug!("Xtream playlist request ({} params)", params.len());

        self.get(url)
            .await?
            .text()
            .await
            .map_err(|e| XtreamError::Network(e.without_url().to_string()))
    }

    async fn fetch_xmltv(&self) -> Result<Bytes, XtreamError> {
        let url = self.endpoint("xmltv.php")?;
        self.get(url)
            .await?
            .bytes()
            .await
            .map_err(|e| XtreamError::Network(e.without_url().to_string()))
    }
}

/// Xtream API Error types
#[derive(Debug)]
pub enum XtreamError {
    /// Network/connection error
    Network(String),
    /// HTTP error (non-2xx status)
    Http(u16),
    /// JSON parsing error
    Parse(String),
    /// Empty response from server
    EmptyResponse,
    /// Configured server is not a usable base URL
    InvalidUrl(String),
}

impl std::fmt::Display for XtreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            XtreamError::Network(e) => write!(f, "Network error: {}", e),
            XtreamError::Http(code) => write!(f, "HTTP error: {}", code),
            XtreamError::Parse(e) => write!(f, "Parse error: {}", e),
            XtreamError::EmptyResponse => write!(f, "Empty response"),
            XtreamError::InvalidUrl(e) => write!(f, "Invalid server URL: {}", e),
        }
    }
}

impl std::error::Error for XtreamError {}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::RawQuery, routing::get, Router};
    use tokio::net::TcpListener;

    async fn spawn_upstream() -> String {
        let app = Router::new()
            .route(
                "/player_api.php",
                get(|RawQuery(query): RawQuery| async move {
                    let query = query.unwrap_or_default();
                    if query.contains("action=get_vod_info") {
                        axum::Json(serde_json::json!({ "query": query }))
                    } else {
                        axum::Json(serde_json::json!({ "user_info": { "auth": 1 } }))
                    }
                }),
            )
            .route(
                "/get.php",
                get(|RawQuery(query): RawQuery| async move {
                    format!("#EXTM3U\n#EXTINF:-1,{}\nhttp://up/live/a/b/1.ts\n", query.unwrap_or_default())
                }),
            )
            .route("/xmltv.php", get(|| async { (axum::http::StatusCode::FORBIDDEN, "no") }));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(server: String) -> XtreamClient {
        XtreamClient::new(
            XtreamCredentials {
                server,
                username: "upuser".to_string(),
                password: "uppass".to_string(),
            },
            Client::new(),
        )
    }

    #[tokio::test]
    async fn test_fetch_sends_upstream_credentials_and_action() {
        let client = client(spawn_upstream().await);

        let value = client
            .fetch(&CatalogAction::VodInfo { vod_id: "42".into() })
            .await
            .unwrap();
        let query = value["query"].as_str().unwrap();
        assert_eq!(query, "username=upuser&password=uppass&action=get_vod_info&vod_id=42");

        let login = client.fetch(&CatalogAction::Login).await.unwrap();
        assert_eq!(login["user_info"]["auth"], 1);
    }

    #[tokio::test]
    async fn test_fetch_playlist_appends_params() {
        let client = client(spawn_upstream().await);

        let text = client
            .fetch_playlist(&[("output".to_string(), "ts".to_string())])
            .await
            .unwrap();
        assert!(text.contains("username=upuser&password=uppass&output=ts"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let client = client(spawn_upstream().await);

        let err = client.fetch_xmltv().await.unwrap_err();
        assert!(matches!(err, XtreamError::Http(403)));
    }
}
