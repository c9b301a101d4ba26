//! Gateway error taxonomy
//!
//! Every request-scoped failure is one of these variants. They terminate
//! only the request that produced them and render as `{"error": "..."}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::services::xtream::XtreamError;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Malformed or missing client input
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Credential mismatch
    #[error("unauthorized")]
    Unauthorized,
    /// Unknown resource or redirect key
    #[error("not found: {0}")]
    NotFound(String),
    /// Parse failure, network failure or non-success from upstream
    #[error("upstream error: {0}")]
    Upstream(String),
    /// Local failure (cache file I/O, response building)
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn missing_param(name: &str) -> Self {
        GatewayError::BadRequest(format!(r#"missing "{}""#, name))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "{}", self);
        } else {
            tracing::debug!(status = status.as_u16(), "{}", self);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<XtreamError> for GatewayError {
    fn from(err: XtreamError) -> Self {
        crate::metrics::UPSTREAM_ERRORS.inc();
        GatewayError::Upstream(err.to_string())
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        crate::metrics::UPSTREAM_ERRORS.inc();
        // The request URL carries upstream credentials
        GatewayError::Upstream(err.without_url().to_string())
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::Internal(err.to_string())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
