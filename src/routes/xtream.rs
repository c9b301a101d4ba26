//! Catalog API routes
//!
//! Client-facing Xtream endpoints. Every handler authenticates the
//! `username`/`password` fields against the gateway account and talks to
//! the upstream with the upstream account only.

use axum::{
    extract::{rejection::FormRejection, Form, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::{attachment, field, form_pairs, ClientIp};
use crate::error::{GatewayError, GatewayResult};
use crate::services::facade::{self, ApiParams};
use crate::services::xtream::CatalogClient;
use crate::services::{auth, catalog};
use crate::AppState;

fn api_params(form: Result<Form<ApiParams>, FormRejection>) -> GatewayResult<ApiParams> {
    form.map(|Form(params)| params)
        .map_err(|e| GatewayError::BadRequest(e.body_text()))
}

fn admit_params(state: &AppState, params: &ApiParams) -> GatewayResult<()> {
    auth::admit(
        params.username.as_deref(),
        params.password.as_deref(),
        "username",
        "password",
        &state.gateway,
    )
}

/// GET|POST /player_api.php
pub async fn player_api(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    form: Result<Form<ApiParams>, FormRejection>,
) -> GatewayResult<Json<serde_json::Value>> {
    let params = api_params(form)?;
    admit_params(&state, &params)?;

    let client = state.catalog()?;
    let value = facade::handle(client, &params, &client_ip, &state.gateway, &state.identity).await?;
    Ok(Json(value))
}

/// GET /xmltv.php
pub async fn xmltv(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    form: Result<Form<ApiParams>, FormRejection>,
) -> GatewayResult<Response> {
    let params = api_params(form)?;
    admit_params(&state, &params)?;

    let client = state.catalog()?;
    tracing::info!(client_ip, "xmltv request");
    let guide = client.fetch_xmltv().await?;

    Ok(([(header::CONTENT_TYPE, "application/xml")], guide).into_response())
}

/// GET|POST /get.php
pub async fn get_playlist(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    form: Result<Form<Vec<(String, String)>>, FormRejection>,
) -> GatewayResult<Response> {
    let pairs = form_pairs(form)?;
    auth::admit(
        field(&pairs, "username"),
        field(&pairs, "password"),
        "username",
        "password",
        &state.gateway,
    )?;

    let client = state.catalog()?;
    tracing::info!(client_ip, "catalog playlist request");
    let artifact = catalog::cached_playlist(client, &state.cache, pairs, &state.gateway, &state.identity).await?;

    Ok(attachment(&state.config.m3u_file_name, artifact.bytes))
}
