use axum::{
    extract::{rejection::FormRejection, Form, State},
    response::Response,
};
use std::sync::Arc;

use super::{attachment, field, form_pairs, ClientIp};
use crate::error::{GatewayError, GatewayResult};
use crate::services::{auth, catalog};
use crate::services::xtream::{playlist_params, CREDENTIAL_PARAMS};
use crate::AppState;

/// Gateway auth fields of the playlist route
const AUTH_FIELDS: [&str; 2] = ["user", "password"];

/// GET|POST /{M3U_FILE_NAME}?user=&password=
///
/// With a catalog upstream the playlist comes from `get.php` through the
/// artifact cache; otherwise the loaded plain playlist is rewritten.
pub async fn playlist(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    form: Result<Form<Vec<(String, String)>>, FormRejection>,
) -> GatewayResult<Response> {
    let pairs = form_pairs(form)?;
    auth::admit(
        field(&pairs, "user"),
        field(&pairs, "password"),
        AUTH_FIELDS[0],
        AUTH_FIELDS[1],
        &state.gateway,
    )?;
    tracing::info!(client_ip, file = %state.config.m3u_file_name, "playlist request");

    let file_name = &state.config.m3u_file_name;

    if let Some(client) = &state.catalog {
        let params = auto_params(state.config.m3u_url.as_deref(), pairs);
        let artifact =
            catalog::cached_playlist(client, &state.cache, params, &state.gateway, &state.identity).await?;
        return Ok(attachment(file_name, artifact.bytes));
    }

    let plain = state
        .plain
        .as_ref()
        .ok_or_else(|| GatewayError::NotFound("no playlist configured".to_string()))?;
    let body = plain.render(&state.gateway, &state.identity)?;
    Ok(attachment(file_name, body.into_bytes()))
}

/// Configured `get.php` parameters with the request's own ones on top
fn auto_params(m3u_url: Option<&str>, request: Vec<(String, String)>) -> Vec<(String, String)> {
    let request: Vec<(String, String)> = request
        .into_iter()
        .filter(|(key, _)| !AUTH_FIELDS.contains(&key.as_str()) && !CREDENTIAL_PARAMS.contains(&key.as_str()))
        .collect();

    let mut params = m3u_url
        .map(playlist_params)
        .filter(|params| !params.is_empty())
        .unwrap_or_else(|| vec![("type".to_string(), "m3u_plus".to_string())]);
    params.retain(|(key, _)| !request.iter().any(|(k, _)| k == key));
    params.extend(request);
    params
}
