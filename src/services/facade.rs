//! Catalog API facade (`player_api.php`)
//!
//! Dispatches a fixed set of actions to the upstream catalog and returns
//! its JSON untouched. Unknown or absent actions fall back to the login
//! handshake, whose account and server fields are replaced so the client
//! only ever sees the gateway.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{GatewayError, GatewayResult};
use crate::metrics::API_ACTIONS;
use crate::models::{Credentials, HostIdentity};
use crate::services::xtream::{CatalogAction, CatalogClient};

/// Query or form fields of a `player_api.php` request
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ApiParams {
    pub action: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub stream_id: Option<String>,
    pub series_id: Option<String>,
    pub vod_id: Option<String>,
    pub limit: Option<String>,
}

/// Map the client `action` onto an upstream call
pub fn resolve_action(params: &ApiParams) -> GatewayResult<CatalogAction> {
    let action = match params.action.as_deref().unwrap_or("") {
        CatalogAction::GET_LIVE_CATEGORIES => CatalogAction::LiveCategories,
        CatalogAction::GET_LIVE_STREAMS => CatalogAction::LiveStreams,
        CatalogAction::GET_VOD_CATEGORIES => CatalogAction::VodCategories,
        CatalogAction::GET_VOD_STREAMS => CatalogAction::VodStreams,
        CatalogAction::GET_VOD_INFO => CatalogAction::VodInfo {
            vod_id: required(&params.vod_id, "vod_id")?,
        },
        CatalogAction::GET_SERIES_CATEGORIES => CatalogAction::SeriesCategories,
        CatalogAction::GET_SERIES => CatalogAction::Series,
        CatalogAction::GET_SERIES_INFO => CatalogAction::SeriesInfo {
            series_id: required(&params.series_id, "series_id")?,
        },
        CatalogAction::GET_SHORT_EPG => CatalogAction::ShortEpg {
            stream_id: required(&params.stream_id, "stream_id")?,
            limit: parse_limit(params.limit.as_deref())?,
        },
        CatalogAction::GET_SIMPLE_DATA_TABLE => CatalogAction::FullEpg {
            stream_id: required(&params.stream_id, "stream_id")?,
        },
        _ => CatalogAction::Login,
    };
    Ok(action)
}

fn required(value: &Option<String>, name: &str) -> GatewayResult<String> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| GatewayError::missing_param(name))
}

/// Absent or empty means 0
fn parse_limit(limit: Option<&str>) -> GatewayResult<u32> {
    match limit.filter(|l| !l.is_empty()) {
        None => Ok(0),
        Some(limit) => limit
            .parse()
            .map_err(|_| GatewayError::BadRequest(format!(r#"invalid "limit": {}"#, limit))),
    }
}

/// Dispatch one authenticated `player_api.php` request
pub async fn handle<C: CatalogClient>(
    client: &C,
    params: &ApiParams,
    client_ip: &str,
    gateway: &Credentials,
    identity: &HostIdentity,
) -> GatewayResult<Value> {
    let action = resolve_action(params)?;
    let label = match action {
        CatalogAction::Login => "login",
        _ => action.name(),
    };

    tracing::info!(
        client_ip,
        action = label,
        at = %chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "player_api request"
    );
    API_ACTIONS.with_label_values(&[label]).inc();

    let value = client.fetch(&action).await?;
    Ok(match action {
        CatalogAction::Login => rewrite_login(value, gateway, identity),
        _ => value,
    })
}

/// Replace upstream account and server details with the gateway's
pub fn rewrite_login(mut value: Value, gateway: &Credentials, identity: &HostIdentity) -> Value {
    if let Some(user_info) = value.get_mut("user_info").and_then(Value::as_object_mut) {
        user_info.insert("username".to_string(), json!(gateway.user));
        user_info.insert("password".to_string(), json!(gateway.password));
    }

    if let Some(server_info) = value.get_mut("server_info").and_then(Value::as_object_mut) {
        let port = identity.port.to_string();
        server_info.insert(
            "url".to_string(),
            json!(format!("{}://{}", identity.scheme(), identity.hostname)),
        );
        server_info.insert("server_protocol".to_string(), json!(identity.scheme()));
        server_info.insert("port".to_string(), json!(port));
        if identity.use_https {
            server_info.insert("https_port".to_string(), json!(port));
        }
    }

    value
}
