//! Xtream Codes URL Detection
//!
//! A plain playlist URL of the form
//! `http://server:port/get.php?username=X&password=Y&type=m3u_plus&output=ts`
//! already identifies an Xtream account; the gateway uses it to derive the
//! catalog upstream when none is configured explicitly.

use super::types::XtreamCredentials;
use std::collections::HashMap;
use tracing::debug;
use url::Url;

/// Parameters that identify the account and are never forwarded as-is
pub const CREDENTIAL_PARAMS: [&str; 2] = ["username", "password"];

fn parse_get_php(m3u_url: &str) -> Option<Url> {
    let parsed = match Url::parse(m3u_url) {
        Ok(url) => url,
        Err(e) => {
            debug!("Failed to parse URL: {}", e);
            return None;
        }
    };

    let path = parsed.path().to_lowercase();
    if !path.ends_with("/get.php") {
        debug!("URL path is not a get.php endpoint: {}", path);
        return None;
    }

    Some(parsed)
}

/// Extract Xtream credentials from an M3U URL
///
/// # Returns
/// - `Some(XtreamCredentials)` if URL matches the `get.php` pattern
/// - `None` otherwise
pub fn extract_credentials(m3u_url: &str) -> Option<XtreamCredentials> {
    let parsed = parse_get_php(m3u_url)?;

    let params: HashMap<_, _> = parsed.query_pairs().collect();

    // Must have both username and password
    let username = params.get("username")?.to_string();
    let password = params.get("password")?.to_string();

    if username.is_empty() || password.is_empty() {
        debug!("Empty username or password in URL");
        return None;
    }

    // Reconstruct server base URL
    let host = parsed.host_str()?;
    let scheme = parsed.scheme();
    let port_suffix = parsed
        .port()
        .map(|p| format!(":{}", p))
        .unwrap_or_default();

    let server = format!("{}://{}{}", scheme, host, port_suffix);

    debug!(
        "Extracted Xtream credentials: server={}, username={}",
        server, username
    );

    Some(XtreamCredentials {
        server,
        username,
        password,
    })
}

/// Non-credential query parameters of any URL (`type`, `output`, ...)
pub fn playlist_params(m3u_url: &str) -> Vec<(String, String)> {
    Url::parse(m3u_url)
        .map(|url| {
            url.query_pairs()
                .filter(|(key, _)| !CREDENTIAL_PARAMS.contains(&key.as_ref()))
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}
