use anyhow::{bail, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::{Credentials, HostIdentity};
use crate::services::xtream::{extract_credentials, XtreamCredentials};

/// Single-segment routes the playlist file name must not shadow
const RESERVED_ROUTES: [&str; 6] = ["get.php", "player_api.php", "xmltv.php", "health", "metrics", "live"];

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub hostname: String,
    pub port: u16,
    /// Port written into rewritten addresses (differs behind a reverse proxy)
    pub advertised_port: u16,
    pub https: bool,

    // Gateway account
    pub gateway_user: String,
    pub gateway_password: String,

    // Upstream
    pub m3u_url: Option<String>,
    pub m3u_file_name: String,
    pub xtream_base_url: Option<String>,
    pub xtream_user: Option<String>,
    pub xtream_password: Option<String>,

    // Cache
    pub cache_expiration_hours: u64,
    pub cache_dir: PathBuf,
    pub cache_max_entries: Option<usize>,

    // Misc
    pub fetch_timeout_ms: u64,
    pub user_agent: String,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an arbitrary variable source
    pub fn from_lookup<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = var("PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        Self {
            // Server
            hostname: var("GATEWAY_HOSTNAME").unwrap_or_else(|| "localhost".to_string()),
            port,
            advertised_port: var("ADVERTISED_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(port),
            https: var("HTTPS")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),

            // Gateway account
            gateway_user: var("GATEWAY_USER").unwrap_or_default(),
            gateway_password: var("GATEWAY_PASSWORD").unwrap_or_default(),

            // Upstream
            m3u_url: non_empty(var("M3U_URL")),
            m3u_file_name: var("M3U_FILE_NAME").unwrap_or_else(|| "iptv.m3u".to_string()),
            xtream_base_url: non_empty(var("XTREAM_BASE_URL")),
            xtream_user: non_empty(var("XTREAM_USER")),
            xtream_password: non_empty(var("XTREAM_PASSWORD")),

            // Cache
            cache_expiration_hours: var("M3U_CACHE_EXPIRATION")
                .unwrap_or_else(|| "1".to_string())
                .parse()
                .unwrap_or(1),
            cache_dir: var("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| env::temp_dir().join("iptv-gateway")),
            cache_max_entries: var("CACHE_MAX_ENTRIES").and_then(|v| v.parse().ok()),

            // Misc - VLC user agent avoids IPTV server blocks
            fetch_timeout_ms: var("FETCH_TIMEOUT_MS")
                .unwrap_or_else(|| "30000".to_string())
                .parse()
                .unwrap_or(30_000),
            user_agent: var("USER_AGENT").unwrap_or_else(|| "VLC/3.0.20 LibVLC/3.0.20".to_string()),
        }
    }

    /// Reject configurations the gateway cannot serve with
    pub fn validate(&self) -> Result<()> {
        if self.gateway_user.is_empty() || self.gateway_password.is_empty() {
            bail!("GATEWAY_USER and GATEWAY_PASSWORD must be set");
        }
        if self.m3u_url.is_none() && self.xtream_credentials().is_none() {
            bail!("set M3U_URL or XTREAM_BASE_URL/XTREAM_USER/XTREAM_PASSWORD");
        }
        if self.m3u_file_name.is_empty() || self.m3u_file_name.contains('/') {
            bail!("M3U_FILE_NAME must be a plain file name");
        }
        if RESERVED_ROUTES.contains(&self.m3u_file_name.as_str()) {
            bail!("M3U_FILE_NAME '{}' clashes with a built-in route", self.m3u_file_name);
        }
        Ok(())
    }

    pub fn identity(&self) -> HostIdentity {
        HostIdentity {
            hostname: self.hostname.clone(),
            port: self.advertised_port,
            use_https: self.https,
        }
    }

    pub fn gateway_credentials(&self) -> Credentials {
        Credentials::new(&self.gateway_user, &self.gateway_password)
    }

    /// Explicit catalog settings, else derived from a `get.php` M3U_URL
    pub fn xtream_credentials(&self) -> Option<XtreamCredentials> {
        match (&self.xtream_base_url, &self.xtream_user, &self.xtream_password) {
            (Some(server), Some(username), Some(password)) => Some(XtreamCredentials {
                server: server.clone(),
                username: username.clone(),
                password: password.clone(),
            }),
            _ => self.m3u_url.as_deref().and_then(extract_credentials),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_expiration_hours.saturating_mul(3600))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]);
        assert_eq!(cfg.hostname, "localhost");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.advertised_port, 8080);
        assert!(!cfg.https);
        assert_eq!(cfg.m3u_file_name, "iptv.m3u");
        assert_eq!(cfg.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(cfg.fetch_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.cache_max_entries, None);
        assert_eq!(cfg.user_agent, "VLC/3.0.20 LibVLC/3.0.20");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_identity_uses_advertised_port() {
        let cfg = config(&[
            ("GATEWAY_HOSTNAME", "tv.example.org"),
            ("PORT", "9000"),
            ("ADVERTISED_PORT", "443"),
            ("HTTPS", "true"),
        ]);
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.identity().base_url(), "https://tv.example.org:443");
    }

    #[test]
    fn test_validate_requires_gateway_account_and_upstream() {
        let cfg = config(&[("M3U_URL", "http://provider.tv/list.m3u")]);
        assert!(cfg.validate().is_err());

        let cfg = config(&[("GATEWAY_USER", "alice"), ("GATEWAY_PASSWORD", "s3cret")]);
        assert!(cfg.validate().is_err());

        let cfg = config(&[
            ("GATEWAY_USER", "alice"),
            ("GATEWAY_PASSWORD", "s3cret"),
            ("M3U_URL", "http://provider.tv/list.m3u"),
        ]);
        assert!(cfg.validate().is_ok());
        assert!(cfg.xtream_credentials().is_none());
    }

    #[test]
    fn test_validate_rejects_reserved_file_name() {
        let cfg = config(&[
            ("GATEWAY_USER", "alice"),
            ("GATEWAY_PASSWORD", "s3cret"),
            ("M3U_URL", "http://provider.tv/list.m3u"),
            ("M3U_FILE_NAME", "player_api.php"),
        ]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_xtream_derived_from_get_php() {
        let cfg = config(&[
            ("GATEWAY_USER", "alice"),
            ("GATEWAY_PASSWORD", "s3cret"),
            (
                "M3U_URL",
                "http://provider.tv:8080/get.php?username=upuser&password=uppass&type=m3u_plus",
            ),
        ]);

        let creds = cfg.xtream_credentials().unwrap();
        assert_eq!(creds.server, "http://provider.tv:8080");
        assert_eq!(creds.username, "upuser");
        assert_eq!(creds.password, "uppass");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_explicit_xtream_settings_win() {
        let cfg = config(&[
            ("M3U_URL", "http://a.tv/get.php?username=u1&password=p1"),
            ("XTREAM_BASE_URL", "http://b.tv"),
            ("XTREAM_USER", "u2"),
            ("XTREAM_PASSWORD", "p2"),
        ]);

        let creds = cfg.xtream_credentials().unwrap();
        assert_eq!(creds.server, "http://b.tv");
        assert_eq!(creds.username, "u2");
    }

    #[test]
    fn test_huge_cache_expiration_saturates() {
        let hours = u64::MAX.to_string();
        let cfg = config(&[("M3U_CACHE_EXPIRATION", hours.as_str())]);
        assert_eq!(cfg.cache_expiration_hours, u64::MAX);
        assert_eq!(cfg.cache_ttl(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let cfg = config(&[("PORT", "eighty"), ("M3U_CACHE_EXPIRATION", "-2"), ("CACHE_MAX_ENTRIES", "10")]);
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.cache_expiration_hours, 1);
        assert_eq!(cfg.cache_max_entries, Some(10));
    }
}
