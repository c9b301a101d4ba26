//! Xtream Codes API Types

use url::Url;

/// Upstream catalog account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XtreamCredentials {
    /// Server base URL (e.g., "http://example.com:8080")
    pub server: String,
    /// Username for authentication
    pub username: String,
    /// Password for authentication
    pub password: String,
}

impl XtreamCredentials {
    /// `{server}/{segments...}`, each segment percent-encoded
    pub fn upstream_url(&self, segments: &[&str]) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&self.server)?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `{server}/{endpoint}?username=..&password=..`, query properly escaped
    pub fn endpoint_url(&self, endpoint: &str) -> Result<Url, url::ParseError> {
        let mut url = self.upstream_url(&[endpoint])?;
        url.query_pairs_mut()
            .append_pair("username", &self.username)
            .append_pair("password", &self.password);
        Ok(url)
    }
}

/// One Player API call
///
/// The client-facing `action` values map one-to-one onto these variants;
/// anything unrecognised becomes [`CatalogAction::Login`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogAction {
    Login,
    LiveCategories,
    LiveStreams,
    VodCategories,
    VodStreams,
    VodInfo { vod_id: String },
    SeriesCategories,
    Series,
    SeriesInfo { series_id: String },
    ShortEpg { stream_id: String, limit: u32 },
    FullEpg { stream_id: String },
}

impl CatalogAction {
    pub const GET_LIVE_CATEGORIES: &'static str = "get_live_categories";
    pub const GET_LIVE_STREAMS: &'static str = "get_live_streams";
    pub const GET_VOD_CATEGORIES: &'static str = "get_vod_categories";
    pub const GET_VOD_STREAMS: &'static str = "get_vod_streams";
    pub const GET_VOD_INFO: &'static str = "get_vod_info";
    pub const GET_SERIES_CATEGORIES: &'static str = "get_series_categories";
    pub const GET_SERIES: &'static str = "get_series";
    pub const GET_SERIES_INFO: &'static str = "get_series_info";
    pub const GET_SHORT_EPG: &'static str = "get_short_epg";
    pub const GET_SIMPLE_DATA_TABLE: &'static str = "get_simple_data_table";

    /// Upstream `action` value; empty for the login handshake
    pub fn name(&self) -> &'static str {
        match self {
            CatalogAction::Login => "",
            CatalogAction::LiveCategories => Self::GET_LIVE_CATEGORIES,
            CatalogAction::LiveStreams => Self::GET_LIVE_STREAMS,
            CatalogAction::VodCategories => Self::GET_VOD_CATEGORIES,
            CatalogAction::VodStreams => Self::GET_VOD_STREAMS,
            CatalogAction::VodInfo { .. } => Self::GET_VOD_INFO,
            CatalogAction::SeriesCategories => Self::GET_SERIES_CATEGORIES,
            CatalogAction::Series => Self::GET_SERIES,
            CatalogAction::SeriesInfo { .. } => Self::GET_SERIES_INFO,
            CatalogAction::ShortEpg { .. } => Self::GET_SHORT_EPG,
            CatalogAction::FullEpg { .. } => Self::GET_SIMPLE_DATA_TABLE,
        }
    }

    /// Extra query parameters besides `action`
    pub fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            CatalogAction::VodInfo { vod_id } => vec![("vod_id", vod_id.clone())],
            CatalogAction::SeriesInfo { series_id } => vec![("series_id", series_id.clone())],
            CatalogAction::ShortEpg { stream_id, limit } => vec![
                ("stream_id", stream_id.clone()),
                ("limit", limit.to_string()),
            ],
            CatalogAction::FullEpg { stream_id } => vec![("stream_id", stream_id.clone())],
            _ => Vec::new(),
        }
    }
}
