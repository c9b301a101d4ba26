//! Address codec
//!
//! Maps upstream resources to gateway addresses and back:
//!
//! ```text
//! plain entry    http://up/any/path/1234.ts  <->  {gateway}/{user}/{password}/1234.ts
//! catalog stream /live/{user}/{password}/{id} ->  {upstream}/live/{upUser}/{upPass}/{id}
//! catalog query  get.php?type=m3u_plus&...    ->  signature "get.php?output=ts&type=m3u_plus"
//! ```
//!
//! Client credentials only ever appear on the gateway side of these
//! mappings; upstream targets are always built from the upstream account.

use std::collections::{BTreeMap, HashMap};
use url::Url;

use crate::error::{GatewayError, GatewayResult};
use crate::models::{Credentials, HostIdentity, Playlist, PlaylistEntry};
use crate::services::xtream::{XtreamCredentials, CREDENTIAL_PARAMS};

/// Resource id for URIs whose path has no usable segment
const FALLBACK_RESOURCE_ID: &str = "stream";

/// Final non-empty path segment, percent-decoded
pub fn resource_id(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(|segment| {
            urlencoding::decode(segment)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| segment.to_string())
        })
        .unwrap_or_else(|| FALLBACK_RESOURCE_ID.to_string())
}

/// `{scheme}://{hostname}:{port}/{user}/{password}/{resource_id}`
pub fn encode_entry_uri(identity: &HostIdentity, creds: &Credentials, resource_id: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        identity.base_url(),
        urlencoding::encode(&creds.user),
        urlencoding::encode(&creds.password),
        urlencoding::encode(resource_id)
    )
}

/// Parse an entry's upstream URI, naming the entry on failure
pub fn parse_entry_uri(entry: &PlaylistEntry, position: usize) -> GatewayResult<Url> {
    Url::parse(&entry.uri).map_err(|e| {
        let name = entry
            .display_name()
            .unwrap_or_else(|| format!("#{}", position));
        GatewayError::Upstream(format!("entry '{}' has an invalid URI: {}", name, e))
    })
}

/// Resource routes known for the loaded plain playlist
///
/// Ids are the final path segment of each entry. When two different
/// upstream URIs share a segment, the later one is prefixed with its
/// position (`{position}-{segment}`) so every entry stays addressable.
#[derive(Debug, Default)]
pub struct ResourceIndex {
    ids: Vec<String>,
    targets: HashMap<String, Url>,
}

impl ResourceIndex {
    pub fn build(playlist: &Playlist) -> GatewayResult<Self> {
        let mut index = Self {
            ids: Vec::with_capacity(playlist.len()),
            targets: HashMap::with_capacity(playlist.len()),
        };

        let mut known: HashMap<Url, String> = HashMap::with_capacity(playlist.len());

        for (position, entry) in playlist.entries.iter().enumerate() {
            let url = parse_entry_uri(entry, position)?;

            let id = match known.get(&url) {
                Some(id) => id.clone(),
                None => {
                    // A prefixed id may itself be some entry's real segment
                    let mut id = resource_id(&url);
                    while index.targets.contains_key(&id) {
                        id = format!("{}-{}", position, id);
                    }
                    index.targets.insert(id.clone(), url.clone());
                    known.insert(url, id.clone());
                    id
                }
            };

            index.ids.push(id);
        }

        Ok(index)
    }

    /// Id assigned to the entry at `position`
    pub fn id_at(&self, position: usize) -> Option<&str> {
        self.ids.get(position).map(String::as_str)
    }

    pub fn resolve(&self, id: &str) -> Option<&Url> {
        self.targets.get(id)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }
}

/// Media families of the catalog API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Generic,
    Live,
    Movie,
    Series,
}

impl StreamKind {
    fn path_prefix(self) -> Option<&'static str> {
        match self {
            StreamKind::Generic => None,
            StreamKind::Live => Some("live"),
            StreamKind::Movie => Some("movie"),
            StreamKind::Series => Some("series"),
        }
    }
}

/// Upstream URL for a catalog stream, built from the upstream account
pub fn stream_target(upstream: &XtreamCredentials, kind: StreamKind, id: &str) -> GatewayResult<Url> {
    let mut segments = Vec::with_capacity(4);
    segments.extend(kind.path_prefix());
    segments.extend([upstream.username.as_str(), upstream.password.as_str(), id]);

    upstream
        .upstream_url(&segments)
        .map_err(|e| GatewayError::Internal(format!("invalid upstream base URL: {}", e)))
}

/// Client catalog parameters ready for upstream use
///
/// Credentials are dropped, repeated keys are joined with `,` and keys
/// are sorted so equivalent requests share one signature.
pub fn catalog_params<I>(pairs: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut merged: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in pairs {
        if CREDENTIAL_PARAMS.contains(&key.as_str()) {
            continue;
        }
        merged.entry(key).or_default().push(value);
    }

    merged
        .into_iter()
        .map(|(key, values)| (key, values.join(",")))
        .collect()
}

/// Cache signature of a catalog request: endpoint plus its parameters
pub fn catalog_signature(endpoint: &str, params: &[(String, String)]) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    format!("{}?{}", endpoint, query)
}
